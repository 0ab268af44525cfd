//! Error types for rad-loader.
//!
//! Mirrors the split used by oxidicom's `error.rs`/`association_error.rs`:
//! a top-level [`LoaderError`] for failures that abort the whole process
//! (configuration, key file I/O, audit storage), and [`AssociationError`]
//! for failures scoped to a single DICOM association, which never abort
//! the orchestrator's per-accession loop.

use camino::Utf8PathBuf;
use dicom::core::Tag;

#[derive(thiserror::Error, Debug)]
pub enum LoaderError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: Utf8PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("association with PACS could not be established")]
    Unreachable,

    #[error("C-MOVE reported failure status 0x{0:04X}")]
    MoveFailed(u16),

    #[error(transparent)]
    MissingTag(#[from] MissingRequiredTag),

    #[error(transparent)]
    Association(#[from] AssociationError),
}

#[derive(thiserror::Error, Debug)]
#[error("DICOM dataset does not have the required tag: \"{0}\"")]
pub struct MissingRequiredTag(pub &'static str);

/// Error which might happen while handling one incoming DICOM association,
/// either as the SCU (PACS Client) or the SCP (Store Receiver).
#[derive(thiserror::Error, Debug)]
pub enum AssociationError {
    #[error("could not establish association: {0}")]
    CouldNotEstablish(String),

    #[error("error receiving PDU: {0}")]
    PduReception(String),

    #[error("failed to read incoming DICOM command: {0}")]
    FailedToReadCommand(String),

    #[error("{0}")]
    CannotRespond(&'static str),

    #[error("missing tag {0:?}")]
    MissingTag(Tag),

    #[error("value for {0:?} is not a number")]
    InvalidNumber(Tag),

    #[error("missing presentation context")]
    MissingPresentationContext,

    #[error("failed to read DICOM data object: {0}")]
    FailedToReadObject(String),

    #[error("failed to build DICOM meta file information: {0}")]
    FailedToBuildMeta(String),

    #[error(transparent)]
    MissingRequiredTag(#[from] MissingRequiredTag),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
