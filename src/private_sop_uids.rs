//! Private SOP class UIDs.
//!
//! Ported verbatim from oxidicom's `private_sop_uids.rs`.
//! <https://dcm4chee-arc-cs.readthedocs.io/en/latest/networking/specs/storage/storage.html>

/// Private Siemens AX Frame Sets Storage
pub const SIEMENS_AX_FRAME_SETS_STORAGE: &str = "1.3.12.2.1107.5.99.3.11";

/// Private Siemens CSA Non Image Storage
pub const SIEMENS_CSA_NON_IMAGE_STORAGE: &str = "1.3.12.2.1107.5.9.1";

/// Private Siemens CT MR Volume Storage
pub const SIEMENS_CT_MR_VOLUME_STORAGE: &str = "1.3.12.2.1107.5.99.3.10";
