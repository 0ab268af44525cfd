//! DICOM Application Entity title newtypes.
//!
//! Grounded in oxidicom's `dicomrs_options.rs`, which uses `aliri_braid` to
//! give AE titles a validated, non-`String` identity at the type level
//! instead of passing bare `&str` between the PACS Client, the Store
//! Receiver, and configuration.

use aliri_braid::braid;

/// Our local AE title — the identity this process presents to the PACS,
/// both as the SCU calling AE title and as the SCP's own AE title.
#[braid(serde)]
pub struct OurAETitle;

/// The configured AE title of the remote PACS archive.
#[braid(serde)]
pub struct RemoteAETitle;
