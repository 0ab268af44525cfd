//! rad-loader: a PID-safe research image loader for a hospital PACS.
//!
//! Queries a DICOM archive for studies by accession number, retrieves them
//! over C-MOVE into a short-lived Store Receiver, anonymizes every dataset
//! against a strict field allowlist before it touches disk, and tracks
//! case assignment and audit history for the project.

pub mod ae_title;
pub mod anonymize;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod keyfile;
pub mod orchestrator;
pub mod pacs_client;
pub mod private_sop_uids;
pub mod sanitize;
pub mod store_receiver;
pub mod study;
pub mod tags;
pub mod threads;
pub mod transfer;
pub mod verify;
