//! Key File — component C.
//!
//! Ported from `original_source/src/agent_rad_tools/keyfile.py`, reading
//! and writing with the `csv` crate instead of hand-rolled parsing.
//! `write_key_file` follows oxidicom's temp-file-then-rename pattern
//! used elsewhere in the teacher repo for "rewrite small file atomically"
//! (see `pacs_file.rs`'s path handling) so a crash mid-write never leaves
//! a half-written key.csv on disk.

use crate::error::LoaderError;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub case_id: String,
    pub accession: String,
    #[serde(default)]
    pub study_date: String,
    #[serde(default)]
    pub modality: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub series_count: u32,
    #[serde(default)]
    pub image_count: u32,
}

/// Read `key.csv`. Returns an empty vec if the file does not exist yet.
pub fn read_key_file(path: &Utf8Path) -> Result<Vec<KeyEntry>, LoaderError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut entries = Vec::new();
    for record in reader.deserialize() {
        entries.push(record?);
    }
    Ok(entries)
}

/// Rewrite `key.csv` with exactly `entries`, atomically.
///
/// Writes to a sibling `.tmp` file first and renames it into place, so a
/// reader never observes a partially-written key file.
pub fn write_key_file(path: &Utf8Path, entries: &[KeyEntry]) -> Result<(), LoaderError> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)?;
        for entry in entries {
            writer.serialize(entry)?;
        }
        writer.flush()?;
    }
    fs_err::rename(&tmp_path, path)?;
    Ok(())
}

/// Compute the next case ID from the existing key entries.
///
/// Entries whose `case_id` does not match `case` followed by digits are
/// ignored for this computation, but are never dropped from the file.
pub fn next_case_id(entries: &[KeyEntry]) -> String {
    let max_num = entries
        .iter()
        .filter_map(|e| e.case_id.strip_prefix("case"))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("case{:04}", max_num + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;

    fn entry(case_id: &str) -> KeyEntry {
        KeyEntry {
            case_id: case_id.to_string(),
            accession: "ACC1".to_string(),
            study_date: "20240101".to_string(),
            modality: "CT".to_string(),
            description: "chest".to_string(),
            series_count: 3,
            image_count: 150,
        }
    }

    #[test]
    fn reading_missing_file_returns_empty() {
        let path = Utf8PathBuf::from("/nonexistent/dir/key.csv");
        assert_eq!(read_key_file(&path).unwrap(), Vec::new());
    }

    #[test]
    fn round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("key.csv");
        let entries = vec![entry("case0001"), entry("case0002")];
        write_key_file(&path, &entries).unwrap();
        let read_back = read_key_file(&path).unwrap();
        assert_eq!(read_back, entries);
    }

    #[test]
    fn write_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("key.csv");
        write_key_file(&path, &[entry("case0001")]).unwrap();
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[rstest]
    #[case::empty(vec![], "case0001")]
    #[case::single(vec!["case0001"], "case0002")]
    #[case::gap(vec!["case0001", "case0005"], "case0006")]
    #[case::non_conforming_ignored(vec!["case0003", "custom-id", "caseXYZ"], "case0004")]
    fn next_case_id_follows_max_suffix(#[case] existing: Vec<&str>, #[case] expected: &str) {
        let entries: Vec<KeyEntry> = existing.into_iter().map(entry).collect();
        assert_eq!(next_case_id(&entries), expected);
    }
}
