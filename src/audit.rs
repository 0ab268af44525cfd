//! Audit Log — component H.
//!
//! Ported from `original_source/src/pacs_agent/audit.py`. Same schema,
//! same semantics (insert-per-result, descending-id query reversed to
//! chronological order), backed by `rusqlite` instead of hand-rolled
//! `sqlite3` calls — grounded in the `rusqlite::{params, Connection}`
//! style used elsewhere in the retrieval pack.

use crate::error::LoaderError;
use crate::orchestrator::LoadResult;
use camino::Utf8Path;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub operator: String,
    pub project: String,
    pub accession: String,
    pub case_id: Option<String>,
    pub status: String,
    pub modality: Option<String>,
    pub image_count: Option<i64>,
    pub series_count: Option<i64>,
    pub duration_s: Option<f64>,
    pub error: Option<String>,
}

fn open_db(base_dir: &Utf8Path) -> Result<Connection, LoaderError> {
    fs_err::create_dir_all(base_dir)?;
    let db_path = base_dir.join("audit.db");
    let conn = Connection::open(db_path)?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            operator TEXT NOT NULL,
            project TEXT NOT NULL,
            accession TEXT NOT NULL,
            case_id TEXT,
            status TEXT NOT NULL,
            modality TEXT,
            image_count INTEGER,
            series_count INTEGER,
            duration_s REAL,
            error TEXT
        )",
        [],
    )?;
    Ok(conn)
}

/// Insert one row per result into the audit table at `base_dir/audit.db`.
pub fn append(
    base_dir: &Utf8Path,
    project: &str,
    results: &[LoadResult],
    operator: &str,
) -> Result<(), LoaderError> {
    let conn = open_db(base_dir)?;
    let timestamp = current_timestamp();
    for r in results {
        conn.execute(
            "INSERT INTO audit
                (timestamp, operator, project, accession, case_id, status,
                 modality, image_count, series_count, duration_s, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                timestamp,
                operator,
                project,
                r.accession,
                non_empty(&r.case_id),
                r.status.as_str(),
                non_empty(&r.modality),
                r.image_count as i64,
                r.series_count as i64,
                r.duration_s,
                r.error,
            ],
        )?;
    }
    Ok(())
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Return the last `last` audit rows, optionally filtered by project, in
/// ascending chronological order.
pub fn query(
    base_dir: &Utf8Path,
    project: Option<&str>,
    last: u32,
) -> Result<Vec<AuditEntry>, LoaderError> {
    let conn = open_db(base_dir)?;
    let mut rows = Vec::new();

    let map_row = |row: &rusqlite::Row| -> rusqlite::Result<AuditEntry> {
        Ok(AuditEntry {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            operator: row.get(2)?,
            project: row.get(3)?,
            accession: row.get(4)?,
            case_id: row.get(5)?,
            status: row.get(6)?,
            modality: row.get(7)?,
            image_count: row.get(8)?,
            series_count: row.get(9)?,
            duration_s: row.get(10)?,
            error: row.get(11)?,
        })
    };

    if let Some(project) = project {
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, operator, project, accession, case_id, status,
                    modality, image_count, series_count, duration_s, error
             FROM audit WHERE project = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        for entry in stmt.query_map(params![project, last], map_row)? {
            rows.push(entry?);
        }
    } else {
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, operator, project, accession, case_id, status,
                    modality, image_count, series_count, duration_s, error
             FROM audit ORDER BY id DESC LIMIT ?1",
        )?;
        for entry in stmt.query_map(params![last], map_row)? {
            rows.push(entry?);
        }
    }

    rows.reverse();
    Ok(rows)
}

fn current_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .expect("RFC 3339 formatting of the current time never fails")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::LoadResult;
    use camino::Utf8Path;

    fn ok_result(accession: &str) -> LoadResult {
        LoadResult {
            case_id: "case0001".to_string(),
            accession: accession.to_string(),
            study_uid: "1.2.3".to_string(),
            series_count: 3,
            image_count: 150,
            study_date: "20240101".to_string(),
            modality: "CT".to_string(),
            description: "chest".to_string(),
            status: "ok".to_string(),
            error: None,
            duration_s: Some(4.2),
        }
    }

    #[test]
    fn append_then_query_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let base_dir = Utf8Path::from_path(dir.path()).unwrap();
        append(base_dir, "demo", &[ok_result("ACC1")], "tester").unwrap();
        let rows = query(base_dir, Some("demo"), 20).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].accession, "ACC1");
        assert_eq!(rows[0].operator, "tester");
    }

    #[test]
    fn query_filters_by_project() {
        let dir = tempfile::tempdir().unwrap();
        let base_dir = Utf8Path::from_path(dir.path()).unwrap();
        append(base_dir, "proj-a", &[ok_result("ACC1")], "tester").unwrap();
        append(base_dir, "proj-b", &[ok_result("ACC2")], "tester").unwrap();
        let rows = query(base_dir, Some("proj-a"), 20).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].project, "proj-a");
    }

    #[test]
    fn query_without_project_returns_all_in_chronological_order() {
        let dir = tempfile::tempdir().unwrap();
        let base_dir = Utf8Path::from_path(dir.path()).unwrap();
        append(base_dir, "proj-a", &[ok_result("ACC1")], "tester").unwrap();
        append(base_dir, "proj-b", &[ok_result("ACC2")], "tester").unwrap();
        let rows = query(base_dir, None, 20).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].accession, "ACC1");
        assert_eq!(rows[1].accession, "ACC2");
    }
}
