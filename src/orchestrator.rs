//! Orchestrator — component F: the full load pipeline.
//!
//! Ported from `original_source/src/agent_rad_tools/loader.py`'s
//! `load_studies`: for each accession, check idempotency, C-FIND, C-MOVE
//! via a per-accession [`StoreReceiver`], commit a [`crate::keyfile::KeyEntry`],
//! then verify and audit the whole batch.

use crate::config::Config;
use crate::keyfile::{next_case_id, read_key_file, write_key_file, KeyEntry};
use crate::pacs_client::PacsClient;
use crate::sanitize::sanitize_path;
use crate::store_receiver::StoreReceiver;
use crate::study::StudyDescriptor;
use crate::verify::{self, LoadVerification};
use crate::{audit, error::LoaderError};
use camino::Utf8PathBuf;
use serde::Serialize;
use std::time::Instant;

/// Outcome of attempting to load a single accession.
#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub case_id: String,
    pub accession: String,
    pub study_uid: String,
    pub series_count: u32,
    pub image_count: u32,
    pub study_date: String,
    pub modality: String,
    pub description: String,
    /// One of `"ok"`, `"error"`, `"skipped"`, or `"dry-run"`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_s: Option<f64>,
}

impl LoadResult {
    fn blank(accession: &str, status: &str, error: impl Into<String>) -> Self {
        LoadResult {
            case_id: String::new(),
            accession: accession.to_string(),
            study_uid: String::new(),
            series_count: 0,
            image_count: 0,
            study_date: String::new(),
            modality: String::new(),
            description: String::new(),
            status: status.to_string(),
            error: Some(error.into()),
            duration_s: None,
        }
    }
}

pub fn load_studies(
    config: &Config,
    project: &str,
    accessions: &[String],
    dry_run: bool,
) -> Result<(Vec<LoadResult>, LoadVerification), LoaderError> {
    let project_dir = config.output.base_dir.join(sanitize_path(project));
    let key_path = project_dir.join("key.csv");
    let mut existing = read_key_file(&key_path)?;

    let loaded_accessions: std::collections::HashSet<&str> =
        existing.iter().map(|e| e.accession.as_str()).collect();

    let client = PacsClient::new(
        &config.pacs.host,
        config.pacs.port,
        config.scp.ae_title.clone(),
        config.pacs.ae_title.clone(),
    );

    let mut results = Vec::with_capacity(accessions.len());

    for accession in accessions {
        if loaded_accessions.contains(accession.as_str()) {
            tracing::info!(accession, "skipping — already loaded");
            results.push(LoadResult::blank(accession, "skipped", "already loaded"));
            continue;
        }

        let studies = match client.find_by_accession(accession) {
            Ok(studies) => studies,
            Err(e) => {
                tracing::error!(accession, error = %e, "C-FIND failed");
                results.push(LoadResult::blank(
                    accession,
                    "error",
                    format!("C-FIND failed: {e}"),
                ));
                continue;
            }
        };

        let Some(study) = studies.into_iter().next() else {
            results.push(LoadResult::blank(accession, "error", "not found on PACS"));
            continue;
        };

        if dry_run {
            results.push(dry_run_result(accession, &study));
            continue;
        }

        let case_id = next_case_id(&existing);
        let result = retrieve_one(
            &client,
            config,
            &project_dir,
            accession,
            &case_id,
            &study,
        );

        if result.status == "ok" {
            let entry = KeyEntry {
                case_id: case_id.clone(),
                accession: accession.clone(),
                study_date: study.study_date.clone(),
                modality: study.modality_or_fallback().to_string(),
                description: study.study_description.clone(),
                series_count: result.series_count,
                image_count: result.image_count,
            };
            existing.push(entry);
            write_key_file(&key_path, &existing)?;
            tracing::info!(
                accession,
                case_id,
                series_count = result.series_count,
                image_count = result.image_count,
                "loaded study"
            );
        }

        results.push(result);
    }

    let verification = verify::verify_load(&results);
    write_load_summary(&project_dir, &results, &verification)?;
    audit::append(&config.output.base_dir, project, &results, &whoami())?;

    Ok((results, verification))
}

fn dry_run_result(accession: &str, study: &StudyDescriptor) -> LoadResult {
    LoadResult {
        case_id: "(dry-run)".to_string(),
        accession: accession.to_string(),
        study_uid: study.study_instance_uid.clone(),
        series_count: study.series_count,
        image_count: study.image_count,
        study_date: study.study_date.clone(),
        modality: study.modality_or_fallback().to_string(),
        description: study.study_description.clone(),
        status: "dry-run".to_string(),
        error: None,
        duration_s: None,
    }
}

fn retrieve_one(
    client: &PacsClient,
    config: &Config,
    project_dir: &Utf8PathBuf,
    accession: &str,
    case_id: &str,
    study: &StudyDescriptor,
) -> LoadResult {
    let mut receiver = StoreReceiver::new(
        project_dir.clone(),
        case_id,
        config.scp.ae_title.as_str().to_string(),
    );
    let t0 = Instant::now();

    let start_result = receiver
        .start(config.scp.port)
        .map_err(|e| e.to_string())
        .and_then(|()| client.move_study(&study.study_instance_uid).map_err(|e| e.to_string()));

    match start_result {
        Ok(_move_outcome) => {
            std::thread::sleep(config.output.move_grace_period);
            let counts = receiver.stop();
            let elapsed = round1(t0.elapsed().as_secs_f64());
            LoadResult {
                case_id: case_id.to_string(),
                accession: accession.to_string(),
                study_uid: study.study_instance_uid.clone(),
                series_count: counts.series_count,
                image_count: counts.image_count,
                study_date: study.study_date.clone(),
                modality: study.modality_or_fallback().to_string(),
                description: study.study_description.clone(),
                status: "ok".to_string(),
                error: None,
                duration_s: Some(elapsed),
            }
        }
        Err(e) => {
            let _ = receiver.stop();
            let elapsed = round1(t0.elapsed().as_secs_f64());
            tracing::error!(accession, error = %e, "C-MOVE failed");
            LoadResult {
                case_id: case_id.to_string(),
                accession: accession.to_string(),
                study_uid: study.study_instance_uid.clone(),
                series_count: 0,
                image_count: 0,
                study_date: study.study_date.clone(),
                modality: study.modality_or_fallback().to_string(),
                description: study.study_description.clone(),
                status: "error".to_string(),
                error: Some(format!("C-MOVE failed: {e}")),
                duration_s: Some(elapsed),
            }
        }
    }
}

fn round1(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Serialize)]
struct LoadSummary<'a> {
    results: &'a [LoadResult],
    verification: &'a LoadVerification,
}

fn write_load_summary(
    project_dir: &Utf8PathBuf,
    results: &[LoadResult],
    verification: &LoadVerification,
) -> Result<(), LoaderError> {
    fs_err::create_dir_all(project_dir)?;
    let summary = LoadSummary {
        results,
        verification,
    };
    let json = serde_json::to_string_pretty(&summary)?;
    fs_err::write(project_dir.join("load.json"), json)?;
    Ok(())
}
