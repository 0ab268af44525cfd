//! Verification — component G.
//!
//! Ported from `original_source/src/agent_rad_tools/verify.py`:
//! `verify_load` summarizes one batch's outcomes, `verify_project`
//! compares an entire project's cases for outliers.

use crate::keyfile::KeyEntry;
use crate::orchestrator::LoadResult;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LoadVerification {
    pub ok: bool,
    pub total_requested: u32,
    pub loaded: u32,
    pub skipped: u32,
    pub failed: u32,
    pub not_found: u32,
    pub warnings: Vec<String>,
}

pub fn verify_load(results: &[LoadResult]) -> LoadVerification {
    let mut loaded = 0;
    let mut skipped = 0;
    let mut failed = 0;
    let mut not_found = 0;
    let mut warnings = Vec::new();

    for r in results {
        match r.status.as_str() {
            "ok" => {
                loaded += 1;
                if r.image_count < 5 {
                    warnings.push(format!(
                        "{} ({}): only {} images (unusually low)",
                        r.accession, r.case_id, r.image_count
                    ));
                } else if r.image_count > 5000 {
                    warnings.push(format!(
                        "{} ({}): {} images (unusually high)",
                        r.accession, r.case_id, r.image_count
                    ));
                }
            }
            "skipped" => skipped += 1,
            "dry-run" => {}
            "error" => {
                if r.error.as_deref().is_some_and(|e| e.contains("not found")) {
                    not_found += 1;
                } else {
                    failed += 1;
                }
            }
            _ => {}
        }
    }

    LoadVerification {
        ok: failed == 0 && not_found == 0 && warnings.is_empty(),
        total_requested: results.len() as u32,
        loaded,
        skipped,
        failed,
        not_found,
        warnings,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectVerification {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_series: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_images: Option<f64>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Compare cases within a project to find outliers, relative to the
/// project's own median series/image counts and majority modality.
pub fn verify_project(entries: &[KeyEntry]) -> ProjectVerification {
    if entries.len() < 3 {
        return ProjectVerification {
            ok: true,
            median_series: None,
            median_images: None,
            warnings: Vec::new(),
            note: Some("too few cases to compare".to_string()),
        };
    }

    let med_series = median(entries.iter().map(|e| e.series_count as f64));
    let med_images = median(entries.iter().map(|e| e.image_count as f64));
    let majority_modality = most_common_modality(entries);

    let mut warnings = Vec::new();
    for e in entries {
        let series = e.series_count as f64;
        let images = e.image_count as f64;

        if med_series > 0.0 && series < med_series / 2.0 {
            warnings.push(format!(
                "{}: {} series vs median {:.0} — possibly incomplete study",
                e.case_id, e.series_count, med_series
            ));
        }
        if med_series > 0.0 && series > med_series * 2.0 {
            warnings.push(format!(
                "{}: {} series vs median {:.0} — unusually many series",
                e.case_id, e.series_count, med_series
            ));
        }
        if med_images > 0.0 && images < med_images / 3.0 {
            warnings.push(format!(
                "{}: {} images vs median {:.0} — much fewer than others",
                e.case_id, e.image_count, med_images
            ));
        }
        if med_images > 0.0 && images > med_images * 3.0 {
            warnings.push(format!(
                "{}: {} images vs median {:.0} — much more than others",
                e.case_id, e.image_count, med_images
            ));
        }
        if e.modality != majority_modality {
            warnings.push(format!(
                "{}: modality {} differs from majority {}",
                e.case_id, e.modality, majority_modality
            ));
        }
    }

    ProjectVerification {
        ok: warnings.is_empty(),
        median_series: Some(med_series),
        median_images: Some(med_images),
        warnings,
        note: None,
    }
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(|a, b| a.partial_cmp(b).expect("counts are never NaN"));
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Most frequent modality, ties broken by first appearance in `entries` —
/// matches `original_source/src/agent_rad_tools/verify.py`'s
/// `Counter.most_common(1)`, which is insertion-order stable. A plain
/// `HashMap` + `max_by_key` would tie-break on random iteration order
/// instead, making the warning non-deterministic across runs on identical
/// input.
fn most_common_modality(entries: &[KeyEntry]) -> String {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for e in entries {
        let modality = e.modality.as_str();
        if !counts.contains_key(modality) {
            order.push(modality);
        }
        *counts.entry(modality).or_insert(0) += 1;
    }

    let mut best: Option<(&str, u32)> = None;
    for modality in order {
        let count = counts[modality];
        let replace = match best {
            Some((_, best_count)) => count > best_count,
            None => true,
        };
        if replace {
            best = Some((modality, count));
        }
    }
    best.map(|(modality, _)| modality.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_result(accession: &str, image_count: u32) -> LoadResult {
        LoadResult {
            case_id: "case0001".to_string(),
            accession: accession.to_string(),
            study_uid: "1.2.3".to_string(),
            series_count: 2,
            image_count,
            study_date: "20240101".to_string(),
            modality: "CT".to_string(),
            description: "chest".to_string(),
            status: "ok".to_string(),
            error: None,
            duration_s: Some(1.0),
        }
    }

    #[test]
    fn flags_low_image_count() {
        let v = verify_load(&[ok_result("ACC1", 2)]);
        assert!(!v.ok);
        assert_eq!(v.warnings.len(), 1);
        assert!(v.warnings[0].contains("unusually low"));
    }

    #[test]
    fn flags_high_image_count() {
        let v = verify_load(&[ok_result("ACC1", 6000)]);
        assert!(!v.ok);
        assert!(v.warnings[0].contains("unusually high"));
    }

    #[test]
    fn not_found_counted_separately_from_failed() {
        let mut r = ok_result("ACC1", 150);
        r.status = "error".to_string();
        r.error = Some("not found on PACS".to_string());
        let v = verify_load(&[r]);
        assert_eq!(v.not_found, 1);
        assert_eq!(v.failed, 0);
        assert!(!v.ok);
    }

    #[test]
    fn dry_run_is_not_a_failure() {
        let mut r = ok_result("ACC1", 150);
        r.status = "dry-run".to_string();
        r.case_id = "(dry-run)".to_string();
        let v = verify_load(&[r]);
        assert!(v.ok);
        assert_eq!(v.loaded, 0);
    }

    #[test]
    fn all_ok_batch_has_no_warnings() {
        let v = verify_load(&[ok_result("ACC1", 150), ok_result("ACC2", 200)]);
        assert!(v.ok);
        assert_eq!(v.loaded, 2);
        assert!(v.warnings.is_empty());
    }

    fn entry(case_id: &str, series_count: u32, image_count: u32, modality: &str) -> KeyEntry {
        KeyEntry {
            case_id: case_id.to_string(),
            accession: "ACC".to_string(),
            study_date: "20240101".to_string(),
            modality: modality.to_string(),
            description: String::new(),
            series_count,
            image_count,
        }
    }

    #[test]
    fn too_few_cases_skips_comparison() {
        let entries = vec![entry("case0001", 3, 150, "CT"), entry("case0002", 3, 150, "CT")];
        let v = verify_project(&entries);
        assert!(v.ok);
        assert_eq!(v.note.as_deref(), Some("too few cases to compare"));
    }

    #[test]
    fn flags_outlier_case() {
        let entries = vec![
            entry("case0001", 3, 150, "CT"),
            entry("case0002", 3, 150, "CT"),
            entry("case0003", 1, 10, "CT"),
        ];
        let v = verify_project(&entries);
        assert!(!v.ok);
        assert!(v.warnings.iter().any(|w| w.contains("case0003")));
    }

    #[test]
    fn flags_minority_modality() {
        let entries = vec![
            entry("case0001", 3, 150, "CT"),
            entry("case0002", 3, 150, "CT"),
            entry("case0003", 3, 150, "MR"),
        ];
        let v = verify_project(&entries);
        assert!(!v.ok);
        assert!(v.warnings.iter().any(|w| w.contains("modality MR")));
    }

    #[test]
    fn tied_modality_count_resolves_to_first_seen() {
        let entries = vec![
            entry("case0001", 3, 150, "MR"),
            entry("case0002", 3, 150, "CT"),
            entry("case0003", 3, 150, "MR"),
            entry("case0004", 3, 150, "CT"),
        ];
        assert_eq!(most_common_modality(&entries), "MR");
    }
}
