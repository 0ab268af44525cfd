//! Study descriptor and the PHI-safe C-FIND field allowlist.
//!
//! Ported from `original_source/src/pacs_agent/pacs.py`'s `_SAFE_KEYWORDS`
//! list and `_extract_safe_fields` — these are the only fields a C-FIND
//! response is ever allowed to surface to the rest of the program. Paired
//! with its VR, `SAFE_FIELDS` is the single source of truth both
//! `pacs_client::find_query` (request-building) and
//! `StudyDescriptor::from_identifier` (response-extraction) iterate, so the
//! two can never drift apart.

use dicom::core::{Tag, VR};
use dicom::dictionary_std::tags as std_tags;
use dicom::object::InMemDicomObject;
use serde::Serialize;
use std::collections::HashMap;

const MODALITIES_IN_STUDY: Tag = Tag(0x0008, 0x0061);

/// Tags requested in a study-level C-FIND and considered safe to retain
/// in a [`StudyDescriptor`] — none of them, on their own, identify a
/// patient. Requested and extracted together; see the module doc comment.
pub const SAFE_FIELDS: &[(Tag, VR)] = &[
    (std_tags::ACCESSION_NUMBER, VR::SH),
    (std_tags::STUDY_INSTANCE_UID, VR::UI),
    (std_tags::MODALITY, VR::CS),
    (MODALITIES_IN_STUDY, VR::CS),
    (std_tags::STUDY_DATE, VR::DA),
    (std_tags::STUDY_TIME, VR::TM),
    (std_tags::STUDY_DESCRIPTION, VR::LO),
    (std_tags::NUMBER_OF_STUDY_RELATED_SERIES, VR::IS),
    (std_tags::NUMBER_OF_STUDY_RELATED_INSTANCES, VR::IS),
    (std_tags::PATIENT_SEX, VR::CS),
    (std_tags::PATIENT_AGE, VR::AS),
];

/// A single study, as reported by the archive over C-FIND — safe fields
/// only, no patient identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyDescriptor {
    pub accession_number: String,
    pub study_instance_uid: String,
    pub modality: String,
    pub modalities_in_study: String,
    pub study_date: String,
    pub study_time: String,
    pub study_description: String,
    pub series_count: u32,
    pub image_count: u32,
    pub patient_sex: String,
    pub patient_age: String,
}

impl StudyDescriptor {
    /// Build a descriptor from a C-FIND response identifier, defaulting
    /// missing or non-numeric count fields to zero. Reads every tag named
    /// in [`SAFE_FIELDS`] into a scratch map before assembling the typed
    /// struct from it.
    pub fn from_identifier(ds: &InMemDicomObject) -> Self {
        let values: HashMap<Tag, String> = SAFE_FIELDS
            .iter()
            .map(|&(tag, _)| (tag, string_field(ds, tag)))
            .collect();
        let get = |tag: Tag| values.get(&tag).cloned().unwrap_or_default();
        let parse_count = |tag: Tag| get(tag).trim().parse().unwrap_or(0);

        StudyDescriptor {
            accession_number: get(std_tags::ACCESSION_NUMBER),
            study_instance_uid: get(std_tags::STUDY_INSTANCE_UID),
            modality: get(std_tags::MODALITY),
            modalities_in_study: get(MODALITIES_IN_STUDY),
            study_date: get(std_tags::STUDY_DATE),
            study_time: get(std_tags::STUDY_TIME),
            study_description: get(std_tags::STUDY_DESCRIPTION),
            series_count: parse_count(std_tags::NUMBER_OF_STUDY_RELATED_SERIES),
            image_count: parse_count(std_tags::NUMBER_OF_STUDY_RELATED_INSTANCES),
            patient_sex: get(std_tags::PATIENT_SEX),
            patient_age: get(std_tags::PATIENT_AGE),
        }
    }

    /// `Modality` falling back to `ModalitiesInStudy` when blank — many
    /// archives only populate the latter at the study level. Matches
    /// `original_source/src/agent_rad_tools/loader.py`'s
    /// `study.get("Modality", "") or study.get("ModalitiesInStudy", "")`.
    pub fn modality_or_fallback(&self) -> &str {
        if self.modality.is_empty() {
            &self.modalities_in_study
        } else {
            &self.modality
        }
    }
}

fn string_field(ds: &InMemDicomObject, tag: Tag) -> String {
    ds.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_matches('\0').to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR};

    #[test]
    fn missing_count_fields_default_to_zero() {
        let mut ds = InMemDicomObject::new_empty();
        ds.put_element(DataElement::new(
            std_tags::ACCESSION_NUMBER,
            VR::SH,
            PrimitiveValue::from("ACC1"),
        ));
        let d = StudyDescriptor::from_identifier(&ds);
        assert_eq!(d.accession_number, "ACC1");
        assert_eq!(d.series_count, 0);
        assert_eq!(d.image_count, 0);
    }

    #[test]
    fn parses_populated_identifier() {
        let mut ds = InMemDicomObject::new_empty();
        ds.put_element(DataElement::new(
            std_tags::ACCESSION_NUMBER,
            VR::SH,
            PrimitiveValue::from("ACC1"),
        ));
        ds.put_element(DataElement::new(
            std_tags::MODALITY,
            VR::CS,
            PrimitiveValue::from("CT"),
        ));
        ds.put_element(DataElement::new(
            std_tags::NUMBER_OF_STUDY_RELATED_SERIES,
            VR::IS,
            PrimitiveValue::from("3"),
        ));
        ds.put_element(DataElement::new(
            std_tags::NUMBER_OF_STUDY_RELATED_INSTANCES,
            VR::IS,
            PrimitiveValue::from("150"),
        ));
        ds.put_element(DataElement::new(
            std_tags::PATIENT_SEX,
            VR::CS,
            PrimitiveValue::from("F"),
        ));
        let d = StudyDescriptor::from_identifier(&ds);
        assert_eq!(d.modality, "CT");
        assert_eq!(d.series_count, 3);
        assert_eq!(d.image_count, 150);
        assert_eq!(d.patient_sex, "F");
    }

    #[test]
    fn modality_falls_back_to_modalities_in_study_when_blank() {
        let mut ds = InMemDicomObject::new_empty();
        ds.put_element(DataElement::new(
            MODALITIES_IN_STUDY,
            VR::CS,
            PrimitiveValue::from("CT\\PT"),
        ));
        let d = StudyDescriptor::from_identifier(&ds);
        assert_eq!(d.modality, "");
        assert_eq!(d.modality_or_fallback(), "CT\\PT");
    }

    #[test]
    fn modality_takes_precedence_over_modalities_in_study_when_present() {
        let mut ds = InMemDicomObject::new_empty();
        ds.put_element(DataElement::new(
            std_tags::MODALITY,
            VR::CS,
            PrimitiveValue::from("CT"),
        ));
        ds.put_element(DataElement::new(
            MODALITIES_IN_STUDY,
            VR::CS,
            PrimitiveValue::from("CT\\PT"),
        ));
        let d = StudyDescriptor::from_identifier(&ds);
        assert_eq!(d.modality_or_fallback(), "CT");
    }
}
