//! Allowlist-based anonymization — component B.
//!
//! Ported from `original_source/src/agent_rad_tools/anonymize.py`. The
//! four-step algorithm is unchanged: delete private tags, delete PHI
//! tags, delete off-allowlist sequences, delete everything else not on
//! the allowlist, then re-stamp patient identity with the case ID and
//! mark the dataset as deidentified. File meta (group 0x0002) is never
//! visited — `InMemDicomObject`'s element iterator only covers the
//! dataset, never the separately-stored [`dicom::object::FileMetaTable`].

use crate::tags::{is_private, KEEP, PHI};
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::tags as std_tags;
use dicom::object::InMemDicomObject;

/// Marker tags stamped onto every anonymized dataset.
const PATIENT_IDENTITY_REMOVED: Tag = Tag(0x0012, 0x0062);
const DEIDENTIFICATION_METHOD: Tag = Tag(0x0012, 0x0063);

const DEIDENTIFICATION_METHOD_VALUE: &str = "rad-loader allowlist v1";

/// Anonymize `ds` in place, replacing patient identity with `case_id`.
///
/// Idempotent: running this twice on the same object with the same
/// `case_id` produces the same result, since the set of tags it keeps
/// is always a subset of [`KEEP`] plus the two identity/marker tags it
/// itself writes, all of which it is also willing to overwrite.
pub fn anonymize(ds: &mut InMemDicomObject, case_id: &str) {
    let to_delete: Vec<Tag> = ds
        .iter()
        .map(|elem| elem.header().tag)
        .filter(|tag| {
            if tag.group() == 0x0002 {
                return false;
            }
            if is_private(*tag) {
                return true;
            }
            if PHI.contains(tag) {
                return true;
            }
            !KEEP.contains(tag)
        })
        .collect();

    for tag in to_delete {
        ds.remove_element(tag);
    }

    ds.put_element(DataElement::new(
        std_tags::PATIENT_NAME,
        VR::PN,
        PrimitiveValue::from(case_id),
    ));
    ds.put_element(DataElement::new(
        std_tags::PATIENT_ID,
        VR::LO,
        PrimitiveValue::from(case_id),
    ));
    ds.put_element(DataElement::new(
        PATIENT_IDENTITY_REMOVED,
        VR::CS,
        PrimitiveValue::from("YES"),
    ));
    ds.put_element(DataElement::new(
        DEIDENTIFICATION_METHOD,
        VR::LO,
        PrimitiveValue::from(DEIDENTIFICATION_METHOD_VALUE),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::header::Header;

    fn sample_object() -> InMemDicomObject {
        let mut ds = InMemDicomObject::new_empty();
        ds.put_element(DataElement::new(
            std_tags::PATIENT_NAME,
            VR::PN,
            PrimitiveValue::from("Doe^Jane"),
        ));
        ds.put_element(DataElement::new(
            std_tags::PATIENT_ID,
            VR::LO,
            PrimitiveValue::from("MRN00123"),
        ));
        ds.put_element(DataElement::new(
            std_tags::INSTITUTION_NAME,
            VR::LO,
            PrimitiveValue::from("General Hospital"),
        ));
        ds.put_element(DataElement::new(
            std_tags::STUDY_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("1.2.840.1"),
        ));
        ds.put_element(DataElement::new(
            std_tags::MODALITY,
            VR::CS,
            PrimitiveValue::from("MR"),
        ));
        ds.put_element(DataElement::new(
            Tag(0x0009, 0x0010),
            VR::LO,
            PrimitiveValue::from("SIEMENS CSA HEADER"),
        ));
        ds
    }

    #[test]
    fn removes_phi_and_private_tags() {
        let mut ds = sample_object();
        anonymize(&mut ds, "case0001");
        assert!(ds.element(std_tags::INSTITUTION_NAME).is_err());
        assert!(ds.element(Tag(0x0009, 0x0010)).is_err());
    }

    #[test]
    fn keeps_allowlisted_tags() {
        let mut ds = sample_object();
        anonymize(&mut ds, "case0001");
        assert!(ds.element(std_tags::STUDY_INSTANCE_UID).is_ok());
        assert!(ds.element(std_tags::MODALITY).is_ok());
    }

    #[test]
    fn restamps_patient_identity() {
        let mut ds = sample_object();
        anonymize(&mut ds, "case0001");
        let name = ds.element(std_tags::PATIENT_NAME).unwrap();
        assert_eq!(name.value().to_str().unwrap(), "case0001");
        let id = ds.element(std_tags::PATIENT_ID).unwrap();
        assert_eq!(id.value().to_str().unwrap(), "case0001");
    }

    #[test]
    fn marks_deidentified() {
        let mut ds = sample_object();
        anonymize(&mut ds, "case0001");
        let marker = ds.element(PATIENT_IDENTITY_REMOVED).unwrap();
        assert_eq!(marker.value().to_str().unwrap(), "YES");
    }

    #[test]
    fn is_idempotent() {
        let mut ds = sample_object();
        anonymize(&mut ds, "case0001");
        let once: Vec<Tag> = ds.iter().map(|e| e.header().tag).collect();
        anonymize(&mut ds, "case0001");
        let twice: Vec<Tag> = ds.iter().map(|e| e.header().tag).collect();
        assert_eq!(once, twice);
    }
}
