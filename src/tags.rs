//! Tag Registry — component A.
//!
//! Three immutable sets/predicates: [`PHI`], [`KEEP`], and [`is_private`].
//! Grounded field-for-field in `original_source/src/pacs_agent/tags.py`,
//! which is itself the ground truth for spec.md §4.A's "names, IDs,
//! addresses, physician names, institution" PHI categories and the full
//! acquisition/pixel-description/spatial allowlist — spec.md names
//! categories, the original enumerates the tags.

use dicom::core::Tag;
use dicom::dictionary_std::tags as std_tags;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Tags that must never leave the system, other than the re-stamped
/// identity fields (`PatientName`, `PatientID`).
pub static PHI: LazyLock<HashSet<Tag>> = LazyLock::new(|| {
    HashSet::from([
        // Patient identification
        std_tags::PATIENT_NAME,
        std_tags::PATIENT_ID,
        std_tags::PATIENT_BIRTH_DATE,
        std_tags::OTHER_PATIENT_IDS,
        std_tags::OTHER_PATIENT_NAMES,
        std_tags::ISSUER_OF_PATIENT_ID,
        Tag(0x0010, 0x1040), // PatientAddress
        Tag(0x0010, 0x2154), // PatientTelephoneNumbers
        Tag(0x0010, 0x21B0), // AdditionalPatientHistory
        std_tags::PATIENT_COMMENTS,
        // Physician / operator identification
        std_tags::REFERRING_PHYSICIAN_NAME,
        std_tags::PERFORMING_PHYSICIAN_NAME,
        std_tags::OPERATORS_NAME,
        std_tags::REQUESTING_PHYSICIAN,
        // Institution
        std_tags::INSTITUTION_NAME,
        std_tags::INSTITUTION_ADDRESS,
        // Sequences that may contain PHI
        Tag(0x0040, 0x0275), // RequestAttributesSequence
    ])
});

/// Tags permitted to survive anonymization, plus pixel data and file meta.
/// Only tags in this set (or group 0x0002) are ever persisted.
pub static KEEP: LazyLock<HashSet<Tag>> = LazyLock::new(|| {
    HashSet::from([
        // Identifiers (non-patient). StudyID (0020,0010) deliberately
        // excluded — it can mirror PatientID at some sites.
        std_tags::ACCESSION_NUMBER,
        std_tags::STUDY_INSTANCE_UID,
        std_tags::SERIES_INSTANCE_UID,
        std_tags::SOP_INSTANCE_UID,
        std_tags::SOP_CLASS_UID,
        std_tags::FRAME_OF_REFERENCE_UID,
        // Study/Series metadata
        std_tags::SPECIFIC_CHARACTER_SET,
        std_tags::IMAGE_TYPE,
        std_tags::STUDY_DATE,
        std_tags::SERIES_DATE,
        std_tags::STUDY_TIME,
        std_tags::SERIES_TIME,
        std_tags::MODALITY,
        Tag(0x0008, 0x0061), // ModalitiesInStudy
        std_tags::STUDY_DESCRIPTION,
        std_tags::SERIES_DESCRIPTION,
        std_tags::SERIES_NUMBER,
        std_tags::INSTANCE_NUMBER,
        std_tags::MANUFACTURER,
        std_tags::MANUFACTURER_MODEL_NAME,
        std_tags::SOFTWARE_VERSIONS,
        Tag(0x0020, 0x4000), // ImageComments
        // Patient demographics (non-identifying alone)
        std_tags::PATIENT_SEX,
        std_tags::PATIENT_AGE,
        std_tags::PATIENT_SIZE,
        std_tags::PATIENT_WEIGHT,
        // Acquisition parameters (group 0x0018)
        std_tags::CONTRAST_BOLUS_AGENT,
        std_tags::BODY_PART_EXAMINED,
        std_tags::SCANNING_SEQUENCE,
        std_tags::SEQUENCE_VARIANT,
        std_tags::SCAN_OPTIONS,
        std_tags::MR_ACQUISITION_TYPE,
        std_tags::SEQUENCE_NAME,
        std_tags::SLICE_THICKNESS,
        std_tags::KVP,
        std_tags::REPETITION_TIME,
        std_tags::ECHO_TIME,
        std_tags::INVERSION_TIME,
        std_tags::NUMBER_OF_AVERAGES,
        std_tags::IMAGING_FREQUENCY,
        std_tags::IMAGED_NUCLEUS,
        std_tags::ECHO_NUMBERS,
        std_tags::MAGNETIC_FIELD_STRENGTH,
        std_tags::SPACING_BETWEEN_SLICES,
        std_tags::DATA_COLLECTION_DIAMETER,
        std_tags::ECHO_TRAIN_LENGTH,
        std_tags::PERCENT_SAMPLING,
        std_tags::PERCENT_PHASE_FIELD_OF_VIEW,
        std_tags::PIXEL_BANDWIDTH,
        std_tags::DEVICE_SERIAL_NUMBER,
        std_tags::PROTOCOL_NAME,
        std_tags::CONTRAST_BOLUS_ROUTE,
        std_tags::SPATIAL_RESOLUTION,
        std_tags::TRIGGER_TIME,
        std_tags::RECONSTRUCTION_DIAMETER,
        std_tags::DISTANCE_SOURCE_TO_DETECTOR,
        std_tags::DISTANCE_SOURCE_TO_PATIENT,
        std_tags::GANTRY_DETECTOR_TILT,
        std_tags::TABLE_HEIGHT,
        std_tags::ROTATION_DIRECTION,
        std_tags::EXPOSURE_TIME,
        std_tags::XRAY_TUBE_CURRENT,
        std_tags::EXPOSURE,
        Tag(0x0018, 0x1153), // ExposureInuAs
        std_tags::FILTER_TYPE,
        std_tags::GENERATOR_POWER,
        std_tags::FOCAL_SPOTS,
        std_tags::DATE_OF_LAST_CALIBRATION,
        std_tags::TIME_OF_LAST_CALIBRATION,
        std_tags::CONVOLUTION_KERNEL,
        std_tags::RECEIVE_COIL_NAME,
        std_tags::TRANSMIT_COIL_NAME,
        std_tags::ACQUISITION_MATRIX,
        std_tags::IN_PLANE_PHASE_ENCODING_DIRECTION,
        std_tags::FLIP_ANGLE,
        std_tags::SAR,
        std_tags::PATIENT_POSITION,
        Tag(0x0018, 0x9073), // AcquisitionDuration
        Tag(0x0018, 0x9087), // DiffusionBValue
        Tag(0x0018, 0x9089), // DiffusionGradientOrientation
        // Pixel description (group 0x0028)
        std_tags::SAMPLES_PER_PIXEL,
        std_tags::PHOTOMETRIC_INTERPRETATION,
        std_tags::PLANAR_CONFIGURATION,
        std_tags::NUMBER_OF_FRAMES,
        std_tags::ROWS,
        std_tags::COLUMNS,
        std_tags::PIXEL_SPACING,
        std_tags::BITS_ALLOCATED,
        std_tags::BITS_STORED,
        std_tags::HIGH_BIT,
        std_tags::PIXEL_REPRESENTATION,
        std_tags::PIXEL_PADDING_VALUE,
        std_tags::WINDOW_CENTER,
        std_tags::WINDOW_WIDTH,
        std_tags::RESCALE_INTERCEPT,
        std_tags::RESCALE_SLOPE,
        std_tags::RESCALE_TYPE,
        std_tags::WINDOW_CENTER_WIDTH_EXPLANATION,
        std_tags::LOSSY_IMAGE_COMPRESSION,
        std_tags::LOSSY_IMAGE_COMPRESSION_RATIO,
        // Spatial / positioning
        std_tags::IMAGE_POSITION_PATIENT,
        std_tags::IMAGE_ORIENTATION_PATIENT,
        std_tags::SLICE_LOCATION,
        // Pixel data
        std_tags::PIXEL_DATA,
        // File meta (group 0x0002), carried here for completeness though
        // the Anonymizer never examines file meta at all — see anonymize.rs.
        Tag(0x0002, 0x0000),
        Tag(0x0002, 0x0001),
        Tag(0x0002, 0x0002),
        Tag(0x0002, 0x0003),
        Tag(0x0002, 0x0010),
        Tag(0x0002, 0x0012),
        Tag(0x0002, 0x0013),
        // Count tags surfaced by C-FIND responses
        std_tags::NUMBER_OF_SERIES_RELATED_INSTANCES,
        std_tags::NUMBER_OF_STUDY_RELATED_INSTANCES,
        Tag(0x0020, 0x1209), // NumberOfStudyRelatedSeries (non-standard but common)
    ])
});

/// Private tags (odd group numbers) are always deleted.
pub fn is_private(tag: Tag) -> bool {
    tag.group() % 2 != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phi_and_keep_are_disjoint() {
        assert!(PHI.is_disjoint(&KEEP));
    }

    #[test]
    fn patient_identity_tags_are_phi_not_keep() {
        assert!(PHI.contains(&std_tags::PATIENT_NAME));
        assert!(PHI.contains(&std_tags::PATIENT_ID));
        assert!(!KEEP.contains(&std_tags::PATIENT_NAME));
        assert!(!KEEP.contains(&std_tags::PATIENT_ID));
    }

    #[test]
    fn pixel_data_is_kept() {
        assert!(KEEP.contains(&Tag(0x7FE0, 0x0010)));
    }

    #[test]
    fn file_meta_group_is_kept() {
        assert!(KEEP.contains(&Tag(0x0002, 0x0010)));
    }

    #[test]
    fn odd_group_is_private() {
        assert!(is_private(Tag(0x0009, 0x0001)));
        assert!(!is_private(Tag(0x0008, 0x0001)));
    }
}
