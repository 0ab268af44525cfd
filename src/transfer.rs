//! Storage presentation contexts the Store Receiver advertises.
//!
//! spec.md §4.E: "advertising *all known storage presentation contexts*".
//! The list of standard storage SOP class UIDs is grounded in the
//! `ABSTRACT_SYNTAXES` constant from the movescu storage example in the
//! retrieval pack; the three Siemens private SOP classes are carried
//! over from oxidicom's [`crate::private_sop_uids`], since archives in
//! practice also emit vendor-private "storage" objects for raw scanner
//! data that this loader still needs to accept (and then strip down to
//! the allowlist, same as anything else).

use crate::private_sop_uids::{
    SIEMENS_AX_FRAME_SETS_STORAGE, SIEMENS_CSA_NON_IMAGE_STORAGE, SIEMENS_CT_MR_VOLUME_STORAGE,
};
use dicom::dictionary_std::uids;

#[allow(deprecated)]
pub static STORAGE_ABSTRACT_SYNTAXES: &[&str] = &[
    uids::CT_IMAGE_STORAGE,
    uids::ENHANCED_CT_IMAGE_STORAGE,
    uids::STANDALONE_CURVE_STORAGE,
    uids::STANDALONE_OVERLAY_STORAGE,
    uids::SECONDARY_CAPTURE_IMAGE_STORAGE,
    uids::ULTRASOUND_IMAGE_STORAGE_RETIRED,
    uids::NUCLEAR_MEDICINE_IMAGE_STORAGE_RETIRED,
    uids::MR_IMAGE_STORAGE,
    uids::ENHANCED_MR_IMAGE_STORAGE,
    uids::MR_SPECTROSCOPY_STORAGE,
    uids::ENHANCED_MR_COLOR_IMAGE_STORAGE,
    uids::ULTRASOUND_MULTI_FRAME_IMAGE_STORAGE_RETIRED,
    uids::COMPUTED_RADIOGRAPHY_IMAGE_STORAGE,
    uids::DIGITAL_X_RAY_IMAGE_STORAGE_FOR_PRESENTATION,
    uids::DIGITAL_X_RAY_IMAGE_STORAGE_FOR_PROCESSING,
    uids::ENCAPSULATED_PDF_STORAGE,
    uids::ENCAPSULATED_CDA_STORAGE,
    uids::GRAYSCALE_SOFTCOPY_PRESENTATION_STATE_STORAGE,
    uids::POSITRON_EMISSION_TOMOGRAPHY_IMAGE_STORAGE,
    uids::BREAST_TOMOSYNTHESIS_IMAGE_STORAGE,
    uids::ENHANCED_PET_IMAGE_STORAGE,
    uids::RT_IMAGE_STORAGE,
    uids::NUCLEAR_MEDICINE_IMAGE_STORAGE,
    uids::ULTRASOUND_MULTI_FRAME_IMAGE_STORAGE,
    uids::MULTI_FRAME_SINGLE_BIT_SECONDARY_CAPTURE_IMAGE_STORAGE,
    uids::MULTI_FRAME_GRAYSCALE_BYTE_SECONDARY_CAPTURE_IMAGE_STORAGE,
    uids::MULTI_FRAME_GRAYSCALE_WORD_SECONDARY_CAPTURE_IMAGE_STORAGE,
    uids::MULTI_FRAME_TRUE_COLOR_SECONDARY_CAPTURE_IMAGE_STORAGE,
    uids::BASIC_TEXT_SR_STORAGE,
    uids::ENHANCED_SR_STORAGE,
    uids::COMPREHENSIVE_SR_STORAGE,
    SIEMENS_AX_FRAME_SETS_STORAGE,
    SIEMENS_CSA_NON_IMAGE_STORAGE,
    SIEMENS_CT_MR_VOLUME_STORAGE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_is_nonempty_and_deduplicated() {
        let mut sorted = STORAGE_ABSTRACT_SYNTAXES.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), STORAGE_ABSTRACT_SYNTAXES.len());
    }
}
