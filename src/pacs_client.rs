//! PACS Client — component D.
//!
//! `echo`, `find_by_accession`, `move_study`. Wire-level structure is
//! adapted from oxidicom's `findscu.rs` (association setup, raw PDU
//! command/data framing, response loop); `move_study`'s C-MOVE response
//! handling follows `original_source/src/pacs_agent/pacs.py`'s
//! `move_study` (sub-operation counts, 0xC000 treated as failure).
//! Every association is released on every exit path via [`Association`]'s
//! `Drop` impl, mirroring spec.md §5's resource-lifecycle guarantee.

use crate::ae_title::{OurAETitle, RemoteAETitle};
use crate::error::{AssociationError, LoaderError};
use crate::study::{StudyDescriptor, SAFE_FIELDS};
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dicom_value;
use dicom::dictionary_std::{tags, uids};
use dicom::encoding::TransferSyntaxIndex;
use dicom::object::{InMemDicomObject, StandardDataDictionary};
use dicom::transfer_syntax::{entries, TransferSyntaxRegistry};
use dicom::ul::pdu::{PDataValue, PDataValueType};
use dicom::ul::{ClientAssociationOptions, Pdu};
use std::io::Read;

/// Outcome of a C-MOVE, as reported in the terminal C-MOVE-RSP.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveOutcome {
    pub completed: u16,
    pub failed: u16,
    pub warning: u16,
}

pub struct PacsClient {
    address: String,
    calling_ae: OurAETitle,
    called_ae: RemoteAETitle,
}

impl PacsClient {
    pub fn new(host: &str, port: u16, calling_ae: OurAETitle, called_ae: RemoteAETitle) -> Self {
        PacsClient {
            address: format!("{host}:{port}"),
            calling_ae,
            called_ae,
        }
    }

    /// C-ECHO. Returns `Ok(true)` if the association was established and
    /// the archive replied with success status.
    pub fn echo(&self) -> Result<bool, LoaderError> {
        let mut scu = self.associate(uids::VERIFICATION)?;
        let pc = scu.first_presentation_context()?;

        let cmd = command_from([
            DataElement::new(
                tags::AFFECTED_SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(uids::VERIFICATION),
            ),
            u16_element(tags::COMMAND_FIELD, 0x0030), // C-ECHO-RQ
            u16_element(tags::MESSAGE_ID, 1),
            u16_element(tags::COMMAND_DATA_SET_TYPE, 0x0101),
        ]);
        scu.send_command(pc, &cmd)?;

        let status = scu.receive_command_status()?;
        Ok(status == 0x0000)
    }

    /// C-FIND a study by accession number, at the STUDY query/retrieve
    /// level, requesting only [`SAFE_FIELDS`].
    pub fn find_by_accession(&self, accession: &str) -> Result<Vec<StudyDescriptor>, LoaderError> {
        let mut scu = self.associate(uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND)?;
        let pc = scu.first_presentation_context()?;
        let ts = scu.presentation_context_ts(pc)?;

        let cmd = command_from([
            DataElement::new(
                tags::AFFECTED_SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND),
            ),
            u16_element(tags::COMMAND_FIELD, 0x0020), // C-FIND-RQ
            u16_element(tags::MESSAGE_ID, 1),
            u16_element(tags::PRIORITY, 0x0000),
            u16_element(tags::COMMAND_DATA_SET_TYPE, 0x0001),
        ]);
        scu.send_command(pc, &cmd)?;

        let identifier = find_query(accession);
        scu.send_dataset(pc, &identifier, &ts)?;

        let mut descriptors = Vec::new();
        loop {
            let (status, dataset) = scu.receive_response(&ts)?;
            match status {
                0x0000 => break,
                0xFF00 | 0xFF01 => {
                    if let Some(ds) = dataset {
                        descriptors.push(StudyDescriptor::from_identifier(&ds));
                    }
                }
                other => {
                    tracing::warn!(status = format!("0x{other:04X}"), "C-FIND reported non-success status");
                    break;
                }
            }
        }
        Ok(descriptors)
    }

    /// C-MOVE a study to our own AE title (the Store Receiver).
    pub fn move_study(&self, study_uid: &str) -> Result<MoveOutcome, LoaderError> {
        let mut scu = self.associate(uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE)?;
        let pc = scu.first_presentation_context()?;
        let ts = scu.presentation_context_ts(pc)?;

        let cmd = command_from([
            DataElement::new(
                tags::AFFECTED_SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE),
            ),
            u16_element(tags::COMMAND_FIELD, 0x0021), // C-MOVE-RQ
            u16_element(tags::MESSAGE_ID, 1),
            u16_element(tags::PRIORITY, 0x0000),
            DataElement::new(
                tags::MOVE_DESTINATION,
                VR::AE,
                PrimitiveValue::from(self.calling_ae.as_str()),
            ),
            u16_element(tags::COMMAND_DATA_SET_TYPE, 0x0001),
        ]);
        scu.send_command(pc, &cmd)?;

        let mut identifier = InMemDicomObject::new_empty();
        identifier.put_element(DataElement::new(
            tags::QUERY_RETRIEVE_LEVEL,
            VR::CS,
            PrimitiveValue::from("STUDY"),
        ));
        identifier.put_element(DataElement::new(
            tags::STUDY_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(study_uid),
        ));
        scu.send_dataset(pc, &identifier, &ts)?;

        let mut outcome = MoveOutcome::default();
        loop {
            let (status, cmd_obj) = scu.receive_move_response()?;
            match status {
                0x0000 => {
                    outcome = read_move_counts(&cmd_obj);
                    break;
                }
                0xFF00 | 0xFF01 => continue, // pending, sub-operations in progress
                0xC000 => return Err(LoaderError::MoveFailed(status)),
                other => return Err(LoaderError::MoveFailed(other)),
            }
        }
        Ok(outcome)
    }

    /// Establish an association with the PACS. Fails with
    /// [`LoaderError::Unreachable`] if the association cannot be
    /// established, per spec — callers never see the lower-level
    /// [`AssociationError`] for this failure mode.
    fn associate(&self, abstract_syntax: &'static str) -> Result<Association, LoaderError> {
        let options = ClientAssociationOptions::new()
            .with_abstract_syntax(abstract_syntax)
            .calling_ae_title(self.calling_ae.as_str())
            .called_ae_title(self.called_ae.as_str())
            .max_pdu_length(16384);
        let inner = options.establish_with(&self.address).map_err(|e| {
            tracing::warn!(address = %self.address, error = %e, "could not establish association with PACS");
            LoaderError::Unreachable
        })?;
        Ok(Association { inner: Some(inner) })
    }
}

fn read_move_counts(cmd_obj: &InMemDicomObject) -> MoveOutcome {
    MoveOutcome {
        completed: u16_field(cmd_obj, tags::NUMBER_OF_COMPLETED_SUBOPERATIONS),
        failed: u16_field(cmd_obj, tags::NUMBER_OF_FAILED_SUBOPERATIONS),
        warning: u16_field(cmd_obj, tags::NUMBER_OF_WARNING_SUBOPERATIONS),
    }
}

fn u16_field(ds: &InMemDicomObject, tag: dicom::core::Tag) -> u16 {
    ds.element(tag).and_then(|e| e.to_int()).unwrap_or(0)
}

/// Build the STUDY-level C-FIND identifier: `AccessionNumber` as the
/// match key, every other field in [`SAFE_FIELDS`] requested empty
/// (matching `original_source/src/pacs_agent/pacs.py`'s
/// `find_by_accession`). Iterates the same list `StudyDescriptor::from_identifier`
/// extracts from, so request and response can never drift apart.
fn find_query(accession: &str) -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    obj.put_element(DataElement::new(
        tags::QUERY_RETRIEVE_LEVEL,
        VR::CS,
        PrimitiveValue::from("STUDY"),
    ));
    for &(tag, vr) in SAFE_FIELDS {
        let value = if tag == tags::ACCESSION_NUMBER {
            PrimitiveValue::from(accession)
        } else {
            PrimitiveValue::Empty
        };
        obj.put_element(DataElement::new(tag, vr, value));
    }
    obj
}

fn u16_element(tag: dicom::core::Tag, value: u16) -> DataElement {
    DataElement::new(tag, VR::US, dicom_value!(U16, [value]))
}

fn command_from(
    elements: impl IntoIterator<Item = DataElement>,
) -> InMemDicomObject<StandardDataDictionary> {
    InMemDicomObject::command_from_element_iter(elements)
}

/// A wire-level association, guaranteed to be released or aborted on
/// drop regardless of which exit path was taken. `inner` is `Some` for
/// the association's whole lifetime except during the `Drop` impl,
/// which needs to consume it by value to send the release PDU.
struct Association {
    inner: Option<dicom::ul::ClientAssociation<std::net::TcpStream>>,
}

impl Association {
    fn get(&self) -> &dicom::ul::ClientAssociation<std::net::TcpStream> {
        self.inner.as_ref().expect("association used after release")
    }

    fn get_mut(&mut self) -> &mut dicom::ul::ClientAssociation<std::net::TcpStream> {
        self.inner.as_mut().expect("association used after release")
    }

    fn first_presentation_context(&self) -> Result<u8, LoaderError> {
        self.get()
            .presentation_contexts()
            .first()
            .map(|pc| pc.id)
            .ok_or_else(|| AssociationError::MissingPresentationContext.into())
    }

    fn presentation_context_ts(
        &self,
        pc_id: u8,
    ) -> Result<&'static dicom::transfer_syntax::TransferSyntax, LoaderError> {
        let pc = self
            .get()
            .presentation_contexts()
            .iter()
            .find(|pc| pc.id == pc_id)
            .ok_or(AssociationError::MissingPresentationContext)?;
        TransferSyntaxRegistry
            .get(&pc.transfer_syntax)
            .ok_or_else(|| AssociationError::CannotRespond("negotiated an unsupported transfer syntax").into())
    }

    fn send_command(
        &mut self,
        pc_id: u8,
        cmd: &InMemDicomObject<StandardDataDictionary>,
    ) -> Result<(), LoaderError> {
        let mut data = Vec::with_capacity(128);
        cmd.write_dataset_with_ts(&mut data, &entries::IMPLICIT_VR_LITTLE_ENDIAN.erased())
            .map_err(|_| AssociationError::CannotRespond("failed to write command"))?;
        let pdu = Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id: pc_id,
                value_type: PDataValueType::Command,
                is_last: true,
                data,
            }],
        };
        self.get_mut()
            .send(&pdu)
            .map_err(|e| AssociationError::PduReception(e.to_string()).into())
    }

    fn send_dataset(
        &mut self,
        pc_id: u8,
        obj: &InMemDicomObject,
        ts: &dicom::transfer_syntax::TransferSyntax,
    ) -> Result<(), LoaderError> {
        let mut data = Vec::with_capacity(256);
        obj.write_dataset_with_ts(&mut data, ts)
            .map_err(|_| AssociationError::CannotRespond("failed to write identifier dataset"))?;
        let pdu = Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id: pc_id,
                value_type: PDataValueType::Data,
                is_last: true,
                data,
            }],
        };
        self.get_mut()
            .send(&pdu)
            .map_err(|e| AssociationError::PduReception(e.to_string()).into())
    }

    fn receive_command_status(&mut self) -> Result<u16, LoaderError> {
        let pdu = self
            .get_mut()
            .receive()
            .map_err(|e| AssociationError::PduReception(e.to_string()))?;
        match pdu {
            Pdu::PData { data } => {
                let cmd_obj = InMemDicomObject::read_dataset_with_ts(
                    data[0].data.as_slice(),
                    &entries::IMPLICIT_VR_LITTLE_ENDIAN.erased(),
                )
                .map_err(|e| AssociationError::FailedToReadObject(e.to_string()))?;
                cmd_obj
                    .element(tags::STATUS)
                    .map_err(|_| AssociationError::MissingTag(tags::STATUS))?
                    .to_int()
                    .map_err(|_| AssociationError::InvalidNumber(tags::STATUS).into())
            }
            other => {
                tracing::error!(pdu = ?other, "unexpected response while awaiting status");
                Err(AssociationError::CannotRespond("unexpected PDU while awaiting status").into())
            }
        }
    }

    fn receive_response(
        &mut self,
        ts: &dicom::transfer_syntax::TransferSyntax,
    ) -> Result<(u16, Option<InMemDicomObject>), LoaderError> {
        let pdu = self
            .get_mut()
            .receive()
            .map_err(|e| AssociationError::PduReception(e.to_string()))?;
        let data = match pdu {
            Pdu::PData { data } => data,
            _ => return Err(AssociationError::CannotRespond("unexpected PDU from archive").into()),
        };
        let cmd_obj = InMemDicomObject::read_dataset_with_ts(
            data[0].data.as_slice(),
            &entries::IMPLICIT_VR_LITTLE_ENDIAN.erased(),
        )
        .map_err(|e| AssociationError::FailedToReadObject(e.to_string()))?;
        let status: u16 = cmd_obj
            .element(tags::STATUS)
            .map_err(|_| AssociationError::MissingTag(tags::STATUS))?
            .to_int()
            .map_err(|_| AssociationError::InvalidNumber(tags::STATUS))?;

        if status != 0xFF00 && status != 0xFF01 {
            return Ok((status, None));
        }

        let mut rsp = self.get_mut().receive_pdata();
        let mut response_data = Vec::new();
        rsp.read_to_end(&mut response_data)
            .map_err(AssociationError::Io)?;
        let dataset = InMemDicomObject::read_dataset_with_ts(&response_data[..], ts)
            .map_err(|e| AssociationError::FailedToReadObject(e.to_string()))?;
        Ok((status, Some(dataset)))
    }

    fn receive_move_response(&mut self) -> Result<(u16, InMemDicomObject), LoaderError> {
        let pdu = self
            .get_mut()
            .receive()
            .map_err(|e| AssociationError::PduReception(e.to_string()))?;
        let data = match pdu {
            Pdu::PData { data } => data,
            _ => return Err(AssociationError::CannotRespond("unexpected PDU from archive").into()),
        };
        let cmd_obj = InMemDicomObject::read_dataset_with_ts(
            data[0].data.as_slice(),
            &entries::IMPLICIT_VR_LITTLE_ENDIAN.erased(),
        )
        .map_err(|e| AssociationError::FailedToReadObject(e.to_string()))?;
        let status: u16 = cmd_obj
            .element(tags::STATUS)
            .map_err(|_| AssociationError::MissingTag(tags::STATUS))?
            .to_int()
            .map_err(|_| AssociationError::InvalidNumber(tags::STATUS))?;
        Ok((status, cmd_obj))
    }
}

impl Drop for Association {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            let _ = inner.release();
        }
    }
}
