//! Store Receiver — component E.
//!
//! A temporary C-STORE SCP, one per retrieval session: `start()` binds a
//! listener and spawns a background accept loop on a [`ThreadPool`] (same
//! shape as oxidicom's `server.rs`+`scp.rs`); `stop()` tears the listener
//! down and returns the per-series file counts. Every received dataset is
//! anonymized with the session's fixed `case_id` before it ever touches
//! disk, mirroring `original_source/src/agent_rad_tools/scp.py`'s
//! `TemporarySCP`.
//!
//! A single instance with non-conforming metadata (archives routinely emit
//! harmless but non-standard VR content, e.g. a Philips sorting code in a
//! UI field) is logged and answered with a C-STORE failure status rather
//! than aborting the whole association — the rest of the handler, and the
//! rest of the study, keeps going.

use crate::anonymize::anonymize;
use crate::error::{AssociationError, LoaderError};
use crate::threads::ThreadPool;
use crate::transfer::STORAGE_ABSTRACT_SYNTAXES;
use camino::Utf8PathBuf;
use dicom::core::{DataElement, VR};
use dicom::dicom_value;
use dicom::dictionary_std::{tags, StandardDataDictionary};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::TransferSyntaxRegistry;
use dicom::ul::pdu::PDataValueType;
use dicom::ul::Pdu;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Per-series receive counts, keyed by `SeriesInstanceUID` (or `"unknown"`
/// when a received dataset carries none).
#[derive(Debug, Default, Clone)]
struct ReceivedIndex {
    /// Series, in first-seen order, each with the number of instances
    /// received so far.
    series: Vec<(String, u32)>,
}

impl ReceivedIndex {
    fn record(&mut self, series_uid: &str) -> (u32, u32) {
        if let Some(pos) = self.series.iter().position(|(uid, _)| uid == series_uid) {
            self.series[pos].1 += 1;
            ((pos + 1) as u32, self.series[pos].1)
        } else {
            self.series.push((series_uid.to_string(), 1));
            (self.series.len() as u32, 1)
        }
    }

    fn series_count(&self) -> u32 {
        self.series.len() as u32
    }

    fn image_count(&self) -> u32 {
        self.series.iter().map(|(_, n)| n).sum()
    }
}

/// Counts reported back by [`StoreReceiver::stop`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveCounts {
    pub series_count: u32,
    pub image_count: u32,
}

struct Session {
    project_dir: Utf8PathBuf,
    case_id: String,
    calling_ae_title: String,
    index: Mutex<ReceivedIndex>,
}

/// A temporary C-STORE SCP bound to one retrieval session (one project,
/// one case ID). Construct fresh per accession; never reused.
pub struct StoreReceiver {
    session: Arc<Session>,
    listener: Option<TcpListener>,
    accept_thread: Option<JoinHandle<()>>,
}

impl StoreReceiver {
    pub fn new(
        project_dir: Utf8PathBuf,
        case_id: impl Into<String>,
        calling_ae_title: impl Into<String>,
    ) -> Self {
        StoreReceiver {
            session: Arc::new(Session {
                project_dir,
                case_id: case_id.into(),
                calling_ae_title: calling_ae_title.into(),
                index: Mutex::new(ReceivedIndex::default()),
            }),
            listener: None,
            accept_thread: None,
        }
    }

    /// Bind `0.0.0.0:port` and start accepting associations in the
    /// background. Returns once the listener is bound.
    pub fn start(&mut self, port: u16) -> Result<(), LoaderError> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        tracing::info!(port, case_id = %self.session.case_id, "store receiver listening");

        let session = Arc::clone(&self.session);
        let accept_listener = listener.try_clone()?;

        let accept_thread = std::thread::spawn(move || {
            let mut pool = ThreadPool::new(4, "store-receiver");
            for stream in accept_listener.incoming() {
                match stream {
                    Ok(scu_stream) => {
                        let session = Arc::clone(&session);
                        pool.execute(move || {
                            if let Err(e) = handle_incoming_association(scu_stream, &session) {
                                tracing::error!(error = %e, "error handling incoming association");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "accept loop stopping");
                        break;
                    }
                }
            }
            pool.shutdown();
        });

        self.listener = Some(listener);
        self.accept_thread = Some(accept_thread);
        Ok(())
    }

    /// Stop accepting new associations and return the counts received so
    /// far. Does not wait for in-flight associations beyond closing the
    /// listening socket; callers apply their own grace period before
    /// calling this (spec.md's C-MOVE grace-sleep).
    pub fn stop(mut self) -> ReceiveCounts {
        // Dropping the listener unblocks `incoming()` on most platforms;
        // the accept thread then exits its loop on the next failed accept.
        drop(self.listener.take());
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        let index = self.session.index.lock().expect("index mutex poisoned");
        ReceiveCounts {
            series_count: index.series_count(),
            image_count: index.image_count(),
        }
    }
}

fn handle_incoming_association(
    scu_stream: TcpStream,
    session: &Session,
) -> Result<(), AssociationError> {
    let mut options = dicom::ul::association::ServerAssociationOptions::new()
        .accept_any()
        .ae_title(&session.calling_ae_title);

    for ts in TransferSyntaxRegistry.iter() {
        if !ts.is_unsupported() {
            options = options.with_transfer_syntax(ts.uid());
        }
    }
    for uid in STORAGE_ABSTRACT_SYNTAXES {
        options = options.with_abstract_syntax(*uid);
    }
    options = options.with_abstract_syntax(dicom::dictionary_std::uids::VERIFICATION);

    let mut association = options
        .establish(scu_stream)
        .map_err(AssociationError::CouldNotEstablish)?;

    let mut instance_buffer: Vec<u8> = Vec::with_capacity(1024 * 1024);
    let mut msgid: u16 = 1;
    let mut sop_class_uid = String::new();
    let mut sop_instance_uid = String::new();

    loop {
        let pdu = match association.receive() {
            Ok(pdu) => pdu,
            Err(dicom::ul::association::server::Error::Receive { source })
                if matches!(
                    source,
                    dicom::ul::pdu::reader::Error::NoPduAvailable { .. }
                ) =>
            {
                continue;
            }
            Err(e) => return Err(AssociationError::PduReception(e.to_string())),
        };

        match pdu {
            Pdu::PData { ref data } if data.is_empty() => continue,
            Pdu::PData { mut data } => {
                if data[0].value_type == PDataValueType::Data && !data[0].is_last {
                    instance_buffer.append(&mut data[0].data);
                } else if data[0].value_type == PDataValueType::Command && data[0].is_last {
                    let ts = dicom::transfer_syntax::entries::IMPLICIT_VR_LITTLE_ENDIAN.erased();
                    let obj = InMemDicomObject::read_dataset_with_ts(data[0].data.as_slice(), &ts)
                        .map_err(AssociationError::FailedToReadCommand)?;
                    let command_field = obj
                        .element(tags::COMMAND_FIELD)
                        .map_err(|_| AssociationError::MissingTag(tags::COMMAND_FIELD))?
                        .uint16()
                        .map_err(|_| AssociationError::InvalidNumber(tags::COMMAND_FIELD))?;

                    if command_field == 0x0030 {
                        let rsp = create_cecho_response(msgid);
                        let ts = dicom::transfer_syntax::entries::IMPLICIT_VR_LITTLE_ENDIAN.erased();
                        let mut rsp_data = Vec::new();
                        rsp.write_dataset_with_ts(&mut rsp_data, &ts)
                            .map_err(|_| AssociationError::CannotRespond("could not write C-ECHO response"))?;
                        association
                            .send(&Pdu::PData {
                                data: vec![dicom::ul::pdu::PDataValue {
                                    presentation_context_id: data[0].presentation_context_id,
                                    value_type: PDataValueType::Command,
                                    is_last: true,
                                    data: rsp_data,
                                }],
                            })
                            .map_err(|_| AssociationError::CannotRespond("failed to send C-ECHO response"))?;
                    } else {
                        msgid = obj
                            .element(tags::MESSAGE_ID)
                            .map_err(|_| AssociationError::MissingTag(tags::MESSAGE_ID))?
                            .to_int()
                            .map_err(|_| AssociationError::InvalidNumber(tags::MESSAGE_ID))?;
                        sop_class_uid = obj
                            .element(tags::AFFECTED_SOP_CLASS_UID)
                            .map_err(|_| AssociationError::MissingTag(tags::AFFECTED_SOP_CLASS_UID))?
                            .to_str()
                            .map_err(|_| AssociationError::MissingTag(tags::AFFECTED_SOP_CLASS_UID))?
                            .to_string();
                        sop_instance_uid = obj
                            .element(tags::AFFECTED_SOP_INSTANCE_UID)
                            .map_err(|_| AssociationError::MissingTag(tags::AFFECTED_SOP_INSTANCE_UID))?
                            .to_str()
                            .map_err(|_| AssociationError::MissingTag(tags::AFFECTED_SOP_INSTANCE_UID))?
                            .to_string();
                    }
                    instance_buffer.clear();
                } else if data[0].value_type == PDataValueType::Data && data[0].is_last {
                    instance_buffer.append(&mut data[0].data);

                    // A single malformed instance (e.g. a non-conforming VR value
                    // such as a Philips sorting code in a UI field) must not abort
                    // the whole association — it is logged and skipped, tolerated
                    // for the rest of this store handler, matching
                    // `original_source/src/agent_rad_tools/scp.py`'s per-handler
                    // leniency around non-standard metadata.
                    let outcome = (|| -> Result<(), AssociationError> {
                        let pc = association
                            .presentation_contexts()
                            .iter()
                            .find(|pc| pc.id == data[0].presentation_context_id)
                            .ok_or(AssociationError::MissingPresentationContext)?;
                        let ts = TransferSyntaxRegistry.get(&pc.transfer_syntax).ok_or_else(|| {
                            AssociationError::CannotRespond("negotiated an unsupported transfer syntax")
                        })?;

                        let mut obj =
                            InMemDicomObject::read_dataset_with_ts(instance_buffer.as_slice(), ts)
                                .map_err(|e| AssociationError::FailedToReadObject(e.to_string()))?;

                        let file_meta = FileMetaTableBuilder::new()
                            .media_storage_sop_class_uid(
                                obj.element(tags::SOP_CLASS_UID)
                                    .map_err(|_| AssociationError::MissingTag(tags::SOP_CLASS_UID))?
                                    .to_str()
                                    .map_err(|_| AssociationError::MissingTag(tags::SOP_CLASS_UID))?,
                            )
                            .media_storage_sop_instance_uid(
                                obj.element(tags::SOP_INSTANCE_UID)
                                    .map_err(|_| AssociationError::MissingTag(tags::SOP_INSTANCE_UID))?
                                    .to_str()
                                    .map_err(|_| AssociationError::MissingTag(tags::SOP_INSTANCE_UID))?,
                            )
                            .transfer_syntax(ts.uid())
                            .build()
                            .map_err(|e| AssociationError::FailedToBuildMeta(e.to_string()))?;

                        let series_uid = obj
                            .element(tags::SERIES_INSTANCE_UID)
                            .ok()
                            .and_then(|e| e.to_str().ok())
                            .map(|s| s.trim_matches('\0').to_string())
                            .filter(|s| !s.is_empty())
                            .unwrap_or_else(|| "unknown".to_string());

                        let (series_ordinal, instance_ordinal) = {
                            let mut index = session.index.lock().expect("index mutex poisoned");
                            index.record(&series_uid)
                        };

                        anonymize(&mut obj, &session.case_id);
                        let obj = obj.with_exact_meta(file_meta);
                        save_instance(session, &obj, series_ordinal, instance_ordinal)
                            .map_err(|e| AssociationError::FailedToBuildMeta(e.to_string()))?;
                        Ok(())
                    })();

                    if let Err(e) = &outcome {
                        tracing::warn!(error = %e, "skipping unparseable or unstorable instance");
                    }

                    let status = if outcome.is_ok() { 0x0000 } else { 0xC000 };
                    let ts_implicit = dicom::transfer_syntax::entries::IMPLICIT_VR_LITTLE_ENDIAN.erased();
                    let rsp = create_cstore_response(msgid, &sop_class_uid, &sop_instance_uid, status);
                    let mut rsp_data = Vec::new();
                    rsp.write_dataset_with_ts(&mut rsp_data, &ts_implicit)
                        .map_err(|_| AssociationError::CannotRespond("could not write C-STORE response"))?;
                    association
                        .send(&Pdu::PData {
                            data: vec![dicom::ul::pdu::PDataValue {
                                presentation_context_id: data[0].presentation_context_id,
                                value_type: PDataValueType::Command,
                                is_last: true,
                                data: rsp_data,
                            }],
                        })
                        .map_err(|_| AssociationError::CannotRespond("failed to send C-STORE response"))?;
                }
            }
            Pdu::ReleaseRQ => {
                let _ = association.send(&Pdu::ReleaseRP);
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

fn save_instance(
    session: &Session,
    obj: &InMemDicomObject,
    series_ordinal: u32,
    instance_ordinal: u32,
) -> Result<(), LoaderError> {
    let series_dir = session
        .project_dir
        .join(&session.case_id)
        .join(format!("series{series_ordinal:02}"));
    fs_err::create_dir_all(&series_dir)?;
    let file_path = series_dir.join(format!("{instance_ordinal:05}.dcm"));
    obj.write_to_file(file_path.as_std_path())
        .map_err(|e| AssociationError::FailedToBuildMeta(e.to_string()))?;
    Ok(())
}

fn create_cstore_response(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    status: u16,
) -> InMemDicomObject<StandardDataDictionary> {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            dicom_value!(Str, sop_class_uid),
        ),
        DataElement::new(tags::COMMAND_FIELD, VR::US, dicom_value!(U16, [0x8001])),
        DataElement::new(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            VR::US,
            dicom_value!(U16, [message_id]),
        ),
        DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            dicom_value!(U16, [0x0101]),
        ),
        DataElement::new(tags::STATUS, VR::US, dicom_value!(U16, [status])),
        DataElement::new(
            tags::AFFECTED_SOP_INSTANCE_UID,
            VR::UI,
            dicom_value!(Str, sop_instance_uid),
        ),
    ])
}

fn create_cecho_response(message_id: u16) -> InMemDicomObject<StandardDataDictionary> {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(tags::COMMAND_FIELD, VR::US, dicom_value!(U16, [0x8030])),
        DataElement::new(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            VR::US,
            dicom_value!(U16, [message_id]),
        ),
        DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            dicom_value!(U16, [0x0101]),
        ),
        DataElement::new(tags::STATUS, VR::US, dicom_value!(U16, [0x0000])),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn received_index_assigns_stable_series_ordinals() {
        let mut index = ReceivedIndex::default();
        assert_eq!(index.record("1.2.3"), (1, 1));
        assert_eq!(index.record("1.2.3"), (1, 2));
        assert_eq!(index.record("1.2.4"), (2, 1));
        assert_eq!(index.series_count(), 2);
        assert_eq!(index.image_count(), 3);
    }

    #[test]
    fn unknown_series_uid_still_counted() {
        let mut index = ReceivedIndex::default();
        index.record("unknown");
        index.record("unknown");
        assert_eq!(index.series_count(), 1);
        assert_eq!(index.image_count(), 2);
    }
}
