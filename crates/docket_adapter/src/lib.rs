#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use docket_engines::chain_rpc::{ChainRpcConfig, ChainRpcLedger};
use docket_engines::evidence::{sanitize_file_name, EvidenceConfig, EvidenceIngestRuntime};
use docket_engines::pinning::{PinningConfig, PinningRuntime};
use docket_engines::report_gen::{ReportGenConfig, ReportGenRuntime};
use docket_kernel_contracts::complaint::{ComplaintView, PinState};
use docket_kernel_contracts::ledger::{LedgerClient, StreamName};
use docket_kernel_contracts::UnixTimeMs;
use docket_os::accounts::{self, AccountFlowError};
use docket_os::casework::{CaseworkError, CaseworkRuntime};
use docket_os::intake::{ComplaintIntakeRuntime, ComplaintSubmission, IntakeError};
use docket_storage::account_store::AccountStore;
use docket_storage::complaint_store::ComplaintStore;
use docket_storage::memory_ledger::MemoryLedger;
use docket_storage::outbox::{DurableOutbox, OutboxReconcilePassMetrics};

pub const MAX_UPLOAD_BODY_BYTES: usize = 16 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoginResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateAccountRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UpdateAccountStatusRequest {
    pub email: String,
    pub status: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterAckResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EvidenceWire {
    pub file_name: String,
    pub stored_name: String,
    pub digest_hex: String,
    pub pin_state: String,
    pub cid: Option<String>,
    pub gateway_url: Option<String>,
    pub pin_detail: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComplaintWire {
    pub number: String,
    pub title: String,
    pub date: String,
    pub place: String,
    pub details: String,
    pub evidence_details: String,
    pub category: String,
    pub severity: String,
    pub status: String,
    pub created_at_ms: u64,
    pub files: Vec<EvidenceWire>,
    pub inference: Option<String>,
    pub examiner: Option<String>,
    pub inferred_at_ms: Option<u64>,
    pub receipt: Option<String>,
    pub verified: bool,
    pub chain_detail: Option<String>,
}

impl ComplaintWire {
    pub fn from_view(view: &ComplaintView) -> Self {
        let record = &view.record;
        Self {
            number: record.number.as_str().to_string(),
            title: record.title.clone(),
            date: record.date.clone(),
            place: record.place.clone(),
            details: record.details.clone(),
            evidence_details: record.evidence_details.clone(),
            category: record.category.clone(),
            severity: record.severity.as_str().to_string(),
            status: record.status.as_str().to_string(),
            created_at_ms: record.created_at.0,
            files: record
                .attachments
                .iter()
                .map(|attachment| {
                    let (pin_state, cid, gateway_url, pin_detail) = match &attachment.pin {
                        PinState::Pinned { cid, gateway_url } => (
                            "pinned",
                            Some(cid.clone()),
                            Some(gateway_url.clone()),
                            None,
                        ),
                        PinState::Failed { detail } => {
                            ("failed", None, None, Some(detail.clone()))
                        }
                    };
                    EvidenceWire {
                        file_name: attachment.file_name.clone(),
                        stored_name: attachment.stored_name.clone(),
                        digest_hex: attachment.digest_hex.clone(),
                        pin_state: pin_state.to_string(),
                        cid,
                        gateway_url,
                        pin_detail,
                    }
                })
                .collect(),
            inference: record.inference.as_ref().map(|n| n.text.clone()),
            examiner: record
                .inference
                .as_ref()
                .map(|n| n.examiner.as_str().to_string()),
            inferred_at_ms: record.inference.as_ref().map(|n| n.inferred_at.0),
            receipt: view.receipt.as_ref().map(|r| r.as_str().to_string()),
            verified: view.verified,
            chain_detail: record
                .confirmation
                .as_ref()
                .and_then(|c| c.detail.clone()),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComplaintListResponse {
    pub status: String,
    pub count: usize,
    pub skipped_records: u32,
    pub complaints: Vec<ComplaintWire>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComplaintResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub complaint: Option<ComplaintWire>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AddInferenceRequest {
    pub complaint_number: String,
    pub inference: String,
    pub examiner_email: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GenerateReportRequest {
    pub complaint_number: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GenerateReportResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub report_id: Option<String>,
    pub report: Option<String>,
    pub receipt: Option<String>,
    pub generated_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
pub struct OutboxWorkerCounters {
    pub pass_count: u64,
    pub attempted_total: u64,
    pub published_total: u64,
    pub last_still_pending: u32,
    pub last_pass_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
pub struct OutboxHealth {
    pub pending_count: usize,
    pub worker: OutboxWorkerCounters,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub outbox: OutboxHealth,
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// The HTTP surface's single state object. One mutex around it serializes
/// all store access, which de-races in-process read-modify-append sequences;
/// cross-process writers stay last-writer-wins (the chain has no conditional
/// append).
#[derive(Debug)]
pub struct AdapterRuntime<L: LedgerClient> {
    accounts: AccountStore<L>,
    complaints: ComplaintStore<L>,
    intake: ComplaintIntakeRuntime,
    casework: CaseworkRuntime,
    worker_counters: OutboxWorkerCounters,
}

pub type HttpAdapterRuntime = AdapterRuntime<ChainRpcLedger>;
pub type InMemoryAdapterRuntime = AdapterRuntime<MemoryLedger>;

impl HttpAdapterRuntime {
    /// Wires every collaborator from the environment (and the local secret
    /// vault) the way the deployment expects.
    pub fn default_from_env() -> Result<Self, String> {
        let chain_config = ChainRpcConfig::from_env();
        let accounts_stream = stream_from_env("DOCKET_ACCOUNTS_STREAM", "accounts")?;
        let complaints_stream = stream_from_env("DOCKET_COMPLAINTS_STREAM", "complaints")?;

        let data_dir = env::var("DOCKET_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        let (outbox, dropped) = DurableOutbox::open(data_dir.join("outbox.jsonl"))
            .map_err(|err| format!("outbox open failed: {err}"))?;
        if dropped > 0 {
            eprintln!("docket_adapter_http outbox load dropped_corrupt_lines={dropped}");
        }

        let accounts = AccountStore::new(
            ChainRpcLedger::new(chain_config.clone()),
            accounts_stream,
        );
        let complaints = ComplaintStore::new(
            ChainRpcLedger::new(chain_config),
            complaints_stream,
            outbox,
        );
        let intake = ComplaintIntakeRuntime::new(EvidenceIngestRuntime::new(
            EvidenceConfig::from_env(),
            PinningRuntime::new(PinningConfig::from_env()),
        ));
        let casework = CaseworkRuntime::new(ReportGenRuntime::new(ReportGenConfig::from_env()));
        Ok(Self::with_parts(accounts, complaints, intake, casework))
    }
}

impl<L: LedgerClient> AdapterRuntime<L> {
    pub fn with_parts(
        accounts: AccountStore<L>,
        complaints: ComplaintStore<L>,
        intake: ComplaintIntakeRuntime,
        casework: CaseworkRuntime,
    ) -> Self {
        Self {
            accounts,
            complaints,
            intake,
            casework,
            worker_counters: OutboxWorkerCounters::default(),
        }
    }

    pub fn run_login(&self, request: &LoginRequest) -> LoginResponse {
        match accounts::login(&self.accounts, &request.email, &request.password, &request.role)
        {
            Ok(view) => LoginResponse {
                status: "ok".to_string(),
                outcome: "ACCEPTED".to_string(),
                reason: None,
                role: Some(view.role.as_str().to_string()),
                email: Some(view.email.as_str().to_string()),
            },
            Err(AccountFlowError::Validation { field, reason }) => LoginResponse {
                status: "error".to_string(),
                outcome: "REJECTED".to_string(),
                reason: Some(format!("{field}: {reason}")),
                role: None,
                email: None,
            },
            Err(_) => LoginResponse {
                status: "error".to_string(),
                outcome: "INVALID_CREDENTIALS".to_string(),
                reason: Some("invalid credentials".to_string()),
                role: None,
                email: None,
            },
        }
    }

    pub fn run_create_account(&mut self, request: &CreateAccountRequest) -> AdapterAckResponse {
        let outcome = accounts::create_account(
            &mut self.accounts,
            &request.email,
            &request.password,
            &request.role,
            request.active.unwrap_or(true),
        );
        match outcome {
            Ok(receipt) => AdapterAckResponse {
                status: "ok".to_string(),
                outcome: "ACCEPTED".to_string(),
                reason: None,
                receipt: Some(receipt.as_str().to_string()),
            },
            Err(err) => account_flow_ack(err),
        }
    }

    pub fn run_update_account_status(
        &mut self,
        request: &UpdateAccountStatusRequest,
    ) -> AdapterAckResponse {
        match accounts::set_account_status(&mut self.accounts, &request.email, &request.status) {
            Ok(receipt) => AdapterAckResponse {
                status: "ok".to_string(),
                outcome: "ACCEPTED".to_string(),
                reason: None,
                receipt: Some(receipt.as_str().to_string()),
            },
            Err(err) => account_flow_ack(err),
        }
    }

    pub fn run_list_complaints(&self) -> ComplaintListResponse {
        let result = self.intake.list(&self.complaints);
        if result.skipped_records > 0 {
            eprintln!(
                "docket_adapter_http list skipped malformed records count={}",
                result.skipped_records
            );
        }
        ComplaintListResponse {
            status: "ok".to_string(),
            count: result.views.len(),
            skipped_records: result.skipped_records,
            complaints: result.views.iter().map(ComplaintWire::from_view).collect(),
        }
    }

    pub fn run_get_complaint(&self, number_raw: &str) -> ComplaintResponse {
        match self.intake.get(&self.complaints, number_raw) {
            Some(view) => ComplaintResponse {
                status: "ok".to_string(),
                outcome: if view.verified {
                    "CONFIRMED".to_string()
                } else {
                    "UNVERIFIED".to_string()
                },
                reason: None,
                complaint: Some(ComplaintWire::from_view(&view)),
            },
            None => ComplaintResponse {
                status: "error".to_string(),
                outcome: "NOT_FOUND".to_string(),
                reason: Some("complaint not found".to_string()),
                complaint: None,
            },
        }
    }

    pub fn run_create_complaint(&mut self, submission: ComplaintSubmission) -> ComplaintResponse {
        let now = now_unix_ms();
        match self.intake.submit(&mut self.complaints, now, submission) {
            Ok(view) => {
                // The unverified branch is the availability-over-consistency
                // contract: the caller sees success plus an explicit flag,
                // never a silent downgrade.
                let outcome = if view.verified {
                    "CONFIRMED"
                } else {
                    "UNVERIFIED"
                };
                let reason = view
                    .record
                    .confirmation
                    .as_ref()
                    .and_then(|c| c.detail.clone());
                ComplaintResponse {
                    status: "ok".to_string(),
                    outcome: outcome.to_string(),
                    reason,
                    complaint: Some(ComplaintWire::from_view(&view)),
                }
            }
            Err(IntakeError::DuplicateNumber) => ComplaintResponse {
                status: "error".to_string(),
                outcome: "DUPLICATE".to_string(),
                reason: Some("complaint number already exists".to_string()),
                complaint: None,
            },
            Err(err) => ComplaintResponse {
                status: "error".to_string(),
                outcome: "REJECTED".to_string(),
                reason: Some(err.to_string()),
                complaint: None,
            },
        }
    }

    pub fn run_add_inference(&mut self, request: &AddInferenceRequest) -> ComplaintResponse {
        let now = now_unix_ms();
        let outcome = self.casework.add_inference(
            &mut self.complaints,
            now,
            &request.complaint_number,
            &request.inference,
            &request.examiner_email,
        );
        match outcome {
            Ok(view) => ComplaintResponse {
                status: "ok".to_string(),
                outcome: "ACCEPTED".to_string(),
                reason: None,
                complaint: Some(ComplaintWire::from_view(&view)),
            },
            Err(err) => casework_complaint_error(err),
        }
    }

    pub fn run_generate_report(&mut self, request: &GenerateReportRequest) -> GenerateReportResponse {
        let now = now_unix_ms();
        match self
            .casework
            .generate_report(&mut self.complaints, now, &request.complaint_number)
        {
            Ok(generated) => GenerateReportResponse {
                status: "ok".to_string(),
                outcome: "ACCEPTED".to_string(),
                reason: None,
                report_id: Some(generated.record.report_id.as_str().to_string()),
                report: Some(generated.record.prose.clone()),
                receipt: Some(generated.receipt.as_str().to_string()),
                generated_at_ms: Some(generated.record.generated_at.0),
            },
            Err(err) => {
                let outcome = match &err {
                    CaseworkError::NotFound => "NOT_FOUND",
                    CaseworkError::Validation { .. } => "REJECTED",
                    _ => "FAILED",
                };
                GenerateReportResponse {
                    status: "error".to_string(),
                    outcome: outcome.to_string(),
                    reason: Some(err.to_string()),
                    report_id: None,
                    report: None,
                    receipt: None,
                    generated_at_ms: None,
                }
            }
        }
    }

    /// One outbox reconciler pass, driven by the worker ticker in the bin.
    pub fn run_outbox_reconcile_worker_pass(&mut self) -> OutboxReconcilePassMetrics {
        let metrics = self.complaints.reconcile_outbox();
        self.worker_counters.pass_count += 1;
        self.worker_counters.attempted_total += u64::from(metrics.attempted);
        self.worker_counters.published_total += u64::from(metrics.published);
        self.worker_counters.last_still_pending = metrics.still_pending;
        self.worker_counters.last_pass_at_ms = Some(now_unix_ms().0);
        metrics
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: "ok".to_string(),
            outcome: "HEALTHY".to_string(),
            reason: None,
            outbox: OutboxHealth {
                pending_count: self.complaints.outbox().len(),
                worker: self.worker_counters.clone(),
            },
        }
    }

    /// Maps a requested upload name to a real file under the upload dir.
    /// The sanitizer collapses any path separators, so traversal cannot
    /// escape the directory.
    pub fn resolve_upload(&self, requested: &str) -> Option<PathBuf> {
        let sanitized = sanitize_file_name(requested);
        let path = self.intake.evidence().upload_dir().join(sanitized);
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }
}

pub fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

fn account_flow_ack(err: AccountFlowError) -> AdapterAckResponse {
    let outcome = match &err {
        AccountFlowError::Validation { .. } => "REJECTED",
        AccountFlowError::AlreadyExists => "ALREADY_EXISTS",
        AccountFlowError::NotFound => "NOT_FOUND",
        AccountFlowError::InvalidCredentials => "INVALID_CREDENTIALS",
        AccountFlowError::Ledger { .. } => "FAILED",
    };
    AdapterAckResponse {
        status: "error".to_string(),
        outcome: outcome.to_string(),
        reason: Some(err.to_string()),
        receipt: None,
    }
}

fn casework_complaint_error(err: CaseworkError) -> ComplaintResponse {
    let outcome = match &err {
        CaseworkError::NotFound => "NOT_FOUND",
        CaseworkError::Validation { .. } => "REJECTED",
        _ => "FAILED",
    };
    ComplaintResponse {
        status: "error".to_string(),
        outcome: outcome.to_string(),
        reason: Some(err.to_string()),
        complaint: None,
    }
}

fn now_unix_ms() -> UnixTimeMs {
    UnixTimeMs(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1)
            .max(1),
    )
}

fn stream_from_env(var: &str, default: &str) -> Result<StreamName, String> {
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    StreamName::new(&raw).map_err(|violation| format!("{var}: {violation}"))
}
