#![forbid(unsafe_code)]

use std::env;
use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;

use docket_kernel_contracts::complaint::{
    EvidenceAttachment, PinState, MAX_EVIDENCE_FILES,
};
use docket_kernel_contracts::{ContractViolation, UnixTimeMs};
use sha2::{Digest, Sha256};

use crate::pinning::PinningRuntime;

const HASH_CHUNK_LEN: usize = 4096;
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

#[derive(Debug)]
pub enum EvidenceError {
    Io(std::io::Error),
    Contract(ContractViolation),
}

impl std::fmt::Display for EvidenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "evidence io error: {err}"),
            Self::Contract(violation) => write!(f, "{violation}"),
        }
    }
}

impl From<std::io::Error> for EvidenceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ContractViolation> for EvidenceError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceConfig {
    pub upload_dir: PathBuf,
}

impl EvidenceConfig {
    pub fn from_env() -> Self {
        Self {
            upload_dir: env::var("DOCKET_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
        }
    }
}

/// One file offered at complaint intake, as decoded from the multipart
/// surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestCandidate {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Persists evidence files locally, derives their content digest and pins
/// them with the external collaborator.
///
/// The digest is a streaming SHA-256 over the exact bytes persisted to
/// local storage, computed before any upload, so integrity stays verifiable
/// independent of the pinning service. A failed pin never drops the
/// attachment; it is recorded as `PinState::Failed` on the complaint.
#[derive(Debug, Clone)]
pub struct EvidenceIngestRuntime {
    config: EvidenceConfig,
    pinning: PinningRuntime,
}

impl EvidenceIngestRuntime {
    pub fn new(config: EvidenceConfig, pinning: PinningRuntime) -> Self {
        Self { config, pinning }
    }

    /// Ingests up to `MAX_EVIDENCE_FILES` candidates. Files beyond the cap
    /// and files with a non-allowlisted extension are skipped without error,
    /// mirroring the intake surface.
    pub fn ingest_batch(
        &self,
        now: UnixTimeMs,
        candidates: Vec<IngestCandidate>,
    ) -> Result<Vec<EvidenceAttachment>, EvidenceError> {
        let mut attachments = Vec::new();
        for candidate in candidates.into_iter().take(MAX_EVIDENCE_FILES) {
            if let Some(attachment) = self.ingest(now, &candidate.file_name, &candidate.bytes)? {
                attachments.push(attachment);
            }
        }
        Ok(attachments)
    }

    /// Returns `Ok(None)` when the file extension is not an accepted image
    /// type (skip, not an error).
    pub fn ingest(
        &self,
        now: UnixTimeMs,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Option<EvidenceAttachment>, EvidenceError> {
        let sanitized = sanitize_file_name(file_name);
        if !has_allowed_extension(&sanitized) {
            return Ok(None);
        }

        fs::create_dir_all(&self.config.upload_dir)?;
        let stored_name = format!("{}_{sanitized}", now.0);
        let stored_path = self.config.upload_dir.join(&stored_name);
        fs::write(&stored_path, bytes)?;

        let digest_hex = file_digest_hex(&stored_path)?;
        let pin = match self.pinning.pin_file(&sanitized, bytes) {
            Ok(receipt) => PinState::Pinned {
                cid: receipt.cid,
                gateway_url: receipt.gateway_url,
            },
            Err(err) => {
                eprintln!(
                    "docket_engines evidence pin failed file={sanitized} {}",
                    err.safe_detail()
                );
                PinState::Failed {
                    detail: err.safe_detail(),
                }
            }
        };

        Ok(Some(EvidenceAttachment::v1(
            sanitized,
            stored_name,
            digest_hex,
            pin,
        )?))
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.config.upload_dir
    }
}

/// Keeps the basename only and collapses anything outside
/// `[A-Za-z0-9._-]`, so stored names are safe path components.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('.');
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| {
            let lower = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Streaming digest in fixed-size chunks so memory stays bounded whatever
/// the file size.
fn file_digest_hex(path: &std::path::Path) -> Result<String, EvidenceError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; HASH_CHUNK_LEN];
    loop {
        let read = file.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        hasher.update(&chunk[..read]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    Ok(out)
}
