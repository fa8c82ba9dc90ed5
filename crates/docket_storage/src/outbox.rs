#![forbid(unsafe_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use docket_kernel_contracts::complaint::{ComplaintNumber, ComplaintRecord};
use docket_kernel_contracts::ledger::{LedgerClient, RecordKey, StreamName};
use docket_kernel_contracts::record::DomainRecord;
use docket_kernel_contracts::UnixTimeMs;
use serde::{Deserialize, Serialize};

use crate::codec;

#[derive(Debug)]
pub enum OutboxError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for OutboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "outbox io error: {err}"),
            Self::Json(err) => write!(f, "outbox json error: {err}"),
        }
    }
}

impl std::error::Error for OutboxError {}

impl From<std::io::Error> for OutboxError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for OutboxError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// One complaint awaiting chain publication. The embedded record keeps its
/// unverified confirmation for serving reads; the reconciler publishes the
/// record with the confirmation stripped so the chain copy stays clean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub record: ComplaintRecord,
    pub enqueued_at: UnixTimeMs,
    pub attempts: u32,
}

/// Counters returned by one reconciler pass, logged by the adapter worker
/// and exposed through its health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutboxReconcilePassMetrics {
    pub attempted: u32,
    pub published: u32,
    pub still_pending: u32,
}

/// Disk-backed queue of complaints that failed to reach the chain. One JSON
/// line per entry; reloaded at startup; entries leave only after a
/// successful re-publish. An in-memory mode backs tests.
#[derive(Debug)]
pub struct DurableOutbox {
    path: Option<PathBuf>,
    entries: Vec<OutboxEntry>,
}

impl DurableOutbox {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Vec::new(),
        }
    }

    /// Opens (or creates) the JSONL file and loads surviving entries.
    /// Unparseable lines are dropped and counted into the return value so
    /// the caller can log them; they are not fatal.
    pub fn open(path: PathBuf) -> Result<(Self, u32), OutboxError> {
        let mut dropped = 0u32;
        let mut entries = Vec::new();
        if path.exists() {
            let raw = fs::read_to_string(&path)?;
            for line in raw.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<OutboxEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(_) => dropped += 1,
                }
            }
        } else if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok((
            Self {
                path: Some(path),
                entries,
            },
            dropped,
        ))
    }

    pub fn push(&mut self, record: ComplaintRecord, now: UnixTimeMs) -> Result<(), OutboxError> {
        let entry = OutboxEntry {
            record,
            enqueued_at: now,
            attempts: 0,
        };
        if let Some(path) = &self.path {
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[OutboxEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_number(&self, number: &ComplaintNumber) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.record.number == *number)
    }

    /// Retries chain publication for every pending entry. Published entries
    /// leave the queue; failures stay with an incremented attempt counter.
    /// The file is rewritten once at the end of the pass.
    pub fn reconcile_pass<L: LedgerClient>(
        &mut self,
        ledger: &mut L,
        stream: &StreamName,
    ) -> OutboxReconcilePassMetrics {
        let mut metrics = OutboxReconcilePassMetrics::default();
        let mut remaining = Vec::with_capacity(self.entries.len());
        let mut changed = false;

        for mut entry in self.entries.drain(..) {
            metrics.attempted += 1;
            let published = publish_clean(ledger, stream, &entry.record).is_some();
            if published {
                metrics.published += 1;
                changed = true;
            } else {
                entry.attempts = entry.attempts.saturating_add(1);
                changed = true;
                remaining.push(entry);
            }
        }

        metrics.still_pending = remaining.len() as u32;
        self.entries = remaining;
        if changed {
            if let Err(err) = self.rewrite() {
                eprintln!("docket_storage outbox rewrite failed detail={err}");
            }
        }
        metrics
    }

    fn rewrite(&self) -> Result<(), OutboxError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut buffer = String::new();
        for entry in &self.entries {
            buffer.push_str(&serde_json::to_string(entry)?);
            buffer.push('\n');
        }
        atomic_write(path, buffer.as_bytes())?;
        Ok(())
    }
}

fn publish_clean<L: LedgerClient>(
    ledger: &mut L,
    stream: &StreamName,
    record: &ComplaintRecord,
) -> Option<()> {
    let mut clean = record.clone();
    clean.confirmation = None;
    let key = RecordKey::new(clean.number.as_str()).ok()?;
    let bytes = codec::encode(&DomainRecord::Complaint(clean)).ok()?;
    ledger.append(stream, &key, &bytes).ok().map(|_| ())
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), OutboxError> {
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::DurableOutbox;
    use docket_kernel_contracts::complaint::{ComplaintNumber, ComplaintRecord, Severity};
    use docket_kernel_contracts::UnixTimeMs;

    fn record(number: &str) -> ComplaintRecord {
        ComplaintRecord::v1(
            ComplaintNumber::new(number).unwrap(),
            "Theft".to_string(),
            "2026-07-01".to_string(),
            "Central Market".to_string(),
            "A bicycle was stolen from the rack.".to_string(),
            String::new(),
            "Property".to_string(),
            Severity::default(),
            UnixTimeMs(1),
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn at_outbox_01_push_and_scan_in_memory() {
        let mut outbox = DurableOutbox::in_memory();
        outbox.push(record("1001"), UnixTimeMs(10)).unwrap();
        assert_eq!(outbox.len(), 1);
        assert!(outbox.contains_number(&ComplaintNumber::new("1001").unwrap()));
        assert!(!outbox.contains_number(&ComplaintNumber::new("1002").unwrap()));
    }
}
