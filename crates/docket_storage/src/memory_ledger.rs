#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use docket_kernel_contracts::ledger::{
    LedgerClient, LedgerEntry, LedgerError, ReceiptId, RecordKey, StreamName,
};

/// In-process ledger with the same append-order semantics as the external
/// chain. Used by tests and local development; the unreachable toggle
/// simulates transport failure for degradation paths.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    streams: BTreeMap<String, Vec<LedgerEntry>>,
    unreachable: bool,
    appended: u64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&mut self, unreachable: bool) {
        self.unreachable = unreachable;
    }

    pub fn entry_count(&self, stream: &StreamName) -> usize {
        self.streams.get(stream.as_str()).map_or(0, Vec::len)
    }

    fn check_reachable(&self) -> Result<(), LedgerError> {
        if self.unreachable {
            return Err(LedgerError::Unreachable {
                detail: "simulated transport failure".to_string(),
            });
        }
        Ok(())
    }
}

impl LedgerClient for MemoryLedger {
    fn append(
        &mut self,
        stream: &StreamName,
        key: &RecordKey,
        bytes: &[u8],
    ) -> Result<ReceiptId, LedgerError> {
        self.check_reachable()?;
        if bytes.is_empty() {
            return Err(LedgerError::Rejected {
                detail: "empty payload".to_string(),
            });
        }
        self.appended += 1;
        let receipt = ReceiptId::new(&format!("mem-{:08}", self.appended)).map_err(|_| {
            LedgerError::Rejected {
                detail: "receipt allocation failed".to_string(),
            }
        })?;
        self.streams
            .entry(stream.as_str().to_string())
            .or_default()
            .push(LedgerEntry {
                key: key.clone(),
                bytes: bytes.to_vec(),
                receipt: receipt.clone(),
            });
        Ok(receipt)
    }

    fn list_by_key(
        &self,
        stream: &StreamName,
        key: &RecordKey,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.check_reachable()?;
        Ok(self
            .streams
            .get(stream.as_str())
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.key == *key)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_all(&self, stream: &StreamName) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.check_reachable()?;
        Ok(self
            .streams
            .get(stream.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryLedger;
    use docket_kernel_contracts::ledger::{LedgerClient, LedgerError, RecordKey, StreamName};

    #[test]
    fn at_memory_ledger_01_append_order_is_preserved_per_key() {
        let mut ledger = MemoryLedger::new();
        let stream = StreamName::new("complaints").unwrap();
        let key = RecordKey::new("1001").unwrap();
        ledger.append(&stream, &key, b"v1").unwrap();
        ledger.append(&stream, &key, b"v2").unwrap();
        let entries = ledger.list_by_key(&stream, &key).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].bytes, b"v1");
        assert_eq!(entries.last().unwrap().bytes, b"v2");
    }

    #[test]
    fn at_memory_ledger_02_unreachable_toggle_fails_all_calls() {
        let mut ledger = MemoryLedger::new();
        let stream = StreamName::new("complaints").unwrap();
        let key = RecordKey::new("1001").unwrap();
        ledger.set_unreachable(true);
        assert!(matches!(
            ledger.append(&stream, &key, b"v1"),
            Err(LedgerError::Unreachable { .. })
        ));
        assert!(matches!(
            ledger.list_all(&stream),
            Err(LedgerError::Unreachable { .. })
        ));
        ledger.set_unreachable(false);
        assert!(ledger.append(&stream, &key, b"v1").is_ok());
    }
}
