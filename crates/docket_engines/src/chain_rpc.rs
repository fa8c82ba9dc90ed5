#![forbid(unsafe_code)]

use std::env;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use docket_kernel_contracts::ledger::{
    LedgerClient, LedgerEntry, LedgerError, ReceiptId, RecordKey, StreamName,
};
use docket_kernel_contracts::provider_secrets::ProviderSecretId;
use docket_kernel_contracts::ReasonCodeId;
use serde_json::{json, Value};

use crate::http::{build_http_agent, provider_error_from_ureq};
use crate::secret_vault;

pub mod reason_codes {
    use docket_kernel_contracts::ReasonCodeId;

    pub const CHAIN_OK_APPEND: ReasonCodeId = ReasonCodeId(0xC4A1_0001);

    pub const CHAIN_FAIL_TRANSPORT: ReasonCodeId = ReasonCodeId(0xC4A1_00F1);
    pub const CHAIN_FAIL_REJECTED: ReasonCodeId = ReasonCodeId(0xC4A1_00F2);
    pub const CHAIN_FAIL_MISSING_CONFIG: ReasonCodeId = ReasonCodeId(0xC4A1_00F3);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRpcConfig {
    pub rpc_url: String,
    pub rpc_user: String,
    /// Resolved from the encrypted local secret vault when absent; the env
    /// override exists for development only.
    pub rpc_password: Option<String>,
    pub timeout_ms: u32,
    pub user_agent: String,
    /// Canned JSON-RPC response body injected by tests in place of the
    /// network call.
    pub fixture_response_json: Option<String>,
}

impl ChainRpcConfig {
    pub fn from_env() -> Self {
        Self {
            rpc_url: env::var("DOCKET_CHAIN_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:6292".to_string()),
            rpc_user: env::var("DOCKET_CHAIN_RPC_USER")
                .unwrap_or_else(|_| "multichainrpc".to_string()),
            rpc_password: env::var("DOCKET_CHAIN_RPC_PASSWORD").ok(),
            timeout_ms: env::var("DOCKET_CHAIN_RPC_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| (100..=60_000).contains(v))
                .unwrap_or(5_000),
            user_agent: env::var("DOCKET_HTTP_USER_AGENT")
                .unwrap_or_else(|_| "docket-chain/1.0".to_string()),
            fixture_response_json: None,
        }
    }
}

/// `LedgerClient` over the chain's JSON-RPC endpoint: `publish`,
/// `liststreamkeyitems` and `liststreamitems`, basic-auth, hex payloads
/// passed through verbatim (the codec owns the hex).
#[derive(Debug, Clone)]
pub struct ChainRpcLedger {
    config: ChainRpcConfig,
}

impl ChainRpcLedger {
    pub fn new(config: ChainRpcConfig) -> Self {
        Self { config }
    }

    pub fn reason_code_for(err: &LedgerError) -> ReasonCodeId {
        match err {
            LedgerError::Unreachable { .. } => reason_codes::CHAIN_FAIL_TRANSPORT,
            LedgerError::Rejected { .. } => reason_codes::CHAIN_FAIL_REJECTED,
        }
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let body: Value = if let Some(fixture) = &self.config.fixture_response_json {
            serde_json::from_str(fixture).map_err(|_| LedgerError::Rejected {
                detail: "provider=chain error=json_parse".to_string(),
            })?
        } else {
            let agent = build_http_agent(self.config.timeout_ms, &self.config.user_agent)
                .map_err(|detail| LedgerError::Unreachable { detail })?;
            let password = self.resolve_password().ok_or(LedgerError::Unreachable {
                detail: "provider=chain error=missing_credentials".to_string(),
            })?;
            let auth = BASE64.encode(format!("{}:{password}", self.config.rpc_user));
            let payload = json!({
                "method": method,
                "params": params,
                "id": "docket",
                "jsonrpc": "1.0",
            });
            let response = agent
                .post(&self.config.rpc_url)
                .set("Content-Type", "application/json")
                .set("Authorization", &format!("Basic {auth}"))
                .send_json(payload)
                .map_err(|e| {
                    let provider_err = provider_error_from_ureq("chain", e);
                    if provider_err.is_upstream_rejection() {
                        LedgerError::Rejected {
                            detail: provider_err.safe_detail(),
                        }
                    } else {
                        LedgerError::Unreachable {
                            detail: provider_err.safe_detail(),
                        }
                    }
                })?;
            serde_json::from_reader(response.into_reader()).map_err(|_| LedgerError::Rejected {
                detail: "provider=chain error=json_parse".to_string(),
            })?
        };

        // `{result, error}` shape: an error object (or a missing result) is
        // the failure signal even on HTTP 200.
        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified chain error");
            return Err(LedgerError::Rejected {
                detail: message.to_string(),
            });
        }
        body.get("result").cloned().ok_or(LedgerError::Rejected {
            detail: "response carried no result".to_string(),
        })
    }

    fn resolve_password(&self) -> Option<String> {
        if let Some(password) = &self.config.rpc_password {
            return Some(password.clone());
        }
        secret_vault::resolve_secret(ProviderSecretId::ChainRpcPassword.as_str())
            .ok()
            .flatten()
    }
}

impl LedgerClient for ChainRpcLedger {
    fn append(
        &mut self,
        stream: &StreamName,
        key: &RecordKey,
        bytes: &[u8],
    ) -> Result<ReceiptId, LedgerError> {
        let payload = String::from_utf8(bytes.to_vec()).map_err(|_| LedgerError::Rejected {
            detail: "payload must be utf-8 hex".to_string(),
        })?;
        let result = self.call(
            "publish",
            json!([stream.as_str(), key.as_str(), payload]),
        )?;
        let txid = result.as_str().ok_or(LedgerError::Rejected {
            detail: "publish result was not a txid".to_string(),
        })?;
        ReceiptId::new(txid).map_err(|_| LedgerError::Rejected {
            detail: "publish returned an empty txid".to_string(),
        })
    }

    fn list_by_key(
        &self,
        stream: &StreamName,
        key: &RecordKey,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let result = self.call(
            "liststreamkeyitems",
            json!([stream.as_str(), key.as_str()]),
        )?;
        Ok(parse_stream_items(&result, Some(key)))
    }

    fn list_all(&self, stream: &StreamName) -> Result<Vec<LedgerEntry>, LedgerError> {
        let result = self.call("liststreamitems", json!([stream.as_str()]))?;
        Ok(parse_stream_items(&result, None))
    }
}

/// Items missing a usable key, payload or txid are dropped here; decode
/// failures on well-formed items are the codec's concern downstream.
fn parse_stream_items(result: &Value, known_key: Option<&RecordKey>) -> Vec<LedgerEntry> {
    let Some(items) = result.as_array() else {
        return Vec::new();
    };
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let key = match known_key {
            Some(key) => key.clone(),
            None => {
                let raw = item
                    .get("keys")
                    .and_then(Value::as_array)
                    .and_then(|keys| keys.first())
                    .and_then(Value::as_str)
                    .or_else(|| item.get("key").and_then(Value::as_str));
                match raw.and_then(|raw| RecordKey::new(raw).ok()) {
                    Some(key) => key,
                    None => continue,
                }
            }
        };
        let Some(data) = item.get("data").and_then(Value::as_str) else {
            continue;
        };
        let Some(receipt) = item
            .get("txid")
            .and_then(Value::as_str)
            .and_then(|raw| ReceiptId::new(raw).ok())
        else {
            continue;
        };
        entries.push(LedgerEntry {
            key,
            bytes: data.as_bytes().to_vec(),
            receipt,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::{ChainRpcConfig, ChainRpcLedger};
    use docket_kernel_contracts::ledger::{LedgerClient, LedgerError, RecordKey, StreamName};

    fn ledger_with_fixture(fixture: &str) -> ChainRpcLedger {
        let config = ChainRpcConfig {
            rpc_url: "http://127.0.0.1:0".to_string(),
            rpc_user: "docketrpc".to_string(),
            rpc_password: Some("unused".to_string()),
            timeout_ms: 1_000,
            user_agent: "docket-test/1.0".to_string(),
            fixture_response_json: Some(fixture.to_string()),
        };
        ChainRpcLedger::new(config)
    }

    #[test]
    fn at_chain_rpc_01_publish_fixture_yields_receipt() {
        let mut ledger = ledger_with_fixture(r#"{"result": "abcd1234", "error": null}"#);
        let receipt = ledger
            .append(
                &StreamName::new("complaints").unwrap(),
                &RecordKey::new("1001").unwrap(),
                b"7b7d",
            )
            .unwrap();
        assert_eq!(receipt.as_str(), "abcd1234");
    }

    #[test]
    fn at_chain_rpc_02_error_object_maps_to_rejected_with_detail() {
        let mut ledger = ledger_with_fixture(
            r#"{"result": null, "error": {"code": -708, "message": "Stream with this name not found: complaints"}}"#,
        );
        let err = ledger
            .append(
                &StreamName::new("complaints").unwrap(),
                &RecordKey::new("1001").unwrap(),
                b"7b7d",
            )
            .unwrap_err();
        match err {
            LedgerError::Rejected { detail } => assert!(detail.contains("not found")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn at_chain_rpc_03_list_all_parses_keys_data_and_txid() {
        let fixture = r#"{"result": [
            {"keys": ["1001"], "data": "7b7d", "txid": "tx-1"},
            {"key": "1002", "data": "7b7d", "txid": "tx-2"},
            {"keys": ["1003"], "txid": "tx-3"},
            {"keys": ["1004"], "data": "7b7d"}
        ], "error": null}"#;
        let ledger = ledger_with_fixture(fixture);
        let entries = ledger
            .list_all(&StreamName::new("complaints").unwrap())
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key.as_str(), "1001");
        assert_eq!(entries[0].receipt.as_str(), "tx-1");
        assert_eq!(entries[1].key.as_str(), "1002");
    }

    #[test]
    fn at_chain_rpc_04_missing_result_is_rejected() {
        let ledger = ledger_with_fixture(r#"{"id": "docket"}"#);
        assert!(matches!(
            ledger.list_all(&StreamName::new("complaints").unwrap()),
            Err(LedgerError::Rejected { .. })
        ));
    }
}
