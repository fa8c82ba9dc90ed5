#![forbid(unsafe_code)]

use std::env;

use docket_kernel_contracts::complaint::ComplaintRecord;
use docket_kernel_contracts::provider_secrets::ProviderSecretId;
use serde_json::{json, Value};

use crate::http::{build_http_agent, provider_error_from_ureq, ProviderCallError};
use crate::secret_vault;

pub mod reason_codes {
    use docket_kernel_contracts::ReasonCodeId;

    pub const REPORT_OK_GENERATED: ReasonCodeId = ReasonCodeId(0x8E90_0001);

    pub const REPORT_FAIL_MISSING_CONFIG: ReasonCodeId = ReasonCodeId(0x8E90_00F1);
    pub const REPORT_FAIL_UPSTREAM: ReasonCodeId = ReasonCodeId(0x8E90_00F2);
    pub const REPORT_FAIL_EMPTY: ReasonCodeId = ReasonCodeId(0x8E90_00F3);
}

/// Generation parameters are fixed: one synchronous call, bounded output,
/// no retry, no streaming.
const TEMPERATURE: f64 = 0.7;
const TOP_P: f64 = 1.0;
const TOP_K: u32 = 40;
const MAX_OUTPUT_TOKENS: u32 = 2048;
const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportGenConfig {
    pub endpoint_base: String,
    pub model: String,
    /// Resolved from the encrypted local secret vault when absent.
    pub api_key: Option<String>,
    pub timeout_ms: u32,
    pub user_agent: String,
    /// Canned response body injected by tests in place of the network call.
    pub fixture_response_json: Option<String>,
}

impl ReportGenConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint_base: env::var("DOCKET_REPORT_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta/models".to_string()
            }),
            model: env::var("DOCKET_REPORT_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-pro".to_string()),
            api_key: env::var("DOCKET_REPORT_API_KEY").ok(),
            timeout_ms: env::var("DOCKET_REPORT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| (100..=120_000).contains(v))
                .unwrap_or(30_000),
            user_agent: env::var("DOCKET_HTTP_USER_AGENT")
                .unwrap_or_else(|_| "docket-report/1.0".to_string()),
            fixture_response_json: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportGenError {
    MissingApiKey,
    Upstream(ProviderCallError),
    MalformedResponse,
    EmptyResponse,
}

impl ReportGenError {
    pub fn safe_detail(&self) -> String {
        match self {
            Self::MissingApiKey => "provider=report error=missing_credentials".to_string(),
            Self::Upstream(err) => err.safe_detail(),
            Self::MalformedResponse => "provider=report error=malformed_response".to_string(),
            Self::EmptyResponse => "provider=report error=empty_response".to_string(),
        }
    }
}

/// Single-shot prose generation for a complaint's forensic report.
#[derive(Debug, Clone)]
pub struct ReportGenRuntime {
    config: ReportGenConfig,
}

impl ReportGenRuntime {
    pub fn new(config: ReportGenConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self, complaint: &ComplaintRecord) -> Result<String, ReportGenError> {
        let body: Value = if let Some(fixture) = &self.config.fixture_response_json {
            serde_json::from_str(fixture).map_err(|_| ReportGenError::MalformedResponse)?
        } else {
            let api_key = self.resolve_api_key().ok_or(ReportGenError::MissingApiKey)?;
            let agent = build_http_agent(self.config.timeout_ms, &self.config.user_agent)
                .map_err(|_| ReportGenError::MissingApiKey)?;
            let url = format!(
                "{}/{}:generateContent",
                self.config.endpoint_base.trim_end_matches('/'),
                self.config.model
            );
            let payload = request_payload(&build_report_prompt(complaint));
            let response = agent
                .post(&url)
                .set("Content-Type", "application/json")
                .set("x-goog-api-key", &api_key)
                .send_json(payload)
                .map_err(|e| ReportGenError::Upstream(provider_error_from_ureq("report", e)))?;
            serde_json::from_reader(response.into_reader())
                .map_err(|_| ReportGenError::MalformedResponse)?
        };

        let prose = extract_prose(&body).ok_or(ReportGenError::MalformedResponse)?;
        if prose.trim().is_empty() {
            return Err(ReportGenError::EmptyResponse);
        }
        Ok(prose)
    }

    fn resolve_api_key(&self) -> Option<String> {
        self.config.api_key.clone().or_else(|| {
            secret_vault::resolve_secret(ProviderSecretId::ReportApiKey.as_str())
                .ok()
                .flatten()
        })
    }
}

/// The structured prompt carries every complaint field the examiner's
/// report must cover, with fixed section headings for legal-documentation
/// tone.
pub fn build_report_prompt(complaint: &ComplaintRecord) -> String {
    let inference = complaint
        .inference
        .as_ref()
        .map(|note| note.text.as_str())
        .unwrap_or("No inference provided");
    let evidence_details = if complaint.evidence_details.trim().is_empty() {
        "No evidence details provided"
    } else {
        complaint.evidence_details.as_str()
    };
    format!(
        "Generate a detailed forensic report for the following complaint:\n\n\
         Title: {title}\n\
         Date: {date}\n\
         Location: {place}\n\
         Category: {category}\n\
         Severity: {severity}\n\n\
         Complaint Details:\n{details}\n\n\
         Evidence Details:\n{evidence_details}\n\n\
         Examiner's Inference:\n{inference}\n\n\
         Format the report with the following sections:\n\
         1. Case Summary\n\
         2. Evidence Analysis\n\
         3. Forensic Findings\n\
         4. Expert Opinion\n\
         5. Recommendations\n\
         6. Conclusion\n\n\
         Please maintain a professional and formal tone suitable for legal documentation.",
        title = complaint.title,
        date = complaint.date,
        place = complaint.place,
        category = complaint.category,
        severity = complaint.severity.as_str(),
        details = complaint.details,
    )
}

fn request_payload(prompt: &str) -> Value {
    let safety_settings: Vec<Value> = SAFETY_CATEGORIES
        .iter()
        .map(|category| json!({"category": category, "threshold": SAFETY_THRESHOLD}))
        .collect();
    json!({
        "contents": [{"parts": [{"text": prompt}]}],
        "generationConfig": {
            "temperature": TEMPERATURE,
            "topP": TOP_P,
            "topK": TOP_K,
            "maxOutputTokens": MAX_OUTPUT_TOKENS,
        },
        "safetySettings": safety_settings,
    })
}

fn extract_prose(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let mut prose = String::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            prose.push_str(text);
        }
    }
    Some(prose)
}

#[cfg(test)]
mod tests {
    use super::{build_report_prompt, ReportGenConfig, ReportGenError, ReportGenRuntime};
    use docket_kernel_contracts::account::AccountEmail;
    use docket_kernel_contracts::complaint::{
        ComplaintNumber, ComplaintRecord, InferenceNote, Severity,
    };
    use docket_kernel_contracts::UnixTimeMs;

    fn complaint() -> ComplaintRecord {
        let mut record = ComplaintRecord::v1(
            ComplaintNumber::new("1001").unwrap(),
            "Theft".to_string(),
            "2026-07-01".to_string(),
            "Central Market".to_string(),
            "A bicycle was stolen from the rack.".to_string(),
            String::new(),
            "Property".to_string(),
            Severity::High,
            UnixTimeMs(1),
            Vec::new(),
        )
        .unwrap();
        record.inference = Some(InferenceNote {
            text: "Matches a known pattern of rack thefts.".to_string(),
            examiner: AccountEmail::new("examiner@agency.example").unwrap(),
            inferred_at: UnixTimeMs(2),
        });
        record
    }

    fn runtime_with_fixture(fixture: &str) -> ReportGenRuntime {
        ReportGenRuntime::new(ReportGenConfig {
            endpoint_base: "http://127.0.0.1:0".to_string(),
            model: "gemini-1.5-pro".to_string(),
            api_key: Some("key".to_string()),
            timeout_ms: 1_000,
            user_agent: "docket-test/1.0".to_string(),
            fixture_response_json: Some(fixture.to_string()),
        })
    }

    #[test]
    fn at_report_gen_01_prompt_carries_fields_and_sections() {
        let prompt = build_report_prompt(&complaint());
        assert!(prompt.contains("Title: Theft"));
        assert!(prompt.contains("Severity: High"));
        assert!(prompt.contains("Matches a known pattern of rack thefts."));
        assert!(prompt.contains("No evidence details provided"));
        assert!(prompt.contains("1. Case Summary"));
        assert!(prompt.contains("6. Conclusion"));
    }

    #[test]
    fn at_report_gen_02_fixture_response_concatenates_parts() {
        let runtime = runtime_with_fixture(
            r#"{"candidates": [{"content": {"parts": [
                {"text": "1. Case Summary\n"},
                {"text": "The rack was emptied overnight."}
            ]}}]}"#,
        );
        let prose = runtime.generate(&complaint()).unwrap();
        assert!(prose.starts_with("1. Case Summary"));
        assert!(prose.ends_with("overnight."));
    }

    #[test]
    fn at_report_gen_03_empty_candidates_fail_closed() {
        let runtime = runtime_with_fixture(r#"{"candidates": []}"#);
        assert_eq!(
            runtime.generate(&complaint()).unwrap_err(),
            ReportGenError::MalformedResponse
        );
        let blank = runtime_with_fixture(
            r#"{"candidates": [{"content": {"parts": [{"text": "  "}]}}]}"#,
        );
        assert_eq!(
            blank.generate(&complaint()).unwrap_err(),
            ReportGenError::EmptyResponse
        );
    }
}
