#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docket_adapter::{
    content_type_for, AdapterAckResponse, AdapterHealthResponse, AddInferenceRequest,
    ComplaintListResponse, ComplaintResponse, CreateAccountRequest, GenerateReportRequest,
    GenerateReportResponse, HttpAdapterRuntime, LoginRequest, LoginResponse,
    UpdateAccountStatusRequest, MAX_UPLOAD_BODY_BYTES,
};
use docket_engines::evidence::IngestCandidate;
use docket_os::intake::ComplaintSubmission;

type SharedRuntime = Arc<Mutex<HttpAdapterRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("DOCKET_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;
    let worker_enabled = parse_outbox_worker_enabled_from_env();
    let worker_interval_ms = parse_outbox_worker_interval_ms_from_env();

    let runtime = Arc::new(Mutex::new(HttpAdapterRuntime::default_from_env()?));
    if worker_enabled {
        let runtime_for_worker = runtime.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(worker_interval_ms));
            loop {
                ticker.tick().await;
                let pass = match runtime_for_worker.lock() {
                    Ok(mut runtime) => Ok(runtime.run_outbox_reconcile_worker_pass()),
                    Err(_) => Err("adapter runtime lock poisoned".to_string()),
                };
                match pass {
                    Ok(metrics) if metrics.attempted > 0 => {
                        println!(
                            "docket_adapter_http outbox pass attempted={} published={} still_pending={}",
                            metrics.attempted, metrics.published, metrics.still_pending
                        );
                    }
                    Ok(_) => {}
                    Err(err) => eprintln!("docket_adapter_http outbox worker pass failed: {err}"),
                }
            }
        });
    }

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/login", post(login))
        .route("/api/create-user", post(create_user))
        .route("/api/update-user-status", post(update_user_status))
        .route("/api/complaints", get(list_complaints).post(create_complaint))
        .route("/api/complaints/:number", get(get_complaint))
        .route("/api/add-inference", post(add_inference))
        .route("/api/generate-report", post(generate_report))
        .route("/uploads/:filename", get(serve_upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .with_state(runtime);

    println!(
        "docket_adapter_http listening on http://{addr} (outbox_worker_enabled={worker_enabled} interval_ms={worker_interval_ms})"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn parse_outbox_worker_enabled_from_env() -> bool {
    match env::var("DOCKET_OUTBOX_WORKER_ENABLED") {
        Ok(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        Err(_) => true,
    }
}

fn parse_outbox_worker_interval_ms_from_env() -> u64 {
    env::var("DOCKET_OUTBOX_WORKER_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| (500..=600_000).contains(v))
        .unwrap_or(5_000)
}

fn outcome_status(outcome: &str) -> StatusCode {
    match outcome {
        "ACCEPTED" | "CONFIRMED" | "UNVERIFIED" | "HEALTHY" => StatusCode::OK,
        "INVALID_CREDENTIALS" => StatusCode::UNAUTHORIZED,
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "REJECTED" | "DUPLICATE" | "ALREADY_EXISTS" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn healthz(State(runtime): State<SharedRuntime>) -> (StatusCode, Json<AdapterHealthResponse>) {
    match runtime.lock() {
        Ok(runtime) => (StatusCode::OK, Json(runtime.health_report())),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AdapterHealthResponse {
                status: "error".to_string(),
                outcome: "UNHEALTHY".to_string(),
                reason: Some("adapter runtime lock poisoned".to_string()),
                outbox: Default::default(),
            }),
        ),
    }
}

async fn login(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<LoginRequest>,
) -> (StatusCode, Json<LoginResponse>) {
    let Ok(runtime) = runtime.lock() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(LoginResponse {
                status: "error".to_string(),
                outcome: "FAILED".to_string(),
                reason: Some("adapter runtime lock poisoned".to_string()),
                role: None,
                email: None,
            }),
        );
    };
    let response = runtime.run_login(&request);
    (outcome_status(&response.outcome), Json(response))
}

async fn create_user(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<CreateAccountRequest>,
) -> (StatusCode, Json<AdapterAckResponse>) {
    let Ok(mut runtime) = runtime.lock() else {
        return ack_lock_poisoned();
    };
    let response = runtime.run_create_account(&request);
    let status = if response.outcome == "ACCEPTED" {
        StatusCode::CREATED
    } else {
        outcome_status(&response.outcome)
    };
    (status, Json(response))
}

async fn update_user_status(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<UpdateAccountStatusRequest>,
) -> (StatusCode, Json<AdapterAckResponse>) {
    let Ok(mut runtime) = runtime.lock() else {
        return ack_lock_poisoned();
    };
    let response = runtime.run_update_account_status(&request);
    (outcome_status(&response.outcome), Json(response))
}

fn ack_lock_poisoned() -> (StatusCode, Json<AdapterAckResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AdapterAckResponse {
            status: "error".to_string(),
            outcome: "FAILED".to_string(),
            reason: Some("adapter runtime lock poisoned".to_string()),
            receipt: None,
        }),
    )
}

async fn list_complaints(
    State(runtime): State<SharedRuntime>,
) -> Result<Json<ComplaintListResponse>, StatusCode> {
    let runtime = runtime
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(runtime.run_list_complaints()))
}

async fn get_complaint(
    State(runtime): State<SharedRuntime>,
    Path(number): Path<String>,
) -> (StatusCode, Json<ComplaintResponse>) {
    let Ok(runtime) = runtime.lock() else {
        return complaint_lock_poisoned();
    };
    let response = runtime.run_get_complaint(&number);
    (outcome_status(&response.outcome), Json(response))
}

fn complaint_lock_poisoned() -> (StatusCode, Json<ComplaintResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ComplaintResponse {
            status: "error".to_string(),
            outcome: "FAILED".to_string(),
            reason: Some("adapter runtime lock poisoned".to_string()),
            complaint: None,
        }),
    )
}

/// Multipart intake: text parts carry the complaint fields, every part with
/// a filename is an evidence candidate (the engine enforces the 10-file cap
/// and the image-extension allowlist).
async fn create_complaint(
    State(runtime): State<SharedRuntime>,
    mut multipart: Multipart,
) -> (StatusCode, Json<ComplaintResponse>) {
    let mut submission = ComplaintSubmission::default();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            match field.bytes().await {
                Ok(bytes) => submission.files.push(IngestCandidate {
                    file_name,
                    bytes: bytes.to_vec(),
                }),
                Err(_) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(ComplaintResponse {
                            status: "error".to_string(),
                            outcome: "REJECTED".to_string(),
                            reason: Some(format!("unreadable file part: {name}")),
                            complaint: None,
                        }),
                    )
                }
            }
            continue;
        }
        let Ok(value) = field.text().await else {
            continue;
        };
        match name.as_str() {
            "number" | "complaint_number" => submission.number = value,
            "title" => submission.title = value,
            "date" => submission.date = value,
            "place" => submission.place = value,
            "details" => submission.details = value,
            "evidence_details" => submission.evidence_details = value,
            "category" => submission.category = value,
            "severity" => submission.severity = Some(value),
            _ => {}
        }
    }

    let Ok(mut runtime) = runtime.lock() else {
        return complaint_lock_poisoned();
    };
    let response = runtime.run_create_complaint(submission);
    (outcome_status(&response.outcome), Json(response))
}

async fn add_inference(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<AddInferenceRequest>,
) -> (StatusCode, Json<ComplaintResponse>) {
    let Ok(mut runtime) = runtime.lock() else {
        return complaint_lock_poisoned();
    };
    let response = runtime.run_add_inference(&request);
    (outcome_status(&response.outcome), Json(response))
}

async fn generate_report(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<GenerateReportRequest>,
) -> (StatusCode, Json<GenerateReportResponse>) {
    let Ok(mut runtime) = runtime.lock() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(GenerateReportResponse {
                status: "error".to_string(),
                outcome: "FAILED".to_string(),
                reason: Some("adapter runtime lock poisoned".to_string()),
                report_id: None,
                report: None,
                receipt: None,
                generated_at_ms: None,
            }),
        );
    };
    let response = runtime.run_generate_report(&request);
    (outcome_status(&response.outcome), Json(response))
}

/// Serves locally stored evidence files. Name resolution goes through the
/// same sanitizer used at ingest, so requests cannot escape the upload dir.
async fn serve_upload(
    State(runtime): State<SharedRuntime>,
    Path(filename): Path<String>,
) -> Response {
    let resolved = match runtime.lock() {
        Ok(runtime) => runtime.resolve_upload(&filename),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    let Some(path) = resolved else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&filename))],
            bytes,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
