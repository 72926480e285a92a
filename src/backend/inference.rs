//! Remote inference service client: one multipart `/analyze` call per
//! upload, carrying the raw scan plus the patient identity fields.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::models::analysis::InferencePayload;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Cannot reach inference service at {0}")]
    Connection(String),

    #[error("Backend error: {status_text}")]
    Service { status: u16, status_text: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Seam over the inference collaborator.
pub trait InferenceApi {
    /// Analyze one uploaded scan. Exactly one request, exactly one JSON
    /// object back; no retry.
    fn analyze(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        patient_id: Uuid,
        patient_name: &str,
    ) -> Result<InferencePayload, InferenceError>;
}

/// HTTP client for the inference service.
///
/// No request timeout: scan analysis can legitimately run for minutes, so
/// only the connect phase is bounded.
pub struct AnalysisClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl AnalysisClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Client pointed at the configured inference endpoint.
    pub fn from_env() -> Self {
        Self::new(&config::inference_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl InferenceApi for AnalysisClient {
    fn analyze(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        patient_id: Uuid,
        patient_name: &str,
    ) -> Result<InferencePayload, InferenceError> {
        let url = format!("{}/analyze", self.base_url);

        let part = reqwest::blocking::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string());
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("patient_id", patient_id.to_string())
            .text("patient_name", patient_name.to_string());

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    InferenceError::Connection(self.base_url.clone())
                } else {
                    InferenceError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Service {
                status: status.as_u16(),
                status_text: status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string(),
            });
        }

        response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))
    }
}

/// Call-counting mock for orchestrator tests.
pub struct MockInference {
    payload: Option<InferencePayload>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, Uuid, String)>>,
}

impl MockInference {
    /// Succeeds every call with `payload`.
    pub fn returning(payload: InferencePayload) -> Self {
        Self {
            payload: Some(payload),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fails every call with HTTP 500.
    pub fn failing() -> Self {
        Self {
            payload: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// How many analyze calls went out.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The (file_name, patient_id, patient_name) of the last call.
    pub fn last_request(&self) -> Option<(String, Uuid, String)> {
        self.last_request.lock().unwrap().clone()
    }
}

impl InferenceApi for MockInference {
    fn analyze(
        &self,
        file_name: &str,
        _bytes: Vec<u8>,
        patient_id: Uuid,
        patient_name: &str,
    ) -> Result<InferencePayload, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() =
            Some((file_name.to_string(), patient_id, patient_name.to_string()));
        match &self.payload {
            Some(payload) => Ok(payload.clone()),
            None => Err(InferenceError::Service {
                status: 500,
                status_text: "Internal Server Error".to_string(),
            }),
        }
    }
}
