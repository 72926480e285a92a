//! Table-style data store collaborator (PostgREST-style REST).
//!
//! Reads are the typed per-entity accessors the screens need; writes are
//! single-row inserts. `RecordStore` is the seam used by the orchestrator,
//! the session manager, and the report assembler; `PostgrestClient` is the
//! real implementation and `MemoryStore` the in-memory one for tests and
//! offline demos.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::models::analysis::AnalysisResult;
use crate::models::patient::PatientRecord;
use crate::models::profile::Profile;
use crate::models::report::Report;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot reach data store at {0}")]
    Connection(String),

    #[error("Data store error: HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Seam over the data store collaborator.
///
/// Absent rows are `Ok(None)`; only transport/service failures are `Err`.
/// The report assembler relies on that distinction to separate `NotFound`
/// from `Failed`.
pub trait RecordStore {
    /// `profiles` row for an identity.
    fn profile_for_user(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;
    /// `patients` row keyed by the identity's user id.
    fn patient_for_user(&self, user_id: Uuid) -> Result<Option<PatientRecord>, StoreError>;
    /// Most recent `reports` row for a patient (generated_at descending).
    fn latest_report(&self, patient_id: Uuid) -> Result<Option<Report>, StoreError>;
    /// `analysis_results` row by id. `None` when the reference dangles.
    fn analysis_by_id(&self, analysis_id: Uuid) -> Result<Option<AnalysisResult>, StoreError>;
    /// Insert one normalized analysis row.
    fn insert_analysis(&self, row: &AnalysisResult) -> Result<(), StoreError>;
}

/// HTTP client for a PostgREST-style data store.
pub struct PostgrestClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl PostgrestClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    /// Client configured from the environment, 30s timeout.
    pub fn from_env() -> Self {
        Self::new(&config::supabase_url(), config::supabase_key(), 30)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, StoreError> {
        let mut builder = builder;
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key).bearer_auth(key);
        }
        let response = builder.send().map_err(|e| {
            if e.is_connect() {
                StoreError::Connection(self.base_url.clone())
            } else {
                StoreError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Service {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// `SELECT * FROM table WHERE ... ORDER ... LIMIT ...` as PostgREST
    /// query parameters. Returns the matching rows.
    fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let response = self.send(self.client.get(&url).query(query))?;
        response
            .json()
            .map_err(|e| StoreError::ResponseParsing(e.to_string()))
    }

    /// Single-row insert.
    fn insert<T: Serialize>(&self, table: &str, row: &T) -> Result<(), StoreError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        self.send(self.client.post(&url).json(row))?;
        Ok(())
    }
}

impl RecordStore for PostgrestClient {
    fn profile_for_user(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let rows: Vec<Profile> = self.select(
            "profiles",
            &[("id", format!("eq.{user_id}")), ("limit", "1".to_string())],
        )?;
        Ok(rows.into_iter().next())
    }

    fn patient_for_user(&self, user_id: Uuid) -> Result<Option<PatientRecord>, StoreError> {
        let rows: Vec<PatientRecord> = self.select(
            "patients",
            &[
                ("user_id", format!("eq.{user_id}")),
                ("limit", "1".to_string()),
            ],
        )?;
        Ok(rows.into_iter().next())
    }

    fn latest_report(&self, patient_id: Uuid) -> Result<Option<Report>, StoreError> {
        let rows: Vec<Report> = self.select(
            "reports",
            &[
                ("patient_id", format!("eq.{patient_id}")),
                ("order", "generated_at.desc".to_string()),
                ("limit", "1".to_string()),
            ],
        )?;
        Ok(rows.into_iter().next())
    }

    fn analysis_by_id(&self, analysis_id: Uuid) -> Result<Option<AnalysisResult>, StoreError> {
        let rows: Vec<AnalysisResult> = self.select(
            "analysis_results",
            &[
                ("id", format!("eq.{analysis_id}")),
                ("limit", "1".to_string()),
            ],
        )?;
        Ok(rows.into_iter().next())
    }

    fn insert_analysis(&self, row: &AnalysisResult) -> Result<(), StoreError> {
        self.insert("analysis_results", row)
    }
}

/// In-memory store for tests and offline demos.
///
/// Failure toggles let tests trigger the `Failed` (thrown lookup) and
/// bookkeeping-failure paths without a server.
#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<Vec<Profile>>,
    patients: Mutex<Vec<PatientRecord>>,
    reports: Mutex<Vec<Report>>,
    analyses: Mutex<Vec<AnalysisResult>>,
    fail_reads: AtomicBool,
    fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, profile: Profile) {
        self.profiles.lock().unwrap().push(profile);
    }

    pub fn add_patient(&self, patient: PatientRecord) {
        self.patients.lock().unwrap().push(patient);
    }

    pub fn add_report(&self, report: Report) {
        self.reports.lock().unwrap().push(report);
    }

    pub fn add_analysis(&self, analysis: AnalysisResult) {
        self.analyses.lock().unwrap().push(analysis);
    }

    /// Make every read return a service error.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Make every insert return a service error.
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    /// Rows inserted through `insert_analysis`.
    pub fn inserted_analyses(&self) -> Vec<AnalysisResult> {
        self.analyses.lock().unwrap().clone()
    }

    fn read_error() -> StoreError {
        StoreError::Service {
            status: 500,
            body: "simulated read failure".to_string(),
        }
    }
}

impl RecordStore for MemoryStore {
    fn profile_for_user(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::read_error());
        }
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == user_id)
            .cloned())
    }

    fn patient_for_user(&self, user_id: Uuid) -> Result<Option<PatientRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::read_error());
        }
        Ok(self
            .patients
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    fn latest_report(&self, patient_id: Uuid) -> Result<Option<Report>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::read_error());
        }
        let reports = self.reports.lock().unwrap();
        let mut matching: Vec<&Report> = reports
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .collect();
        matching.sort_by_key(|r| std::cmp::Reverse(r.generated_at));
        Ok(matching.first().map(|r| (*r).clone()))
    }

    fn analysis_by_id(&self, analysis_id: Uuid) -> Result<Option<AnalysisResult>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::read_error());
        }
        Ok(self
            .analyses
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == Some(analysis_id))
            .cloned())
    }

    fn insert_analysis(&self, row: &AnalysisResult) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Service {
                status: 500,
                body: "simulated insert failure".to_string(),
            });
        }
        self.analyses.lock().unwrap().push(row.clone());
        Ok(())
    }
}
