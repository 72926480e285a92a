//! File intake and the upload-to-analysis orchestration.
//!
//! One upload is one pass: precondition check, a single multipart call to
//! the inference service, normalization, a best-effort bookkeeping insert,
//! and a cancellation check before the result is applied. No retry, no
//! automatic resubmission.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::backend::datastore::RecordStore;
use crate::backend::inference::InferenceApi;
use crate::cancel::CancelToken;
use crate::models::analysis::AnalysisResult;
use crate::session::SessionContext;

/// Advisory accept list shown next to the drop zone; file presence is the
/// only enforced check.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["nii", "nii.gz", "dcm", "jpg", "jpeg", "png"];

/// Transient in-memory scan captured from a drop or manual selection.
/// Never persisted by this system.
#[derive(Debug, Clone)]
pub struct UploadedScan {
    pub file_name: String,
    pub size_bytes: u64,
    pub bytes: Vec<u8>,
}

impl UploadedScan {
    /// Capture a scan file. Fails only if the file cannot be read.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scan".to_string());
        Ok(Self {
            file_name,
            size_bytes: bytes.len() as u64,
            bytes,
        })
    }

    /// Size in megabytes, as surfaced next to the file name.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// Precondition: the patient identity must be resolved before submitting.
    #[error("Patient information not found. Please sign in again.")]
    MissingIdentity,

    /// The inference call failed or returned non-success; nothing persisted.
    #[error("Error analyzing MRI scan: {0}")]
    AnalysisBackend(String),

    /// The screen was left before the result arrived; the result is
    /// discarded rather than applied.
    #[error("Upload cancelled")]
    Cancelled,
}

/// Orchestrates one upload against the inference service and the data store.
pub struct AnalysisOrchestrator<'a> {
    inference: &'a dyn InferenceApi,
    store: &'a dyn RecordStore,
}

impl<'a> AnalysisOrchestrator<'a> {
    pub fn new(inference: &'a dyn InferenceApi, store: &'a dyn RecordStore) -> Self {
        Self { inference, store }
    }

    /// Submit one scan for analysis.
    ///
    /// Runs to completion or to a single terminal failure. A bookkeeping
    /// insert failure is logged and the in-memory result still returned:
    /// "analysis succeeded" and "bookkeeping succeeded" are deliberately
    /// decoupled. The caller transitions to the report screen only after
    /// both steps have been attempted.
    pub fn submit(
        &self,
        scan: &UploadedScan,
        session: &SessionContext,
        token: &CancelToken,
    ) -> Result<AnalysisResult, UploadError> {
        let Some(patient_id) = session.patient_id() else {
            // No network call may go out without a resolved patient id.
            return Err(UploadError::MissingIdentity);
        };
        if token.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        tracing::info!(
            file = %scan.file_name,
            size_mb = format!("{:.2}", scan.size_mb()),
            patient = %patient_id,
            "submitting scan for analysis",
        );

        let payload = self
            .inference
            .analyze(
                &scan.file_name,
                scan.bytes.clone(),
                patient_id,
                session.display_name(),
            )
            .map_err(|e| UploadError::AnalysisBackend(e.to_string()))?;

        if token.is_cancelled() {
            // The screen is gone; do not apply the result or keep writing
            // bookkeeping on its behalf.
            tracing::info!(file = %scan.file_name, "discarding analysis result after cancellation");
            return Err(UploadError::Cancelled);
        }

        let result = AnalysisResult::from_payload(payload);

        if let Err(e) = self.store.insert_analysis(&result) {
            tracing::warn!(error = %e, "analysis bookkeeping insert failed");
        }

        tracing::info!(
            tumor_detected = result.tumor_detected,
            confidence = result.confidence,
            tumor_type = %result.tumor_type,
            "analysis complete",
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::datastore::MemoryStore;
    use crate::backend::inference::{InferenceError, MockInference};
    use crate::models::analysis::InferencePayload;
    use crate::models::patient::PatientRecord;
    use crate::models::profile::{Identity, Profile, UserRole};
    use uuid::Uuid;

    fn payload() -> InferencePayload {
        serde_json::from_str(
            r#"{
                "tumor_detected": true,
                "confidence": 94.5,
                "tumor_type": "Glioblastoma",
                "severity": "high",
                "recommendations": ["Consult your neurologist for further review."],
                "ai_model": "DenseNet-121",
                "slices_analyzed": 156
            }"#,
        )
        .unwrap()
    }

    fn session(with_patient: bool) -> SessionContext {
        let user_id = Uuid::new_v4();
        SessionContext {
            access_token: "test-token".to_string(),
            identity: Identity {
                id: user_id,
                email: "john@example.com".to_string(),
            },
            profile: Profile {
                id: user_id,
                full_name: "John Anderson".to_string(),
                email: "john@example.com".to_string(),
                role: UserRole::Patient,
            },
            patient: with_patient.then(|| PatientRecord {
                id: Uuid::new_v4(),
                user_id,
                date_of_birth: None,
                height: None,
                weight: None,
                blood_group: None,
                address: None,
                phone: None,
            }),
        }
    }

    fn scan() -> UploadedScan {
        UploadedScan {
            file_name: "scan.nii".to_string(),
            size_bytes: 3,
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn missing_identity_short_circuits_without_network_call() {
        let inference = MockInference::returning(payload());
        let store = MemoryStore::new();
        let orchestrator = AnalysisOrchestrator::new(&inference, &store);

        let err = orchestrator
            .submit(&scan(), &session(false), &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, UploadError::MissingIdentity));
        assert_eq!(inference.call_count(), 0);
    }

    #[test]
    fn backend_failure_is_terminal_and_persists_nothing() {
        let inference = MockInference::failing();
        let store = MemoryStore::new();
        let orchestrator = AnalysisOrchestrator::new(&inference, &store);

        let err = orchestrator
            .submit(&scan(), &session(true), &CancelToken::new())
            .unwrap_err();

        match err {
            UploadError::AnalysisBackend(message) => {
                assert!(message.contains("Internal Server Error"));
            }
            other => panic!("expected AnalysisBackend, got {other:?}"),
        }
        assert!(store.inserted_analyses().is_empty());
    }

    #[test]
    fn success_persists_a_pure_projection_of_the_response() {
        let inference = MockInference::returning(payload());
        let store = MemoryStore::new();
        let orchestrator = AnalysisOrchestrator::new(&inference, &store);

        let result = orchestrator
            .submit(&scan(), &session(true), &CancelToken::new())
            .unwrap();

        let inserted = store.inserted_analyses();
        assert_eq!(inserted.len(), 1);
        let row = &inserted[0];
        assert_eq!(row.tumor_detected, result.tumor_detected);
        assert_eq!(row.tumor_type, "Glioblastoma");
        assert_eq!(row.severity.as_deref(), Some("high"));
        assert_eq!(
            row.recommendations,
            vec!["Consult your neurologist for further review.".to_string()],
        );
        assert_eq!(row.slices_analyzed, Some(156));
        assert!((row.confidence - 0.945).abs() < 1e-9);
    }

    #[test]
    fn request_carries_patient_identity_fields() {
        let inference = MockInference::returning(payload());
        let store = MemoryStore::new();
        let orchestrator = AnalysisOrchestrator::new(&inference, &store);
        let session = session(true);

        orchestrator
            .submit(&scan(), &session, &CancelToken::new())
            .unwrap();

        let (file, patient_id, patient_name) = inference.last_request().unwrap();
        assert_eq!(file, "scan.nii");
        assert_eq!(Some(patient_id), session.patient_id());
        assert_eq!(patient_name, "John Anderson");
    }

    #[test]
    fn bookkeeping_failure_is_non_fatal() {
        let inference = MockInference::returning(payload());
        let store = MemoryStore::new();
        store.fail_inserts();
        let orchestrator = AnalysisOrchestrator::new(&inference, &store);

        let result = orchestrator
            .submit(&scan(), &session(true), &CancelToken::new())
            .unwrap();
        assert!(result.tumor_detected);
    }

    #[test]
    fn pre_cancelled_token_skips_the_network_call() {
        let inference = MockInference::returning(payload());
        let store = MemoryStore::new();
        let orchestrator = AnalysisOrchestrator::new(&inference, &store);

        let token = CancelToken::new();
        token.cancel();
        let err = orchestrator
            .submit(&scan(), &session(true), &token)
            .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(inference.call_count(), 0);
    }

    /// Inference stub that cancels the token mid-flight, as if the user
    /// navigated away while the request was outstanding.
    struct CancellingInference {
        token: CancelToken,
        inner: MockInference,
    }

    impl InferenceApi for CancellingInference {
        fn analyze(
            &self,
            file_name: &str,
            bytes: Vec<u8>,
            patient_id: Uuid,
            patient_name: &str,
        ) -> Result<crate::models::analysis::InferencePayload, InferenceError> {
            self.token.cancel();
            self.inner.analyze(file_name, bytes, patient_id, patient_name)
        }
    }

    #[test]
    fn completion_after_cancellation_is_discarded() {
        let token = CancelToken::new();
        let inference = CancellingInference {
            token: token.clone(),
            inner: MockInference::returning(payload()),
        };
        let store = MemoryStore::new();
        let orchestrator = AnalysisOrchestrator::new(&inference, &store);

        let err = orchestrator
            .submit(&scan(), &session(true), &token)
            .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
        assert!(store.inserted_analyses().is_empty());
    }

    #[test]
    fn scan_reports_size_in_megabytes() {
        let scan = UploadedScan {
            file_name: "scan.nii".to_string(),
            size_bytes: 2 * 1024 * 1024,
            bytes: Vec::new(),
        };
        assert!((scan.size_mb() - 2.0).abs() < 1e-9);
    }
}
