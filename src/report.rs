//! Report assembly: one composed read from session to merged view.
//!
//! The original chained four lookups with null checks spread across the
//! screen. Here the chain is one operation with a tagged outcome per step:
//! an empty step is `NotFound` with its reason, a thrown lookup is `Err`,
//! and only a complete chain yields a view. There is no partial rendering.

use thiserror::Error;

use crate::backend::datastore::{RecordStore, StoreError};
use crate::cancel::CancelToken;
use crate::models::report::ReportView;
use crate::session::SessionContext;

/// Which link of the lookup chain came up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    NoIdentity,
    NoPatientRecord,
    NoReports,
    /// A report exists but its analysis reference does not resolve.
    DanglingAnalysis,
}

impl NotFoundReason {
    /// Terminal-state message with its call to action.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoIdentity => "You are not signed in. Please sign in to view your report.",
            Self::NoPatientRecord => {
                "No patient record is linked to this account. Please contact your clinic."
            }
            Self::NoReports => "No report yet. Upload an MRI scan to generate your first report.",
            Self::DanglingAnalysis => {
                "No report available. The analysis behind your report could not be found."
            }
        }
    }
}

/// Outcome of one report load.
#[derive(Debug, Clone)]
pub enum ReportLoad {
    Found(ReportView),
    NotFound(NotFoundReason),
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Report lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("Report load cancelled")]
    Cancelled,
}

/// Assembles the current report for the signed-in patient.
pub struct ReportAssembler<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// One composed read: identity → patient record → latest report →
    /// analysis → merged view. Invoked once per screen mount; the state
    /// machine is Loading → {Found, NotFound, Failed} with no way back
    /// short of a full remount.
    pub fn load(
        &self,
        session: Option<&SessionContext>,
        token: &CancelToken,
    ) -> Result<ReportLoad, LookupError> {
        let Some(session) = session else {
            return Ok(ReportLoad::NotFound(NotFoundReason::NoIdentity));
        };

        // The session carries the patient record for patient roles; fall
        // back to a lookup so a stale context still resolves.
        let patient = match &session.patient {
            Some(patient) => patient.clone(),
            None => match self.store.patient_for_user(session.identity.id)? {
                Some(patient) => patient,
                None => return Ok(ReportLoad::NotFound(NotFoundReason::NoPatientRecord)),
            },
        };

        let Some(report) = self.store.latest_report(patient.id)? else {
            return Ok(ReportLoad::NotFound(NotFoundReason::NoReports));
        };

        let Some(analysis) = self.store.analysis_by_id(report.analysis_id)? else {
            tracing::warn!(
                report = %report.id,
                analysis = %report.analysis_id,
                "report references a missing analysis",
            );
            return Ok(ReportLoad::NotFound(NotFoundReason::DanglingAnalysis));
        };

        if token.is_cancelled() {
            return Err(LookupError::Cancelled);
        }

        Ok(ReportLoad::Found(ReportView::merge(
            &report,
            &analysis,
            session.display_name(),
        )))
    }
}
