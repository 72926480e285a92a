//! Session context resolved once at sign-in and injected into every screen.
//!
//! The original refetched the auth user, profile, and patient record ad hoc
//! from each screen. `SessionManager` resolves the whole context exactly
//! once on sign-in, hands out read copies, and invalidates everything on
//! sign-out.

use std::sync::RwLock;

use thiserror::Error;
use uuid::Uuid;

use crate::backend::auth::{AuthApi, AuthError};
use crate::backend::datastore::{RecordStore, StoreError};
use crate::models::patient::PatientRecord;
use crate::models::profile::{Identity, Profile, UserRole};

/// Everything the screens need about the signed-in user.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub access_token: String,
    pub identity: Identity,
    pub profile: Profile,
    /// Present only for patient-role sessions.
    pub patient: Option<PatientRecord>,
}

impl SessionContext {
    /// The resolved patient id, which the upload path requires.
    pub fn patient_id(&self) -> Option<Uuid> {
        self.patient.as_ref().map(|p| p.id)
    }

    pub fn display_name(&self) -> &str {
        &self.profile.full_name
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Session lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("No profile found for the signed-in identity")]
    MissingProfile,

    #[error("No active session")]
    NotSignedIn,

    #[error("Internal lock error")]
    LockPoisoned,
}

/// Process-wide session holder.
#[derive(Default)]
pub struct SessionManager {
    context: RwLock<Option<SessionContext>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign in and resolve the full context in one pass: identity, profile,
    /// and (for patients) the patient record.
    pub fn sign_in(
        &self,
        auth: &dyn AuthApi,
        store: &dyn RecordStore,
        email: &str,
        password: &str,
    ) -> Result<SessionContext, SessionError> {
        let session = auth.sign_in(email, password)?;
        let profile = store
            .profile_for_user(session.user.id)?
            .ok_or(SessionError::MissingProfile)?;
        let patient = if profile.role == UserRole::Patient {
            store.patient_for_user(session.user.id)?
        } else {
            None
        };

        tracing::info!(
            user = %session.user.id,
            role = ?profile.role,
            has_patient_record = patient.is_some(),
            "session resolved",
        );

        let context = SessionContext {
            access_token: session.access_token,
            identity: session.user,
            profile,
            patient,
        };

        let mut guard = self
            .context
            .write()
            .map_err(|_| SessionError::LockPoisoned)?;
        *guard = Some(context.clone());
        Ok(context)
    }

    /// Read copy of the active context.
    pub fn current(&self) -> Result<SessionContext, SessionError> {
        let guard = self
            .context
            .read()
            .map_err(|_| SessionError::LockPoisoned)?;
        guard.clone().ok_or(SessionError::NotSignedIn)
    }

    pub fn is_signed_in(&self) -> bool {
        self.context
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Sign out: best-effort server-side revoke, then drop the context.
    /// The local invalidation happens even when the revoke call fails.
    pub fn sign_out(&self, auth: &dyn AuthApi) -> Result<(), SessionError> {
        let taken = {
            let mut guard = self
                .context
                .write()
                .map_err(|_| SessionError::LockPoisoned)?;
            guard.take()
        };

        if let Some(context) = taken {
            if let Err(e) = auth.sign_out(&context.access_token) {
                tracing::warn!(error = %e, "server-side sign-out failed");
            }
            tracing::info!(user = %context.identity.id, "session invalidated");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::auth::MockAuth;
    use crate::backend::datastore::MemoryStore;

    fn seeded_store(user_id: Uuid, role: UserRole, with_patient: bool) -> MemoryStore {
        let store = MemoryStore::new();
        store.add_profile(Profile {
            id: user_id,
            full_name: "John Anderson".to_string(),
            email: "john@example.com".to_string(),
            role,
        });
        if with_patient {
            store.add_patient(PatientRecord {
                id: Uuid::new_v4(),
                user_id,
                date_of_birth: None,
                height: Some(178.0),
                weight: Some(74.5),
                blood_group: Some("O+".to_string()),
                address: None,
                phone: None,
            });
        }
        store
    }

    fn identity(user_id: Uuid) -> Identity {
        Identity {
            id: user_id,
            email: "john@example.com".to_string(),
        }
    }

    #[test]
    fn sign_in_resolves_patient_context_once() {
        let user_id = Uuid::new_v4();
        let auth = MockAuth::signed_in(identity(user_id));
        let store = seeded_store(user_id, UserRole::Patient, true);

        let manager = SessionManager::new();
        let context = manager.sign_in(&auth, &store, "john@example.com", "pw").unwrap();

        assert!(context.patient_id().is_some());
        assert_eq!(context.display_name(), "John Anderson");
        assert!(manager.is_signed_in());
    }

    #[test]
    fn radiologist_session_has_no_patient_record() {
        let user_id = Uuid::new_v4();
        let auth = MockAuth::signed_in(identity(user_id));
        let store = seeded_store(user_id, UserRole::Radiologist, false);

        let manager = SessionManager::new();
        let context = manager.sign_in(&auth, &store, "john@example.com", "pw").unwrap();
        assert!(context.patient_id().is_none());
    }

    #[test]
    fn patient_without_record_still_signs_in() {
        let user_id = Uuid::new_v4();
        let auth = MockAuth::signed_in(identity(user_id));
        let store = seeded_store(user_id, UserRole::Patient, false);

        let manager = SessionManager::new();
        let context = manager.sign_in(&auth, &store, "john@example.com", "pw").unwrap();
        // The upload precondition will catch this; sign-in itself succeeds.
        assert!(context.patient_id().is_none());
    }

    #[test]
    fn missing_profile_fails_sign_in() {
        let user_id = Uuid::new_v4();
        let auth = MockAuth::signed_in(identity(user_id));
        let store = MemoryStore::new();

        let manager = SessionManager::new();
        let err = manager
            .sign_in(&auth, &store, "john@example.com", "pw")
            .unwrap_err();
        assert!(matches!(err, SessionError::MissingProfile));
        assert!(!manager.is_signed_in());
    }

    #[test]
    fn current_before_sign_in_is_not_signed_in() {
        let manager = SessionManager::new();
        assert!(matches!(
            manager.current().unwrap_err(),
            SessionError::NotSignedIn,
        ));
    }

    #[test]
    fn sign_out_invalidates_the_context() {
        let user_id = Uuid::new_v4();
        let auth = MockAuth::signed_in(identity(user_id));
        let store = seeded_store(user_id, UserRole::Patient, true);

        let manager = SessionManager::new();
        manager.sign_in(&auth, &store, "john@example.com", "pw").unwrap();
        manager.sign_out(&auth).unwrap();

        assert!(!manager.is_signed_in());
        assert!(matches!(
            manager.current().unwrap_err(),
            SessionError::NotSignedIn,
        ));
    }

    #[test]
    fn invalid_credentials_propagate() {
        let auth = MockAuth::rejecting();
        let store = MemoryStore::new();
        let manager = SessionManager::new();
        let err = manager.sign_in(&auth, &store, "a@b.c", "bad").unwrap_err();
        assert!(matches!(err, SessionError::Auth(AuthError::InvalidCredentials)));
    }
}
