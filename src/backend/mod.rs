//! HTTP collaborators: the auth/session service, the table-style data
//! store, and the remote inference service.
//!
//! Each collaborator is reached through a trait seam with one blocking
//! reqwest implementation and one mock, so the orchestration and assembly
//! logic is testable offline.

pub mod auth;
pub mod datastore;
pub mod inference;
