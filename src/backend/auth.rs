//! Auth/session collaborator (GoTrue-style password grant).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;
use crate::models::profile::Identity;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Cannot reach auth service at {0}")]
    Connection(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Auth service error: HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// An issued session: the bearer token plus the identity it authenticates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: Identity,
}

/// Seam over the auth collaborator.
pub trait AuthApi {
    /// Sign in with email and password. Issues a session.
    fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;
    /// Revoke the session server-side.
    fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

/// HTTP client for the auth service.
pub struct AuthClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl AuthClient {
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

    fn request(
        &self,
        builder: reqwest::blocking::RequestBuilder,
        bearer: Option<&str>,
    ) -> Result<reqwest::blocking::Response, AuthError> {
        let mut builder = builder;
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder.send().map_err(|e| {
            if e.is_connect() {
                AuthError::Connection(self.base_url.clone())
            } else {
                AuthError::HttpClient(e.to_string())
            }
        })
    }
}

impl AuthApi for AuthClient {
    fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let body = PasswordGrant { email, password };

        let response = self.request(self.client.post(&url).json(&body), None)?;
        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AuthError::Service {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| AuthError::ResponseParsing(e.to_string()))
    }

    fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = format!("{}/auth/v1/logout", self.base_url);

        let response = self.request(self.client.post(&url), Some(access_token))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AuthError::Service {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Mock auth collaborator for tests. Hands out a fixed identity.
pub struct MockAuth {
    identity: Option<Identity>,
}

impl MockAuth {
    /// Accepts any credentials and issues a session for `identity`.
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// Rejects every sign-in attempt.
    pub fn rejecting() -> Self {
        Self { identity: None }
    }
}

impl AuthApi for MockAuth {
    fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthSession, AuthError> {
        match &self.identity {
            Some(identity) => Ok(AuthSession {
                access_token: "test-token".to_string(),
                user: identity.clone(),
            }),
            None => Err(AuthError::InvalidCredentials),
        }
    }

    fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        Ok(())
    }
}
