//! Session store: the single source of truth for "who is logged in".
//!
//! Credentials (bearer token + identity) persist in
//! `~/.eventdeck/session.json` so the session survives restarts. On
//! startup `bootstrap` re-fetches the canonical identity from the server
//! rather than trusting the persisted copy; an expired or invalid token
//! resolves to a clean logged-out state, never a fatal error.

use crate::api::EventApi;
use crate::error::ApiError;
use crate::logging;
use crate::model::{Identity, Role};
use crate::storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFile {
    token: String,
    identity: Identity,
}

pub struct SessionStore {
    api: Arc<dyn EventApi>,
    identity: Option<Identity>,
    /// True until the startup identity refresh resolves. Consumers must
    /// hold rendering (spinner) while this is set instead of redirecting,
    /// so a reload never flashes "not authenticated".
    loading: bool,
}

impl SessionStore {
    pub fn new(api: Arc<dyn EventApi>) -> Self {
        Self {
            api,
            identity: None,
            loading: true,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.identity.as_ref().map(|i| i.role), Some(Role::Admin))
    }

    /// Startup refresh: if a token is persisted, validate it with a
    /// "who am I" call. Any failure (network, 4xx, 5xx) means logged out.
    /// `loading` transitions true -> false exactly once.
    pub async fn bootstrap(&mut self) {
        let persisted = storage::session_path()
            .ok()
            .and_then(|p| storage::read_json::<SessionFile>(&p).ok());

        match persisted {
            Some(file) => {
                self.api.set_token(Some(file.token.clone()));
                match self.api.me().await {
                    Ok(identity) => {
                        self.set_session(file.token, identity);
                    }
                    Err(e) => {
                        logging::warn(&format!("Session bootstrap failed, logging out: {}", e));
                        self.logout();
                    }
                }
            }
            None => {
                self.api.set_token(None);
            }
        }

        self.loading = false;
    }

    /// Login, then re-fetch the canonical identity rather than trusting
    /// the role embedded in the login response.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<Identity, ApiError> {
        let auth = self.api.login(email, password).await?;
        self.adopt_token(auth.token).await
    }

    /// Register follows the same pattern as login: the requested role is
    /// sent to the server, but the canonical identity is what we keep.
    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Identity, ApiError> {
        let auth = self.api.register(name, email, password, role).await?;
        self.adopt_token(auth.token).await
    }

    async fn adopt_token(&mut self, token: String) -> Result<Identity, ApiError> {
        self.api.set_token(Some(token.clone()));
        match self.api.me().await {
            Ok(identity) => {
                self.set_session(token, identity.clone());
                Ok(identity)
            }
            Err(e) => {
                // A token we can't validate is a token we don't keep
                self.api.set_token(None);
                Err(e)
            }
        }
    }

    /// Synchronous clear; the bearer token is stateless so no server call
    pub fn logout(&mut self) {
        self.identity = None;
        self.api.set_token(None);
        if let Ok(path) = storage::session_path() {
            storage::remove_file(&path);
        }
        logging::clear_context();
        logging::info("Logged out");
    }

    /// Local cache update after a profile edit; the caller already holds
    /// the server's fresh response, no extra round-trip. A fresh token
    /// (profile updates rotate it) replaces the persisted one.
    pub fn update_identity(&mut self, identity: Identity, fresh_token: Option<String>) {
        match fresh_token {
            Some(token) => {
                self.api.set_token(Some(token.clone()));
                self.set_session(token, identity);
            }
            None => {
                if let Some(token) = self.persisted_token() {
                    self.set_session(token, identity);
                } else {
                    self.identity = Some(identity);
                }
            }
        }
    }

    fn persisted_token(&self) -> Option<String> {
        storage::session_path()
            .ok()
            .and_then(|p| storage::read_json::<SessionFile>(&p).ok())
            .map(|f| f.token)
    }

    fn set_session(&mut self, token: String, identity: Identity) {
        logging::set_context(logging::LogContext {
            user: Some(identity.email.clone()),
            role: Some(identity.role.as_str().to_string()),
        });

        let file = SessionFile {
            token,
            identity: identity.clone(),
        };
        if let Ok(path) = storage::session_path() {
            if let Err(e) = storage::write_json(&path, &file) {
                logging::error(&format!("Failed to persist session: {}", e));
            }
        }

        self.identity = Some(identity);
    }
}
