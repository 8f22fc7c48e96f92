//! The application store: one shared state snapshot plus the actions that
//! synchronize it with the backend.
//!
//! A `Store` is an explicit context object. Consumers clone it (clones share the
//! same state) and call actions on it, or hand an [`Action`] to
//! [`Store::dispatch`]. Every action owns exactly one slice of [`AppState`]; the
//! state lock is only held while a finished result is committed, never across a
//! request.

mod assistant;
mod collections;
mod dispatch;
mod effects;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use collections::DashboardLoad;
pub use dispatch::{Action, FetchReport, Outcome};
pub use effects::{Effect, Fetch};

use crate::api::{ApiClient, Auth};
use crate::error::ActionResult;
use crate::state::{AppState, CredentialStore, Resource, Session, KEY_TOKEN, KEY_USER};
use crate::transport::{Method, ReqwestTransport, Transport};
use crate::types::UserProfile;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

fn now_iso() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Session as persisted by a previous run, if any.
fn persisted_session(credentials: &CredentialStore) -> Session {
    credentials.migrate_legacy_token();

    let Some(token) = credentials.get(KEY_TOKEN).filter(|t| !t.trim().is_empty()) else {
        return Session::default();
    };
    let user = credentials.get(KEY_USER).and_then(|raw| {
        serde_json::from_str::<UserProfile>(&raw)
            .map_err(|e| tracing::warn!(error = %e, "stored user profile is unreadable; ignoring it"))
            .ok()
    });
    Session::authenticated(token, user)
}

pub struct Store<T: Transport = ReqwestTransport> {
    api: Arc<ApiClient<T>>,
    credentials: CredentialStore,
    state: Arc<Mutex<AppState>>,
    revision: Arc<watch::Sender<u64>>,
    assistant_path: Option<String>,
}

impl<T: Transport> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            credentials: self.credentials.clone(),
            state: self.state.clone(),
            revision: self.revision.clone(),
            assistant_path: self.assistant_path.clone(),
        }
    }
}

impl<T: Transport> Store<T> {
    /// Builds a store and restores the session persisted by a previous run.
    pub fn new(api: ApiClient<T>, credentials: CredentialStore) -> Self {
        let state = AppState {
            session: persisted_session(&credentials),
            ..Default::default()
        };
        let (revision, _) = watch::channel(0);
        Self {
            api: Arc::new(api),
            credentials,
            state: Arc::new(Mutex::new(state)),
            revision: Arc::new(revision),
            assistant_path: None,
        }
    }

    pub fn with_assistant_path(mut self, path: Option<String>) -> Self {
        self.assistant_path = path;
        self
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn api(&self) -> &ApiClient<T> {
        &self.api
    }

    pub async fn snapshot(&self) -> AppState {
        self.state.lock().await.clone()
    }

    /// Receives a new revision number after every committed mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Re-reads the session from durable storage, e.g. after another window logged in.
    pub async fn restore_session(&self) {
        self.credentials.reload();
        let session = persisted_session(&self.credentials);
        self.update(|state| state.session = session).await;
    }

    pub(crate) async fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let out = {
            let mut guard = self.state.lock().await;
            f(&mut guard)
        };
        self.revision.send_modify(|rev| *rev += 1);
        out
    }

    /// In-memory session token first, durable storage second.
    pub(crate) async fn bearer(&self) -> Auth {
        let in_session = self.state.lock().await.session.token.clone();
        let token = in_session
            .or_else(|| self.credentials.get(KEY_TOKEN))
            .filter(|t| !t.trim().is_empty());
        Auth::Bearer(token)
    }

    pub(crate) async fn begin_loading(&self, resource: Resource) {
        self.update(|state| state.begin_loading(resource)).await;
    }

    /// Authenticated mutation. State is untouched here; the caller applies `effect`.
    pub(crate) async fn write(
        &self,
        op: &'static str,
        method: Method,
        path: &str,
        body: Option<Value>,
        effect: Effect,
    ) -> ActionResult<Effect> {
        let auth = self.bearer().await;
        match self.api.request(method, path, body, auth).await {
            Ok(_) => {
                tracing::debug!(op, path, "write accepted");
                Ok(effect)
            }
            Err(e) => {
                tracing::info!(op, path, code = e.code(), error = %e, "write failed");
                Err(e)
            }
        }
    }
}

impl Store<ReqwestTransport> {
    pub fn from_config(
        config: &crate::config::Config,
        credentials: CredentialStore,
    ) -> Result<Self, crate::transport::TransportError> {
        let api = ApiClient::new(config.backend_url.clone(), ReqwestTransport::new()?);
        Ok(Self::new(api, credentials).with_assistant_path(config.assistant_path.clone()))
    }
}
