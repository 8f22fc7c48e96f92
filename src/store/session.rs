use super::{Effect, Fetch, Store};
use crate::api::{
    item_path, results, server_message, Auth, LoginEnvelope, PATH_FORGOT_PASSWORD, PATH_HELLO,
    PATH_LOGIN, PATH_RESET_PASSWORD, PATH_SIGNUP, PATH_USERS,
};
use crate::error::{ActionError, ActionResult};
use crate::state::{Session, KEY_TOKEN, KEY_USER, LEGACY_KEY_TOKEN};
use crate::transport::{Method, Transport};
use crate::types::{Credentials, Id, SignupRequest, UserProfile};
use serde_json::{json, Value};

pub const LOGIN_FAILED: &str = "Incorrect username or password";
pub const SIGNUP_FAILED: &str = "Error in signup process";
pub const RECOVERY_SENT: &str = "You will receive password reset instructions.";
pub const RECOVERY_FAILED: &str = "An error occurred, please try again later.";
pub const RESET_DONE: &str = "Password reset successful.";
pub const RESET_FAILED: &str = "Failed to reset password.";

/// Message shown for a failed session request: the fallback for rejected
/// requests, the generic text for everything else.
fn failure_message(err: &ActionError, rejected: impl FnOnce(&ActionError) -> String) -> String {
    match err {
        ActionError::Http { .. } => rejected(err),
        other => other.user_message(),
    }
}

impl<T: Transport> Store<T> {
    pub async fn login(&self, credentials: &Credentials) -> ActionResult<()> {
        let body = serde_json::to_value(credentials)?;
        let result = self.authenticate(PATH_LOGIN, body).await.map_err(|e| match e {
            ActionError::Http { status, .. } => ActionError::Http {
                status,
                message: Some(LOGIN_FAILED.to_string()),
            },
            other => other,
        });
        if let Err(e) = &result {
            tracing::info!(code = e.code(), status = ?e.status(), "login failed");
            self.set_message(&e.user_message()).await;
        }
        result
    }

    pub async fn signup(&self, request: &SignupRequest) -> ActionResult<()> {
        let body = serde_json::to_value(request)?;
        let result = self.authenticate(PATH_SIGNUP, body).await;
        if let Err(e) = &result {
            tracing::info!(code = e.code(), status = ?e.status(), "signup failed");
            let message = failure_message(e, |e| {
                e.server_message().unwrap_or(SIGNUP_FAILED).to_string()
            });
            self.update(|state| state.message = Some(message)).await;
        }
        result
    }

    /// Posts credentials and, on success, persists and installs the session.
    async fn authenticate(&self, path: &str, body: Value) -> ActionResult<()> {
        let res = self.api.post(path, body, Auth::None).await?;
        let envelope: LoginEnvelope = serde_json::from_value(res)?;
        let token = envelope.access_token.trim().to_string();
        if token.is_empty() {
            return Err(ActionError::Parse("access_token is empty".to_string()));
        }
        let user_json = serde_json::to_string(&envelope.results)?;

        self.credentials.set(KEY_TOKEN, &token);
        self.credentials.set(KEY_USER, &user_json);
        self.update(|state| {
            state.session = Session::authenticated(token, Some(envelope.results));
            state.message = None;
        })
        .await;
        tracing::info!(path, "session established");
        Ok(())
    }

    /// Clears persisted credentials and the in-memory session. Always succeeds.
    pub async fn logout(&self) {
        for key in [KEY_TOKEN, KEY_USER, LEGACY_KEY_TOKEN] {
            self.credentials.remove(key);
        }
        self.update(|state| state.session = Session::default()).await;
    }

    pub async fn password_recovery(&self, email: &str) -> ActionResult<String> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ActionError::Validation("Email is required.".to_string()));
        }

        match self
            .api
            .post(PATH_FORGOT_PASSWORD, json!({ "email": email }), Auth::None)
            .await
        {
            Ok(_) => {
                self.set_message(RECOVERY_SENT).await;
                Ok(RECOVERY_SENT.to_string())
            }
            Err(e) => {
                tracing::info!(code = e.code(), status = ?e.status(), "password recovery failed");
                let message = failure_message(&e, |e| {
                    e.server_message().unwrap_or(RECOVERY_FAILED).to_string()
                });
                self.set_message(&message).await;
                Err(e)
            }
        }
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> ActionResult<String> {
        if token.trim().is_empty() {
            return Err(ActionError::Validation("Reset token is required.".to_string()));
        }
        if new_password.is_empty() {
            return Err(ActionError::Validation("New password is required.".to_string()));
        }

        let body = json!({ "token": token.trim(), "new_password": new_password });
        match self.api.post(PATH_RESET_PASSWORD, body, Auth::None).await {
            Ok(res) => {
                let message = server_message(&res).unwrap_or_else(|| RESET_DONE.to_string());
                self.set_message(&message).await;
                Ok(message)
            }
            Err(e) => {
                tracing::info!(code = e.code(), status = ?e.status(), "password reset failed");
                let message =
                    failure_message(&e, |e| e.server_message().unwrap_or(RESET_FAILED).to_string());
                self.set_message(&message).await;
                Err(e)
            }
        }
    }

    async fn set_message(&self, message: &str) {
        let message = message.to_string();
        self.update(|state| state.message = Some(message)).await;
    }

    /// Backend greeting shown on the landing page; it goes into the status message.
    pub async fn get_message(&self) -> Fetch {
        let fetched = match self.api.get(PATH_HELLO, Auth::None).await {
            Ok(body) => server_message(&body)
                .ok_or_else(|| ActionError::Parse("response has no message".to_string())),
            Err(e) => Err(e),
        };
        match fetched {
            Ok(message) => {
                self.set_message(&message).await;
                Fetch::Updated
            }
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "greeting fetch failed");
                Fetch::Kept(e)
            }
        }
    }

    pub async fn clear_message(&self) {
        self.update(|state| state.message = None).await;
    }

    /// Replaces the session's profile with the server's copy and persists it.
    pub async fn get_user(&self, id: Id) -> Fetch {
        let auth = self.bearer().await;
        let fetched = match self.api.get(&item_path(PATH_USERS, id), auth).await {
            Ok(body) => results::<UserProfile>(body),
            Err(e) => Err(e),
        };
        match fetched {
            Ok(user) => {
                match serde_json::to_string(&user) {
                    Ok(json) => self.credentials.set(KEY_USER, &json),
                    Err(e) => tracing::warn!(error = %e, "could not encode user profile"),
                }
                self.update(|state| state.session.user = Some(user)).await;
                Fetch::Updated
            }
            Err(e) => {
                tracing::warn!(user_id = id, code = e.code(), error = %e, "user fetch failed; keeping cached profile");
                Fetch::Kept(e)
            }
        }
    }

    pub async fn update_user(&self, id: Id, user: Value) -> ActionResult<Effect> {
        self.write(
            "update_user",
            Method::Put,
            &item_path(PATH_USERS, id),
            Some(user),
            Effect::RefreshUser(id),
        )
        .await
    }

    pub async fn delete_user(&self, id: Id) -> ActionResult<Effect> {
        self.write(
            "delete_user",
            Method::Delete,
            &item_path(PATH_USERS, id),
            None,
            Effect::EndSession,
        )
        .await
    }

    /// The backend has no contract for this operation yet.
    pub async fn edit_user(&self, id: Id, _user: Value) -> ActionResult<Effect> {
        tracing::info!(user_id = id, "edit_user has no backend endpoint");
        Err(ActionError::Unsupported("editUser"))
    }

    pub async fn set_current_user(&self, user: Option<UserProfile>) {
        self.update(|state| state.session.user = user).await;
    }
}
