use crate::error::{ActionError, ActionResult};
use crate::redact::redact_secrets;
use crate::transport::{HttpRequest, Method, Transport};
use crate::types::UserProfile;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;

pub const PATH_HELLO: &str = "/api/hello";
pub const PATH_LOGIN: &str = "/api/login";
pub const PATH_SIGNUP: &str = "/api/signup";
pub const PATH_USERS: &str = "/api/users";
pub const PATH_TRANSACTIONS: &str = "/api/transactions";
pub const PATH_BUDGETS: &str = "/api/budgets";
pub const PATH_SOURCES: &str = "/api/sources";
pub const PATH_CATEGORIES: &str = "/api/categories";
pub const PATH_FIXED_EXPENSES: &str = "/api/fixed-expenses";
pub const PATH_BALANCES: &str = "/api/balances";
pub const PATH_FORGOT_PASSWORD: &str = "/api/forgot-password";
pub const PATH_RESET_PASSWORD: &str = "/api/reset-password";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
  None,
  /// Bearer auth requested; `None` means no token is known and the header is omitted.
  Bearer(Option<String>),
}

/// `/api/transactions` + `42` -> `/api/transactions/42`
pub fn item_path(collection: &str, id: impl Display) -> String {
  format!("{collection}/{}", urlencoding::encode(&id.to_string()))
}

/// First non-empty string among `message`, `msg`, `error`.
pub fn server_message(body: &Value) -> Option<String> {
  let obj = body.as_object()?;
  ["message", "msg", "error"].iter().find_map(|key| {
    obj
      .get(*key)
      .and_then(|v| v.as_str())
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_string)
  })
}

fn parse_body(text: &str) -> Result<Value, serde_json::Error> {
  if text.trim().is_empty() {
    return Ok(Value::Null);
  }
  serde_json::from_str(text)
}

#[derive(Debug, Deserialize)]
struct ResultsEnvelope<T> {
  results: T,
}

/// Decodes the `results` member of a `{results}` envelope.
pub fn results<T: DeserializeOwned>(body: Value) -> ActionResult<T> {
  let envelope: ResultsEnvelope<T> = serde_json::from_value(body)?;
  Ok(envelope.results)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginEnvelope {
  pub access_token: String,
  pub results: UserProfile,
}

pub struct ApiClient<T: Transport> {
  base_url: String,
  transport: T,
}

impl<T: Transport> ApiClient<T> {
  pub fn new(base_url: impl Into<String>, transport: T) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    Self { base_url, transport }
  }

  pub fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub async fn get(&self, path: &str, auth: Auth) -> ActionResult<Value> {
    self.request(Method::Get, path, None, auth).await
  }

  pub async fn post(&self, path: &str, body: Value, auth: Auth) -> ActionResult<Value> {
    self.request(Method::Post, path, Some(body), auth).await
  }

  pub async fn put(&self, path: &str, body: Value, auth: Auth) -> ActionResult<Value> {
    self.request(Method::Put, path, Some(body), auth).await
  }

  pub async fn delete(&self, path: &str, auth: Auth) -> ActionResult<Value> {
    self.request(Method::Delete, path, None, auth).await
  }

  pub async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
    auth: Auth,
  ) -> ActionResult<Value> {
    let mut headers = vec![("accept", "application/json".to_string())];
    let body = match body {
      Some(value) => {
        headers.push(("content-type", "application/json".to_string()));
        Some(serde_json::to_string(&value)?)
      }
      None => None,
    };
    match auth {
      Auth::None => {}
      Auth::Bearer(Some(token)) => headers.push(("authorization", format!("Bearer {token}"))),
      Auth::Bearer(None) => {
        tracing::debug!(%method, path, "no bearer token available; sending unauthenticated");
      }
    }

    let request = HttpRequest {
      method,
      url: self.url(path),
      headers,
      body,
    };

    let res = match self.transport.execute(request).await {
      Ok(r) => r,
      Err(e) => {
        let msg = redact_secrets(&e.to_string()).to_string();
        tracing::debug!(%method, path, error = %msg, "request did not complete");
        return Err(ActionError::Network(msg));
      }
    };

    if !(200..300).contains(&res.status) {
      let parsed = parse_body(&res.body).ok();
      let message = parsed.as_ref().and_then(server_message);
      tracing::debug!(
        %method,
        path,
        status = res.status,
        body = %redact_secrets(&res.body),
        "request rejected"
      );
      return Err(ActionError::Http {
        status: res.status,
        message,
      });
    }

    parse_body(&res.body).map_err(|e| {
      tracing::debug!(%method, path, status = res.status, error = %e, "response body is not json");
      ActionError::Parse(e.to_string())
    })
  }
}
