use std::future::Future;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
  Put,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Get => "GET",
      Self::Post => "POST",
      Self::Put => "PUT",
      Self::Delete => "DELETE",
    }
  }
}

impl std::fmt::Display for Method {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
  pub method: Method,
  pub url: String,
  pub headers: Vec<(&'static str, String)>,
  pub body: Option<String>,
}

impl HttpRequest {
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
  #[error("network error: {0}")]
  Network(#[from] reqwest::Error),
  #[error("invalid header {0}")]
  InvalidHeader(&'static str),
  #[error("{0}")]
  Other(String),
}

/// Executes one HTTP exchange. Implementations do no status interpretation.
pub trait Transport: Send + Sync {
  fn execute(
    &self,
    request: HttpRequest,
  ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

pub struct ReqwestTransport {
  http: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new() -> Result<Self, TransportError> {
    Ok(Self {
      http: reqwest::Client::builder().build()?,
    })
  }
}

impl Transport for ReqwestTransport {
  async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let method = match request.method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Delete => reqwest::Method::DELETE,
    };

    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in &request.headers {
      let header = reqwest::header::HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| TransportError::InvalidHeader(*name))?;
      let value = reqwest::header::HeaderValue::from_str(value)
        .map_err(|_| TransportError::InvalidHeader(*name))?;
      headers.insert(header, value);
    }

    let mut builder = self.http.request(method, request.url.as_str()).headers(headers);
    if let Some(body) = request.body {
      builder = builder.body(body);
    }

    let res = builder.send().await?;
    let status = res.status().as_u16();
    let body = res.text().await?;
    Ok(HttpResponse { status, body })
  }
}
