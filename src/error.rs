use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request failed with status {status}")]
    Http {
        status: u16,
        message: Option<String>,
    },
    #[error("invalid response: {0}")]
    Parse(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0} is not supported by the backend")]
    Unsupported(&'static str),
}

pub type ActionResult<T> = Result<T, ActionError>;

impl ActionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "NETWORK",
            Self::Http { .. } => "HTTP",
            Self::Parse(_) => "PARSE",
            Self::Validation(_) => "VALIDATION",
            Self::Unsupported(_) => "UNSUPPORTED",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided message for HTTP failures, if the body carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Unable to reach the server.".to_string(),
            Self::Http {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Http { status, .. } => format!("Request failed ({status})."),
            Self::Parse(_) => "Unexpected response from the server.".to_string(),
            Self::Validation(message) => message.clone(),
            Self::Unsupported(what) => format!("{what} is not available yet."),
        }
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}
