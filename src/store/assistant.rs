use super::Store;
use crate::error::{ActionError, ActionResult};
use crate::transport::Transport;
use serde_json::{json, Value};

fn answer_of(body: &Value) -> Option<String> {
    body.get("answer")
        .or_else(|| body.get("results").and_then(|r| r.get("answer")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl<T: Transport> Store<T> {
    /// Sends a free-text question to the assistant endpoint. Nothing in the
    /// shared state changes; conversation history belongs to the caller.
    pub async fn ask_assistant(&self, question: &str) -> ActionResult<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ActionError::Validation("Question must not be empty.".to_string()));
        }
        let Some(path) = self.assistant_path.as_deref() else {
            tracing::info!("assistant endpoint is not configured");
            return Err(ActionError::Unsupported("askAIQuestion"));
        };

        let auth = self.bearer().await;
        let body = self
            .api
            .post(path, json!({ "question": question }), auth)
            .await
            .map_err(|e| {
                tracing::info!(code = e.code(), error = %e, "assistant request failed");
                e
            })?;
        answer_of(&body).ok_or_else(|| ActionError::Parse("response has no answer".to_string()))
    }
}
