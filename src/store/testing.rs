//! Scripted stand-in for the HTTP transport.

use super::Store;
use crate::api::ApiClient;
use crate::state::CredentialStore;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub(crate) const TEST_BACKEND: &str = "http://backend.test/";

#[derive(Debug, Clone)]
enum Scripted {
    Respond(HttpResponse),
    Fail(String),
}

#[derive(Default)]
struct Script {
    queues: HashMap<(Method, String), VecDeque<Scripted>>,
    requests: Vec<HttpRequest>,
}

/// Replies to requests from per-route queues. The last reply queued for a route
/// repeats once the others are used up; unscripted routes fail like a dropped
/// connection. Clones share the same script and request log.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

fn path_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Scripted) {
        let mut script = self.script.lock().unwrap();
        script
            .queues
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn respond(&self, method: Method, path: &str, status: u16, body: &str) {
        self.push(
            method,
            path,
            Scripted::Respond(HttpResponse {
                status,
                body: body.to_string(),
            }),
        );
    }

    pub(crate) fn fail(&self, method: Method, path: &str, message: &str) {
        self.push(method, path, Scripted::Fail(message.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub(crate) fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .count()
    }

    fn next(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.script.lock().unwrap();
        let key = (request.method, path_of(&request.url));
        script.requests.push(request);

        let reply = match script.queues.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match reply {
            Some(Scripted::Respond(res)) => Ok(res),
            Some(Scripted::Fail(msg)) => Err(TransportError::Other(msg)),
            None => Err(TransportError::Other(format!(
                "no scripted reply for {} {}",
                key.0, key.1
            ))),
        }
    }
}

impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.next(request)
    }
}

pub(crate) fn store_with(
    transport: ScriptedTransport,
    credentials: CredentialStore,
) -> Store<ScriptedTransport> {
    Store::new(ApiClient::new(TEST_BACKEND, transport), credentials)
}

/// A store with a token already persisted, as after a previous login.
pub(crate) fn logged_in_store(transport: ScriptedTransport) -> Store<ScriptedTransport> {
    let credentials = CredentialStore::in_memory();
    credentials.set(crate::state::KEY_TOKEN, "tok");
    store_with(transport, credentials)
}
