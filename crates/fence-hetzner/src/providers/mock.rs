//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use super::traits::{ApiResponse, Transport, TransportError};

enum Scripted {
    Response(ApiResponse),
    Error(String),
}

impl Scripted {
    fn produce(&self) -> Result<ApiResponse, TransportError> {
        match self {
            Self::Response(response) => Ok(response.clone()),
            Self::Error(message) => Err(TransportError::Config(message.clone())),
        }
    }
}

/// Transport replaying scripted responses per `METHOD path`.
///
/// Responses for a route are consumed in order; the last one repeats.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(self, method: &str, path: &str, scripted: Scripted) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(scripted);
        self
    }

    pub(crate) fn on_get(self, path: &str, status: u16, body: Value) -> Self {
        self.push("GET", path, Scripted::Response(response(status, body)))
    }

    pub(crate) fn on_post(self, path: &str, status: u16, body: Value) -> Self {
        self.push("POST", path, Scripted::Response(response(status, body)))
    }

    pub(crate) fn fail_get(self, path: &str, message: &str) -> Self {
        self.push("GET", path, Scripted::Error(message.to_string()))
    }

    pub(crate) fn fail_post(self, path: &str, message: &str) -> Self {
        self.push("POST", path, Scripted::Error(message.to_string()))
    }

    /// Number of requests made to `METHOD path`.
    pub(crate) fn count(&self, method: &str, path: &str) -> usize {
        let key = format!("{method} {path}");
        self.calls.lock().unwrap().iter().filter(|c| **c == key).count()
    }

    /// All requests made, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, method: &str, path: &str) -> Result<ApiResponse, TransportError> {
        let key = format!("{method} {path}");
        self.calls.lock().unwrap().push(key.clone());

        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&key) else {
            return Err(TransportError::Config(format!("unexpected request: {key}")));
        };
        if queue.len() > 1 {
            let scripted = queue.pop_front().unwrap();
            return scripted.produce();
        }
        match queue.front() {
            Some(scripted) => scripted.produce(),
            None => Err(TransportError::Config(format!("no response left for {key}"))),
        }
    }
}

pub(crate) fn response(status: u16, body: Value) -> ApiResponse {
    ApiResponse::new(StatusCode::from_u16(status).unwrap(), body)
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError> {
        self.next("GET", path)
    }

    async fn post(&self, path: &str) -> Result<ApiResponse, TransportError> {
        self.next("POST", path)
    }
}
