//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokenkeep_core::{
    ApiRequest, ApiResponse, AuthError, Headers, RequestError, Transport,
};

/// Transport that replays queued responses and records every request.
pub struct ScriptedTransport {
    base_url: String,
    responses: Mutex<VecDeque<Result<ApiResponse, AuthError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Self::with_base_url("https://api.github.com")
    }

    pub fn with_base_url(base_url: &str) -> Arc<Self> {
        Arc::new(Self {
            base_url: base_url.to_string(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Queue a successful response.
    pub fn respond(&self, response: ApiResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queue a 200 response with a JSON body.
    pub fn respond_json(&self, body: Value) {
        self.respond(ApiResponse::new(200, body));
    }

    /// Queue a failed response.
    pub fn fail(&self, status: u16, body: Value) {
        self.responses
            .lock()
            .push_back(Err(RequestError::from_response(status, Headers::new(), body).into()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        let url = request.url.clone();
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(AuthError::Transport {
                    message: format!("no scripted response for {}", url),
                })
            })
    }
}
