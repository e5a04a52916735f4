//! Test doubles shared by the controller tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use http::Method;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use crate::api::{ApiClient, ApiRequest, ApiResponse, Transport};
use crate::config::ClientConfig;
use crate::error::AppResult;
use crate::notify::ToastQueue;
use crate::session::{MemorySessionStore, Role};

pub const OWNER_ID: &str = "owner-1";

pub fn mint_token(claims: Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("token encodes")
}

pub fn valid_token() -> String {
    mint_token(json!({
        "id": OWNER_ID,
        "role": "landlord",
        "exp": (Utc::now() + Duration::hours(1)).timestamp()
    }))
}

struct Route {
    method: Method,
    path: String,
    responses: VecDeque<ApiResponse>,
}

/// Scripted transport. Each route replays its queued responses in order and
/// repeats the last one; unknown routes answer 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        let body = serde_json::to_vec(&body).expect("json body");
        self.push(method, path, ApiResponse {
            status,
            content_type: Some("application/json".to_string()),
            body,
        });
    }

    pub fn respond_bytes(&self, method: Method, path: &str, status: u16, body: Vec<u8>) {
        self.push(method, path, ApiResponse {
            status,
            content_type: Some("application/octet-stream".to_string()),
            body,
        });
    }

    fn push(&self, method: Method, path: &str, response: ApiResponse) {
        let mut routes = self.routes.lock().expect("routes lock");
        if let Some(route) = routes
            .iter_mut()
            .find(|route| route.method == method && route.path == path)
        {
            route.responses.push_back(response);
            return;
        }
        routes.push(Route {
            method,
            path: path.to_string(),
            responses: VecDeque::from([response]),
        });
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn calls(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    pub fn last(&self, method: Method, path: &str) -> Option<ApiRequest> {
        self.requests()
            .into_iter()
            .rev()
            .find(|request| request.method == method && request.path == path)
    }

    pub fn last_json(&self, method: Method, path: &str) -> Option<Value> {
        self.last(method, path)
            .and_then(|request| request.json_body().cloned())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> AppResult<ApiResponse> {
        let response = {
            let mut routes = self.routes.lock().expect("routes lock");
            routes
                .iter_mut()
                .find(|route| route.method == request.method && route.path == request.path)
                .and_then(|route| {
                    if route.responses.len() > 1 {
                        route.responses.pop_front()
                    } else {
                        route.responses.front().cloned()
                    }
                })
        };
        self.requests.lock().expect("requests lock").push(request);
        Ok(response.unwrap_or_else(|| ApiResponse {
            status: 404,
            content_type: Some("application/json".to_string()),
            body: br#"{"success":false,"message":"Route not scripted"}"#.to_vec(),
        }))
    }
}

/// Transport whose requests never complete.
pub struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn send(&self, _request: ApiRequest) -> AppResult<ApiResponse> {
        std::future::pending().await
    }
}

pub fn fake_client(role: Role) -> (ApiClient, Arc<FakeTransport>, Arc<MemorySessionStore>) {
    let transport = Arc::new(FakeTransport::default());
    let session = Arc::new(MemorySessionStore::with_token(role, &valid_token()));
    let client = ApiClient::new(transport.clone(), session.clone(), role);
    (client, transport, session)
}

pub fn toasts() -> ToastQueue {
    ToastQueue::from_config(&ClientConfig::default())
}
