pub mod envelope;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http::Method;
use serde_json::Value;

use crate::auth::{decode_and_validate, normalize_token, Claims};
use crate::error::{AppError, AppResult, AuthError};
use crate::session::{Role, SessionStore};

pub use transport::{ApiRequest, ApiResponse, FormPart, HttpTransport, RequestBody, Transport, UploadFile};

/// Authenticated client bound to one dashboard role.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionStore>,
    role: Role,
    authenticated: bool,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<dyn SessionStore>, role: Role) -> Self {
        Self {
            transport,
            session,
            role,
            authenticated: true,
        }
    }

    /// Same transport, no bearer token. Used by public listing endpoints.
    pub fn public(&self) -> Self {
        Self {
            authenticated: false,
            ..self.clone()
        }
    }

    /// Same transport and session, scoped to another role's token.
    pub fn with_role(&self, role: Role) -> Self {
        Self {
            role,
            ..self.clone()
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Reads and decodes the role's token. An expired token is cleared.
    pub fn claims(&self) -> AppResult<Claims> {
        let (_, claims) = self.current_token()?;
        Ok(claims)
    }

    fn current_token(&self) -> AppResult<(String, Claims)> {
        let Some(token) = self.session.token(self.role) else {
            tracing::warn!(role = self.role.as_str(), "No session token stored");
            return Err(AuthError::Missing.into());
        };
        match decode_and_validate(&token, Utc::now()) {
            Ok(claims) => Ok((normalize_token(&token).to_string(), claims)),
            Err(error @ AuthError::Expired { .. }) => {
                tracing::info!(role = self.role.as_str(), "Session token expired, clearing it");
                if let Err(clear_error) = self.session.clear_token(self.role) {
                    tracing::error!(error = %clear_error, "Failed to clear expired token");
                }
                Err(error.into())
            }
            Err(error) => {
                tracing::warn!(role = self.role.as_str(), error = ?error, "Stored session token is unreadable");
                Err(error.into())
            }
        }
    }

    /// Sends a request with the role's bearer token and returns the raw response.
    pub async fn execute(&self, mut request: ApiRequest) -> AppResult<ApiResponse> {
        if self.authenticated {
            let (token, _) = self.current_token()?;
            request.bearer = Some(token);
        }
        self.transport.send(request).await
    }

    /// Sends a request and unwraps the JSON envelope, failing on an error
    /// status or `success: false`.
    pub async fn send(&self, request: ApiRequest) -> AppResult<Value> {
        let method = request.method.clone();
        let path = request.path.clone();
        let response = self.execute(request).await?;
        let body = response.json();
        if let Err(error) = envelope::check(response.status, &body) {
            tracing::error!(
                method = %method,
                path = %path,
                status = response.status,
                error = %error,
                "API call rejected"
            );
            return Err(error);
        }
        Ok(body)
    }

    /// Like [`send`](Self::send), but also requires the body to carry
    /// `success: true`. Used where a step must not advance on an empty reply.
    pub async fn send_confirmed(&self, request: ApiRequest) -> AppResult<Value> {
        let method = request.method.clone();
        let path = request.path.clone();
        let body = self.send(request).await?;
        if let Err(error) = envelope::confirm(&body) {
            tracing::error!(method = %method, path = %path, error = %error, "API call not confirmed");
            return Err(error);
        }
        Ok(body)
    }

    pub async fn get(&self, path: &str) -> AppResult<Value> {
        self.send(ApiRequest::new(Method::GET, path)).await
    }

    pub async fn get_with(
        &self,
        path: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> AppResult<Value> {
        let mut request = ApiRequest::new(Method::GET, path);
        for (key, value) in query {
            request = request.query(key, value);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        self.send(request).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> AppResult<Value> {
        self.send(ApiRequest::new(Method::POST, path).json(body)).await
    }

    pub async fn put_json(&self, path: &str, body: Value) -> AppResult<Value> {
        self.send(ApiRequest::new(Method::PUT, path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> AppResult<Value> {
        self.send(ApiRequest::new(Method::DELETE, path)).await
    }

    pub async fn post_multipart(&self, path: &str, parts: Vec<FormPart>) -> AppResult<Value> {
        self.send(ApiRequest::new(Method::POST, path).multipart(parts))
            .await
    }

    /// Fetches a binary resource such as a PDF receipt.
    pub async fn download(&self, path: &str) -> AppResult<Vec<u8>> {
        let response = self.execute(ApiRequest::new(Method::GET, path)).await?;
        if !response.is_success() {
            let body = response.json();
            let error = envelope::check(response.status, &body)
                .err()
                .unwrap_or_else(|| AppError::from_status(response.status, String::new()));
            tracing::error!(path = %path, status = response.status, error = %error, "Download failed");
            return Err(error);
        }
        Ok(response.body)
    }
}
