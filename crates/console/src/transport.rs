//! Tenant-aware, session-aware request pipeline.
//!
//! Every request carries the bearer token and the selected tenant. A `401`
//! triggers one refresh and one retry; nothing more.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use thiserror::Error;

use crate::ConsoleContext;

pub const TENANT_HEADER: HeaderName = HeaderName::from_static("x-tenant-id");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Refresh failed and the session was ended; send the user to login.
    #[error("session expired")]
    SessionExpired,

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured API base URL.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn new(status: StatusCode) -> Self {
        Self { status, body: None }
    }
}

/// Carries a fully-decorated request to the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RequestError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RequestError> {
        (**self).send(request).await
    }
}

pub struct AuthorizedClient<T> {
    transport: T,
    context: Arc<ConsoleContext>,
}

impl<T: Transport> AuthorizedClient<T> {
    pub fn new(transport: T, context: Arc<ConsoleContext>) -> Self {
        Self { transport, context }
    }

    /// Send `request` with session and tenant headers.
    ///
    /// A `401` on the retry is returned as a normal response. A failed
    /// refresh has already ended the session, which also drops the tenant
    /// selection, so later requests go out without either header.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RequestError> {
        let response = self.transport.send(self.decorate(request.clone())?).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(path = %request.path, "401; refreshing session");
        if !self.context.session().refresh().await {
            tracing::warn!(path = %request.path, "session refresh failed");
            return Err(RequestError::SessionExpired);
        }

        self.transport.send(self.decorate(request)?).await
    }

    fn decorate(&self, mut request: ApiRequest) -> Result<ApiRequest, RequestError> {
        let headers = &mut request.headers;
        headers.remove(AUTHORIZATION);
        headers.remove(&TENANT_HEADER);

        if let Some(token) = self.context.session().access_token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RequestError::Transport(format!("invalid access token header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(tenant_id) = self.context.tenant().tenant_id() {
            let value = HeaderValue::from_str(tenant_id.as_str())
                .map_err(|e| RequestError::Transport(format!("invalid tenant header: {e}")))?;
            headers.insert(TENANT_HEADER, value);
        }
        Ok(request)
    }
}
