mod common;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::StatusCode;
use http::header::AUTHORIZATION;
use serde_json::json;

use dashsphere_console::{
    ApiRequest, ApiResponse, AuthorizedClient, RequestError, TENANT_HEADER, Transport,
};
use dashsphere_session::{AuthError, SessionPhase};

use common::{ADMIN, VIEWER, fixture};

/// Records every request and answers from a script (then `200 OK`).
#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<StatusCode, RequestError>>>,
    seen: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    fn answering(replies: impl IntoIterator<Item = Result<StatusCode, RequestError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::default(),
        })
    }

    fn seen(&self) -> Vec<ApiRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, RequestError> {
        self.seen.lock().unwrap().push(request);
        let reply = self.script.lock().unwrap().pop_front();
        let status = reply.unwrap_or(Ok(StatusCode::OK))?;
        Ok(ApiResponse::new(status))
    }
}

fn bearer(request: &ApiRequest) -> Option<&str> {
    request
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

fn tenant_header(request: &ApiRequest) -> Option<&str> {
    request
        .headers
        .get(&TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn requests_carry_token_and_tenant() {
    let f = fixture();
    f.login(ADMIN).await;
    f.select("t1");
    let transport = ScriptedTransport::answering([]);
    let client = AuthorizedClient::new(transport.clone(), f.ctx.clone());

    let response = client
        .send(ApiRequest::new(http::Method::POST, "/users").with_json(json!({"name": "Bo"})))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    let seen = transport.seen();
    let token = f.ctx.session().access_token().unwrap();
    assert_eq!(bearer(&seen[0]), Some(format!("Bearer {token}").as_str()));
    assert_eq!(tenant_header(&seen[0]), Some("t1"));
}

#[tokio::test]
async fn anonymous_requests_are_undecorated() {
    let f = fixture();
    let transport = ScriptedTransport::answering([]);
    let client = AuthorizedClient::new(transport.clone(), f.ctx.clone());

    client.send(ApiRequest::get("/health")).await.unwrap();

    let seen = transport.seen();
    assert_eq!(bearer(&seen[0]), None);
    assert_eq!(tenant_header(&seen[0]), None);
}

#[tokio::test]
async fn caller_supplied_auth_headers_are_replaced() {
    let f = fixture();
    let transport = ScriptedTransport::answering([]);
    let client = AuthorizedClient::new(transport.clone(), f.ctx.clone());

    let mut request = ApiRequest::get("/users");
    request
        .headers
        .insert(AUTHORIZATION, "Bearer forged".parse().unwrap());
    client.send(request).await.unwrap();

    assert_eq!(bearer(&transport.seen()[0]), None);
}

#[tokio::test]
async fn unauthorized_triggers_one_refresh_and_retry() {
    let f = fixture();
    f.login(ADMIN).await;
    let old = f.ctx.session().access_token().unwrap();
    let transport = ScriptedTransport::answering([Ok(StatusCode::UNAUTHORIZED)]);
    let client = AuthorizedClient::new(transport.clone(), f.ctx.clone());

    let response = client.send(ApiRequest::get("/users")).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(f.backend.refresh_calls(), 1);
    let seen = transport.seen();
    assert_eq!(seen.len(), 2);
    let new = f.ctx.session().access_token().unwrap();
    assert_ne!(old, new);
    assert_eq!(bearer(&seen[1]), Some(format!("Bearer {new}").as_str()));
}

#[tokio::test]
async fn unauthorized_retry_is_returned_as_is() {
    let f = fixture();
    f.login(ADMIN).await;
    let transport = ScriptedTransport::answering([
        Ok(StatusCode::UNAUTHORIZED),
        Ok(StatusCode::UNAUTHORIZED),
    ]);
    let client = AuthorizedClient::new(transport.clone(), f.ctx.clone());

    let response = client.send(ApiRequest::get("/users")).await.unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(f.backend.refresh_calls(), 1);
    assert_eq!(transport.seen().len(), 2);
    assert!(f.ctx.session().is_authenticated());
}

#[tokio::test]
async fn failed_refresh_expires_the_session() {
    let f = fixture();
    f.login(ADMIN).await;
    f.backend.fail_next_refresh(AuthError::InvalidRefreshToken);
    let transport = ScriptedTransport::answering([Ok(StatusCode::UNAUTHORIZED)]);
    let client = AuthorizedClient::new(transport.clone(), f.ctx.clone());

    f.select("t1");

    let err = client.send(ApiRequest::get("/users")).await.unwrap_err();

    assert_eq!(err, RequestError::SessionExpired);
    assert_eq!(transport.seen().len(), 1);
    assert_eq!(f.ctx.session().phase(), SessionPhase::Anonymous);
    assert!(f.ctx.tenant().current().is_none());
    assert!(f.storage.is_empty());

    client.send(ApiRequest::get("/plans")).await.unwrap();
    let anonymous = &transport.seen()[1];
    assert_eq!(bearer(anonymous), None);
    assert_eq!(tenant_header(anonymous), None);

    f.login(VIEWER).await;
    assert_eq!(f.ctx.tenant().tenant_id(), None);
}

#[tokio::test]
async fn other_failures_pass_through() {
    let f = fixture();
    f.login(ADMIN).await;
    let transport = ScriptedTransport::answering([
        Ok(StatusCode::FORBIDDEN),
        Err(RequestError::Transport("connection reset".to_string())),
    ]);
    let client = AuthorizedClient::new(transport.clone(), f.ctx.clone());

    let forbidden = client.send(ApiRequest::get("/tenants")).await.unwrap();
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let err = client.send(ApiRequest::get("/tenants")).await.unwrap_err();
    assert_eq!(err, RequestError::Transport("connection reset".to_string()));
    assert_eq!(f.backend.refresh_calls(), 0);
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let f = fixture();
    f.login(ADMIN).await;
    let transport = ScriptedTransport::answering([
        Ok(StatusCode::UNAUTHORIZED),
        Ok(StatusCode::UNAUTHORIZED),
    ]);
    let client = AuthorizedClient::new(transport.clone(), f.ctx.clone());

    let (a, b) = tokio::join!(
        client.send(ApiRequest::get("/users")),
        client.send(ApiRequest::get("/analytics/overview"))
    );

    assert_eq!(a.unwrap().status, StatusCode::OK);
    assert_eq!(b.unwrap().status, StatusCode::OK);
    assert_eq!(f.backend.refresh_calls(), 1);
    assert_eq!(transport.seen().len(), 4);
}
