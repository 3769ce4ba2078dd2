//! Backend seam for credential exchange.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use dashsphere_auth::Principal;

use crate::{AuthError, Credentials, TokenPair};

/// Successful credential exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub principal: Principal,
    pub tokens: TokenPair,
}

/// Talks to the identity backend.
///
/// Implementations perform the network round-trips; the session state
/// machine owns every state transition.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, AuthError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError>;

    /// Resolve the principal an access token belongs to.
    async fn fetch_principal(&self, access_token: &str) -> Result<Principal, AuthError>;
}

#[async_trait]
impl<A> Authenticator for Arc<A>
where
    A: Authenticator + ?Sized,
{
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, AuthError> {
        (**self).login(credentials).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        (**self).refresh(refresh_token).await
    }

    async fn fetch_principal(&self, access_token: &str) -> Result<Principal, AuthError> {
        (**self).fetch_principal(access_token).await
    }
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    principal: Principal,
}

#[derive(Debug, Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    login_failures: VecDeque<AuthError>,
    refresh_failures: VecDeque<AuthError>,
    refresh_gate: Option<Arc<Notify>>,
}

/// In-memory identity backend for tests/dev.
///
/// Accounts are registered up front; tokens are opaque counters. Every call
/// yields to the scheduler once so callers observe a real suspension point.
#[derive(Debug, Default)]
pub struct InMemoryAuthenticator {
    directory: Mutex<Directory>,
    next_token: AtomicU64,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl InMemoryAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    fn directory(&self) -> std::sync::MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, password: impl Into<String>, principal: Principal) {
        let account = Account {
            password: password.into(),
            principal,
        };
        self.directory()
            .accounts
            .insert(account.principal.email.clone(), account);
    }

    pub fn with_account(self, password: impl Into<String>, principal: Principal) -> Self {
        self.register(password, principal);
        self
    }

    /// Make the next login fail with `error` instead of checking credentials.
    pub fn fail_next_login(&self, error: AuthError) {
        self.directory().login_failures.push_back(error);
    }

    pub fn fail_next_refresh(&self, error: AuthError) {
        self.directory().refresh_failures.push_back(error);
    }

    /// Invalidate a refresh token and every access token of its account.
    pub fn revoke(&self, refresh_token: &str) {
        let mut dir = self.directory();
        if let Some(email) = dir.refresh_tokens.remove(refresh_token) {
            dir.access_tokens.retain(|_, owner| *owner != email);
        }
    }

    /// Hold every subsequent refresh until the returned handle is notified
    /// (one permit per held refresh).
    pub fn hold_refreshes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.directory().refresh_gate = Some(gate.clone());
        gate
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn mint(&self, kind: &str) -> String {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{kind}-{n}")
    }
}

#[async_trait]
impl Authenticator for InMemoryAuthenticator {
    async fn login(&self, credentials: &Credentials) -> Result<LoginGrant, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let principal = {
            let mut dir = self.directory();
            if let Some(err) = dir.login_failures.pop_front() {
                return Err(err);
            }
            match dir.accounts.get(&credentials.email) {
                Some(account) if account.password == credentials.password => {
                    account.principal.clone()
                }
                _ => return Err(AuthError::InvalidCredentials),
            }
        };

        let tokens = TokenPair::new(self.mint("access"), self.mint("refresh"));
        let mut dir = self.directory();
        dir.access_tokens
            .insert(tokens.access_token.clone(), principal.email.clone());
        dir.refresh_tokens
            .insert(tokens.refresh_token.clone(), principal.email.clone());

        Ok(LoginGrant { principal, tokens })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.directory().refresh_gate.clone();
        match gate {
            Some(gate) => gate.notified().await,
            None => tokio::task::yield_now().await,
        }

        let email = {
            let mut dir = self.directory();
            if let Some(err) = dir.refresh_failures.pop_front() {
                return Err(err);
            }
            dir.refresh_tokens
                .get(refresh_token)
                .cloned()
                .ok_or(AuthError::InvalidRefreshToken)?
        };

        let access_token = self.mint("access");
        self.directory()
            .access_tokens
            .insert(access_token.clone(), email);
        Ok(access_token)
    }

    async fn fetch_principal(&self, access_token: &str) -> Result<Principal, AuthError> {
        tokio::task::yield_now().await;

        let dir = self.directory();
        let email = dir
            .access_tokens
            .get(access_token)
            .ok_or(AuthError::InvalidAccessToken)?;
        dir.accounts
            .get(email)
            .map(|account| account.principal.clone())
            .ok_or(AuthError::InvalidAccessToken)
    }
}
