//! Identity session state machine.
//!
//! ```text
//!              login()                 ok
//! Anonymous ───────────▶ Authenticating ───▶ Authenticated ◀──┐
//!     ▲                        │ err              │ refresh()  │ ok
//!     └────────────────────────┘                  ▼            │
//!     ▲                                      Refreshing ───────┘
//!     └──────────── logout() / refresh failure ───┘
//! ```
//!
//! Every login and logout bumps the session generation. Async completions
//! carry the generation they started under and are discarded if it changed,
//! so a logout always wins over an in-flight login, restore or refresh.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use dashsphere_auth::{
    AuthorizationEngine, AuthorizationExplanation, Permission, Principal, ProfileUpdate, Role,
};
use dashsphere_core::{KeyValueStore, Notifier, StorageKeys, Subscription, UserId};

use crate::{AuthError, Authenticator, Credentials, LoginGrant, TokenPair};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    /// Logically still authenticated; a token refresh is in flight.
    Refreshing,
}

/// Read-only view of the session handed to UI and guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub principal: Option<Principal>,
    pub has_tokens: bool,
    pub generation: u64,
    pub established_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

/// Session change notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { user_id: UserId, generation: u64 },
    Restored { user_id: UserId, generation: u64 },
    Refreshed { generation: u64 },
    LoggedOut { user_id: Option<UserId>, generation: u64 },
    ProfileUpdated { user_id: UserId },
}

/// Principal and tokens always travel together.
#[derive(Debug, Clone)]
struct Established {
    principal: Principal,
    tokens: TokenPair,
    established_at: DateTime<Utc>,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    current: Option<Established>,
    generation: u64,
    refresh_inflight: Option<watch::Receiver<Option<bool>>>,
}

enum RefreshRole {
    Leader {
        tx: watch::Sender<Option<bool>>,
        refresh_token: String,
        generation: u64,
    },
    Follower(watch::Receiver<Option<bool>>),
}

/// Owns the authenticated principal, its tokens and the session lifecycle.
///
/// Locks are never held across an `.await`; every transition happens inside
/// one short critical section, which totally orders them.
pub struct IdentitySession {
    engine: Arc<AuthorizationEngine>,
    authenticator: Arc<dyn Authenticator>,
    storage: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    state: Mutex<SessionState>,
    events: Notifier<SessionEvent>,
    on_end: Option<SessionEndHook>,
}

/// Runs after every session end, outside the session lock.
type SessionEndHook = Box<dyn Fn() + Send + Sync>;

impl core::fmt::Debug for IdentitySession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentitySession")
            .field("keys", &self.keys)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl IdentitySession {
    pub fn new(
        engine: Arc<AuthorizationEngine>,
        authenticator: impl Authenticator + 'static,
        storage: Arc<dyn KeyValueStore>,
        keys: StorageKeys,
    ) -> Self {
        Self {
            engine,
            authenticator: Arc::new(authenticator),
            storage,
            keys,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Anonymous,
                current: None,
                generation: 0,
                refresh_inflight: None,
            }),
            events: Notifier::new(),
            on_end: None,
        }
    }

    /// Run `hook` whenever the session ends: logout, failed refresh, or a
    /// login replacing an established session.
    pub fn with_session_end_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_end = Some(Box::new(hook));
        self
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn engine(&self) -> &AuthorizationEngine {
        &self.engine
    }

    pub fn storage_keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn subscribe(&self) -> Subscription<SessionEvent> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        let st = self.state();
        SessionSnapshot {
            phase: st.phase,
            principal: st.current.as_ref().map(|e| e.principal.clone()),
            has_tokens: st.current.is_some(),
            generation: st.generation,
            established_at: st.current.as_ref().map(|e| e.established_at),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state().current.as_ref().map(|e| e.principal.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().current.is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state()
            .current
            .as_ref()
            .map(|e| e.tokens.access_token.clone())
    }

    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    // ─────────────────────────────────────────────────────────────────────
    // Authorization queries (delegated to the engine)
    // ─────────────────────────────────────────────────────────────────────

    pub fn has_role(&self, role: Role) -> bool {
        let st = self.state();
        self.engine
            .has_role(st.current.as_ref().map(|e| &e.principal), role)
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        let st = self.state();
        self.engine
            .has_permission(st.current.as_ref().map(|e| &e.principal), permission)
    }

    pub fn has_any_permission<'a>(
        &self,
        permissions: impl IntoIterator<Item = &'a Permission>,
    ) -> bool {
        let st = self.state();
        self.engine
            .has_any(st.current.as_ref().map(|e| &e.principal), permissions)
    }

    pub fn has_all_permissions<'a>(
        &self,
        permissions: impl IntoIterator<Item = &'a Permission>,
    ) -> bool {
        let st = self.state();
        self.engine
            .has_all(st.current.as_ref().map(|e| &e.principal), permissions)
    }

    /// Why the current principal is or is not granted `permission`.
    pub fn explain(&self, permission: &Permission) -> AuthorizationExplanation {
        let st = self.state();
        self.engine
            .explain(st.current.as_ref().map(|e| &e.principal), permission)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Re-establish a session from persisted tokens.
    ///
    /// Returns whether the session is authenticated afterwards. Without a
    /// persisted token pair, or when the backend cannot resolve the principal,
    /// the session stays `Anonymous`.
    pub async fn restore_from_persistence(&self) -> bool {
        let (tokens, generation) = {
            let mut st = self.state();
            match st.phase {
                SessionPhase::Authenticated | SessionPhase::Refreshing => return true,
                SessionPhase::Authenticating => return false,
                SessionPhase::Anonymous => {}
            }

            let access = self.storage.get(&self.keys.access_token);
            let refresh = self.storage.get(&self.keys.refresh_token);
            let (Some(access), Some(refresh)) = (access, refresh) else {
                // A lone token cannot form a session.
                self.storage.remove(&self.keys.access_token);
                self.storage.remove(&self.keys.refresh_token);
                tracing::debug!("no persisted session to restore");
                return false;
            };

            st.phase = SessionPhase::Authenticating;
            (TokenPair::new(access, refresh), st.generation)
        };

        let result = self.authenticator.fetch_principal(&tokens.access_token).await;

        let mut st = self.state();
        if st.generation != generation {
            tracing::debug!(generation, "discarding stale restore result");
            return false;
        }

        match result {
            Ok(principal) => {
                let user_id = principal.id.clone();
                st.current = Some(Established {
                    principal,
                    tokens,
                    established_at: Utc::now(),
                });
                st.phase = SessionPhase::Authenticated;
                drop(st);

                tracing::info!(%user_id, generation, "session restored");
                self.events.publish(SessionEvent::Restored {
                    user_id,
                    generation,
                });
                true
            }
            Err(err) => {
                st.phase = SessionPhase::Anonymous;
                if err.invalidates_credentials() {
                    self.storage.remove(&self.keys.access_token);
                    self.storage.remove(&self.keys.refresh_token);
                }
                tracing::warn!(error = %err, "session restore failed");
                false
            }
        }
    }

    /// Exchange credentials for a session.
    ///
    /// Any session that was established when the call started ends first.
    /// On failure the session is `Anonymous` with no tokens persisted.
    pub async fn login(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        let (generation, ended) = {
            let mut guard = self.state();
            let st = &mut *guard;
            let ended = if st.current.is_some() {
                Some(self.end_session(st))
            } else {
                self.storage.remove(&self.keys.access_token);
                self.storage.remove(&self.keys.refresh_token);
                None
            };
            st.generation += 1;
            st.phase = SessionPhase::Authenticating;
            (st.generation, ended)
        };
        if let Some(event) = ended {
            self.announce(event);
        }

        tracing::debug!(email = %credentials.email, generation, "login started");
        let result = self.authenticator.login(credentials).await;

        let mut st = self.state();
        if st.generation != generation {
            tracing::debug!(generation, "discarding stale login result");
            return Err(AuthError::SessionChanged);
        }

        match result {
            Ok(LoginGrant { principal, tokens }) => {
                self.storage.set(&self.keys.access_token, &tokens.access_token);
                self.storage.set(&self.keys.refresh_token, &tokens.refresh_token);
                st.current = Some(Established {
                    principal: principal.clone(),
                    tokens,
                    established_at: Utc::now(),
                });
                st.phase = SessionPhase::Authenticated;
                drop(st);

                tracing::info!(user_id = %principal.id, role = %principal.role, generation, "logged in");
                self.events.publish(SessionEvent::LoggedIn {
                    user_id: principal.id.clone(),
                    generation,
                });
                Ok(principal)
            }
            Err(err) => {
                st.phase = SessionPhase::Anonymous;
                tracing::warn!(error = %err, "login failed");
                Err(err)
            }
        }
    }

    /// End the session and purge tokens and tenant selection from storage.
    ///
    /// Idempotent; also valid while `Anonymous`.
    pub fn logout(&self) {
        let event = {
            let mut guard = self.state();
            self.end_session(&mut guard)
        };
        tracing::info!("logged out");
        self.announce(event);
    }

    /// Renew the access token.
    ///
    /// Only one refresh is ever in flight; concurrent callers share its
    /// outcome. A failed refresh logs the session out. A result that arrives
    /// after a logout or login is discarded and reported as `false`.
    pub async fn refresh(&self) -> bool {
        let role = {
            let mut guard = self.state();
            let st = &mut *guard;
            if let Some(rx) = &st.refresh_inflight {
                RefreshRole::Follower(rx.clone())
            } else {
                let refresh_token = match (st.phase, &st.current) {
                    (SessionPhase::Authenticated, Some(e)) => e.tokens.refresh_token.clone(),
                    _ => return false,
                };
                let (tx, rx) = watch::channel(None);
                st.refresh_inflight = Some(rx);
                st.phase = SessionPhase::Refreshing;
                RefreshRole::Leader {
                    tx,
                    refresh_token,
                    generation: st.generation,
                }
            }
        };

        match role {
            RefreshRole::Follower(mut rx) => match rx.wait_for(Option::is_some).await {
                Ok(outcome) => *outcome == Some(true),
                Err(_) => false,
            },
            RefreshRole::Leader {
                tx,
                refresh_token,
                generation,
            } => {
                let slot = RefreshSlot {
                    session: self,
                    generation,
                    tx: Some(tx),
                };
                self.lead_refresh(slot, &refresh_token).await
            }
        }
    }

    async fn lead_refresh(&self, slot: RefreshSlot<'_>, refresh_token: &str) -> bool {
        let result = self.authenticator.refresh(refresh_token).await;

        let (outcome, event) = {
            let mut guard = self.state();
            let st = &mut *guard;
            if st.generation != slot.generation {
                tracing::debug!(generation = slot.generation, "discarding stale refresh result");
                (false, None)
            } else {
                st.refresh_inflight = None;
                match result {
                    Ok(access_token) => match st.current.as_mut() {
                        Some(established) => {
                            self.storage.set(&self.keys.access_token, &access_token);
                            established.tokens.access_token = access_token;
                            st.phase = SessionPhase::Authenticated;
                            (
                                true,
                                Some(SessionEvent::Refreshed {
                                    generation: st.generation,
                                }),
                            )
                        }
                        None => (false, Some(self.end_session(st))),
                    },
                    Err(err) => {
                        tracing::warn!(error = %err, "token refresh failed; ending session");
                        (false, Some(self.end_session(st)))
                    }
                }
            }
        };

        if let Some(event) = event {
            self.announce(event);
        }
        slot.complete(outcome);
        outcome
    }

    /// Shallow-merge `update` into the principal. No-op while anonymous.
    ///
    /// Returns whether a principal was updated.
    pub fn update_profile(&self, update: ProfileUpdate) -> bool {
        let user_id = {
            let mut st = self.state();
            let Some(established) = st.current.as_mut() else {
                return false;
            };
            established.principal.apply(update);
            established.principal.id.clone()
        };
        self.events.publish(SessionEvent::ProfileUpdated { user_id });
        true
    }

    fn announce(&self, event: SessionEvent) {
        let ended = matches!(event, SessionEvent::LoggedOut { .. });
        self.events.publish(event);
        if let Some(hook) = self.on_end.as_ref().filter(|_| ended) {
            hook();
        }
    }

    /// Clear the session under the caller's lock and bump the generation.
    fn end_session(&self, st: &mut SessionState) -> SessionEvent {
        let previous = st.current.take();
        st.generation += 1;
        st.phase = SessionPhase::Anonymous;
        st.refresh_inflight = None;
        for key in self.keys.session_keys() {
            self.storage.remove(key);
        }
        SessionEvent::LoggedOut {
            user_id: previous.map(|e| e.principal.id),
            generation: st.generation,
        }
    }
}

/// Leader's claim on the single in-flight refresh.
///
/// If the leader's future is dropped before completing, the slot is released
/// and waiters observe `false`.
struct RefreshSlot<'a> {
    session: &'a IdentitySession,
    generation: u64,
    tx: Option<watch::Sender<Option<bool>>>,
}

impl RefreshSlot<'_> {
    fn complete(mut self, outcome: bool) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Some(outcome));
        }
    }
}

impl Drop for RefreshSlot<'_> {
    fn drop(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        {
            let mut st = self.session.state();
            if st.generation == self.generation && st.phase == SessionPhase::Refreshing {
                st.phase = SessionPhase::Authenticated;
                st.refresh_inflight = None;
            }
        }
        let _ = tx.send(Some(false));
    }
}
