//! The navigation guard.
//!
//! Every navigation attempt runs through a three-state machine:
//!
//! - `Unauthenticated` - only public targets pass, everything else bounces
//!   to the login location with the target as a return parameter.
//! - `PendingRoutes` - a credential exists but the accessible forest has
//!   not been materialized. The guard fetches the identity if missing,
//!   filters the static forest once, registers it, and re-dispatches the
//!   original navigation.
//! - `Ready` - targets resolve against the registered forest and pass a
//!   second authorization check against the live identity.
//!
//! State is held behind a mutex that is never kept across the identity
//! fetch; a navigation sequence number detects attempts superseded while
//! the fetch was in flight, so a stale completion never writes routing
//! state or re-dispatches to an abandoned target.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::identity::{Credentials, Identity, IdentityProvider};
use crate::nav::errors::NavError;
use crate::nav::filter::{filter_routes, has_full_access, menu_entries, node_permitted, MenuEntry};
use crate::nav::route::{find_by_path, RouteNode};
use crate::nav::session::{SessionState, SessionStore};
use crate::nav::table::RouteTable;
use crate::settings::AuthSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unauthenticated,
    /// Credential present, accessible routes not yet materialized.
    PendingRoutes,
    /// Accessible forest registered; navigations resolve against it.
    Ready,
}

/// Materialization state. `materialized` flips true exactly once per
/// authenticated session and resets only together with the session.
struct RoutingState {
    materialized: bool,
    accessible: Vec<RouteNode>,
    version: u64,
}

impl RoutingState {
    fn new() -> Self {
        Self {
            materialized: false,
            accessible: Vec::new(),
            version: 0,
        }
    }

    fn materialize(&mut self, forest: Vec<RouteNode>) {
        self.accessible = forest;
        self.materialized = true;
        self.version += 1;
    }

    fn reset(&mut self) {
        self.accessible.clear();
        self.materialized = false;
        self.version += 1;
    }
}

/// What the navigation system should do with an attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavOutcome {
    Allow {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Redirect {
        to: String,
    },
    /// Blocked by the live identity check; go back where you came from.
    Denied {
        to: String,
        message: String,
    },
    /// Abandoned because a newer navigation replaced this one mid-fetch.
    Superseded,
}

struct GuardInner {
    state: GuardState,
    session: SessionState,
    routing: RoutingState,
    table: RouteTable,
}

pub struct NavigationGuard {
    auth: AuthSettings,
    static_forest: Vec<RouteNode>,
    provider: Arc<dyn IdentityProvider>,
    inner: Mutex<GuardInner>,
    nav_seq: AtomicU64,
}

impl NavigationGuard {
    pub fn new(
        auth: AuthSettings,
        static_forest: Vec<RouteNode>,
        provider: Arc<dyn IdentityProvider>,
        store: Box<dyn SessionStore>,
    ) -> Self {
        let session = SessionState::restore(store);
        let state = if session.is_authenticated() {
            GuardState::PendingRoutes
        } else {
            GuardState::Unauthenticated
        };
        Self {
            auth,
            static_forest,
            provider,
            inner: Mutex::new(GuardInner {
                state,
                session,
                routing: RoutingState::new(),
                table: RouteTable::new(),
            }),
            nav_seq: AtomicU64::new(0),
        }
    }

    /// Gate one navigation attempt from `from` to `to`. Never fails:
    /// every authorization problem resolves to an outcome locally.
    pub async fn navigate(&self, to: &str, from: Option<&str>) -> NavOutcome {
        let seq = self.nav_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let target_path = path_of(to);

        loop {
            let token = {
                let mut inner = self.inner.lock().unwrap();
                match inner.state {
                    GuardState::Unauthenticated => {
                        if self.is_public(target_path) {
                            return NavOutcome::Allow {
                                path: to.to_string(),
                                title: self.static_title(target_path),
                            };
                        }
                        return NavOutcome::Redirect {
                            to: self.login_redirect(to),
                        };
                    }
                    _ if target_path == self.auth.login_path => {
                        // Signed-in users have no business on the login page.
                        return NavOutcome::Redirect {
                            to: self.auth.landing_path.clone(),
                        };
                    }
                    GuardState::PendingRoutes => {
                        if let Some(identity) = inner.session.identity().cloned() {
                            let forest = filter_routes(
                                &self.static_forest,
                                &identity,
                                &self.auth.super_role,
                            );
                            inner.table.register(forest.clone());
                            inner.routing.materialize(forest);
                            inner.state = GuardState::Ready;
                            tracing::info!(
                                user = %identity.username,
                                roots = inner.routing.accessible.len(),
                                "accessible routes materialized"
                            );
                            // Re-dispatch the original navigation; the target
                            // may not have existed before registration.
                            continue;
                        }
                        match inner.session.credential() {
                            Some(token) => token.to_string(),
                            None => {
                                // No credential survived; force re-login.
                                Self::reset_locked(&mut inner);
                                return NavOutcome::Redirect {
                                    to: self.login_redirect(to),
                                };
                            }
                        }
                    }
                    GuardState::Ready => {
                        return self.authorize_locked(&mut inner, to, target_path, from);
                    }
                }
            };

            // Identity fetch, outside the lock so newer attempts can run.
            tracing::debug!(target = to, "fetching identity");
            match self.provider.fetch_identity(&token).await {
                Ok(identity) => {
                    let mut inner = self.inner.lock().unwrap();
                    if self.nav_seq.load(Ordering::SeqCst) != seq {
                        tracing::debug!(target = to, "navigation superseded during identity fetch");
                        return NavOutcome::Superseded;
                    }
                    inner.session.set_identity(identity);
                    // Loop back to materialize and re-dispatch.
                }
                Err(err) => {
                    let mut inner = self.inner.lock().unwrap();
                    if self.nav_seq.load(Ordering::SeqCst) != seq {
                        return NavOutcome::Superseded;
                    }
                    tracing::warn!(%err, "identity fetch failed, clearing session");
                    Self::reset_locked(&mut inner);
                    return NavOutcome::Redirect {
                        to: self.login_redirect(to),
                    };
                }
            }
        }
    }

    /// Ready-state authorization: resolve against the registered forest,
    /// then re-check the node against the live identity. The second check
    /// catches trees materialized for an identity that has since changed.
    fn authorize_locked(
        &self,
        inner: &mut GuardInner,
        to: &str,
        path: &str,
        from: Option<&str>,
    ) -> NavOutcome {
        let resolved = inner
            .table
            .resolve(path)
            .map(|node| (node.is_catch_all(), node.meta.clone()));

        let Some((catch_all, meta)) = resolved else {
            tracing::warn!(path, "no route matched the registered forest");
            return NavOutcome::Redirect {
                to: self.auth.not_found_path.clone(),
            };
        };

        if catch_all && path != self.auth.not_found_path {
            tracing::info!(path, "route not present in accessible forest");
            return NavOutcome::Redirect {
                to: self.auth.not_found_path.clone(),
            };
        }

        let Some(identity) = inner.session.identity() else {
            Self::reset_locked(inner);
            return NavOutcome::Redirect {
                to: self.login_redirect(to),
            };
        };

        if has_full_access(identity, &self.auth.super_role)
            || node_permitted(identity, &meta)
        {
            return NavOutcome::Allow {
                path: to.to_string(),
                title: meta.title,
            };
        }

        tracing::warn!(path, user = %identity.username, "navigation denied by live identity check");
        let back = from
            .filter(|f| !f.is_empty())
            .unwrap_or(&self.auth.landing_path)
            .to_string();
        NavOutcome::Denied {
            to: back,
            message: format!("You do not have permission to access {path}"),
        }
    }

    /// Exchange credentials for a session. Routing state resets so the
    /// forest is re-materialized for the new identity on first navigation.
    pub async fn login(&self, credentials: &Credentials) -> Result<Identity, NavError> {
        let authenticated = self.provider.authenticate(credentials).await?;
        // Invalidate navigations that were in flight for the old session.
        self.nav_seq.fetch_add(1, Ordering::SeqCst);

        let mut inner = self.inner.lock().unwrap();
        inner
            .session
            .establish(authenticated.token, authenticated.identity.clone());
        inner.routing.reset();
        inner.table.clear();
        inner.state = GuardState::PendingRoutes;
        tracing::info!(user = %authenticated.identity.username, "login established");
        Ok(authenticated.identity)
    }

    /// Clear session and routing state together and drop to
    /// `Unauthenticated`. The upstream token revocation is best-effort.
    pub async fn logout(&self) {
        let token = {
            let inner = self.inner.lock().unwrap();
            inner.session.credential().map(str::to_string)
        };
        if let Some(token) = token {
            if let Err(err) = self.provider.logout(&token).await {
                tracing::warn!(%err, "upstream logout failed");
            }
        }

        self.nav_seq.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        Self::reset_locked(&mut inner);
        tracing::info!("session cleared");
    }

    /// Would a navigation to `path` be allowed right now?
    pub fn authorize(&self, path: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        let path = path_of(path);
        match inner.state {
            GuardState::Unauthenticated => self.is_public(path),
            GuardState::PendingRoutes => false,
            GuardState::Ready => match inner.table.resolve(path) {
                Some(node) if !node.is_catch_all() => match inner.session.identity() {
                    Some(identity) => {
                        has_full_access(identity, &self.auth.super_role)
                            || node_permitted(identity, &node.meta)
                    }
                    None => false,
                },
                _ => self.is_public(path),
            },
        }
    }

    /// Look up a route in the accessible forest, e.g. for breadcrumbs.
    pub fn resolve_route(&self, path: &str) -> Result<RouteNode, NavError> {
        let inner = self.inner.lock().unwrap();
        match inner.table.resolve(path_of(path)) {
            Some(node) if !node.is_catch_all() => Ok(node.clone()),
            _ => Err(NavError::RouteNotFound {
                path: path.to_string(),
            }),
        }
    }

    pub fn state(&self) -> GuardState {
        self.inner.lock().unwrap().state
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().unwrap().session.is_authenticated()
    }

    pub fn is_materialized(&self) -> bool {
        self.inner.lock().unwrap().routing.materialized
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.lock().unwrap().session.identity().cloned()
    }

    /// Read-only copy of the accessible forest.
    pub fn accessible_forest(&self) -> Vec<RouteNode> {
        self.inner.lock().unwrap().routing.accessible.clone()
    }

    /// Menu entries for the current accessible forest; empty before
    /// materialization.
    pub fn menu(&self) -> Vec<MenuEntry> {
        menu_entries(&self.inner.lock().unwrap().routing.accessible)
    }

    pub fn landing_path(&self) -> &str {
        &self.auth.landing_path
    }

    fn reset_locked(inner: &mut GuardInner) {
        // Session and routing fall together; clearing one but not the
        // other leaves a stale-authenticated-looking tab.
        inner.session.clear();
        inner.routing.reset();
        inner.table.clear();
        inner.state = GuardState::Unauthenticated;
    }

    fn is_public(&self, path: &str) -> bool {
        self.auth.public_paths.iter().any(|p| p == path)
            || find_by_path(&self.static_forest, path)
                .map(|node| !node.meta.requires_auth)
                .unwrap_or(false)
    }

    fn static_title(&self, path: &str) -> Option<String> {
        find_by_path(&self.static_forest, path).and_then(|node| node.meta.title.clone())
    }

    fn login_redirect(&self, to: &str) -> String {
        format!(
            "{}?redirect={}",
            self.auth.login_path,
            urlencoding::encode(to)
        )
    }
}

#[cfg(test)]
impl NavigationGuard {
    /// Swap the live identity without re-materializing, to exercise the
    /// second authorization check against a stale forest.
    fn replace_identity_for_test(&self, identity: Identity) {
        self.inner.lock().unwrap().session.set_identity(identity);
    }
}

fn path_of(target: &str) -> &str {
    target.split('?').next().unwrap_or(target)
}
