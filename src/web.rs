//! HTTP surface for the navigation engine.
//!
//! The console shell calls these endpoints instead of embedding the guard:
//! `/navigate` before every client-side transition, `/menu` to draw the
//! sidebar, `/session` on boot. Transport stays thin; every decision is
//! made by the guard.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::identity::Credentials;
use crate::nav::errors::NavError;
use crate::nav::guard::NavigationGuard;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub guard: Arc<NavigationGuard>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session))
        .route("/menu", get(menu))
        .route("/navigate", get(navigate))
        .route("/authorize", get(authorize))
        .route("/resolve", get(resolve))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(settings: Settings, guard: Arc<NavigationGuard>) -> miette::Result<()> {
    let addr = settings.bind_addr();
    let state = AppState {
        settings: Arc::new(settings),
        guard,
    };
    let app = router(state);

    tracing::info!(%addr, "gatehouse listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(crate::errors::GateError::Io)?;
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::errors::GateError::Other(e.to_string()))?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
    /// Return path carried over from `/login?redirect=...`.
    #[serde(default)]
    redirect: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, NavError> {
    let identity = state
        .guard
        .login(&Credentials {
            username: req.username,
            password: req.password,
        })
        .await?;

    let redirect = req
        .redirect
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| state.guard.landing_path().to_string());

    Ok(Json(json!({
        "identity": identity,
        "redirect": redirect,
    })))
}

async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    state.guard.logout().await;
    StatusCode::NO_CONTENT
}

async fn session(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "authenticated": state.guard.is_authenticated(),
        "identity": state.guard.current_identity(),
        "landing": state.settings.auth.landing_path,
    }))
}

async fn menu(State(state): State<AppState>) -> Result<impl IntoResponse, NavError> {
    if !state.guard.is_authenticated() {
        return Err(NavError::AuthExpired);
    }
    Ok(Json(state.guard.menu()))
}

#[derive(Debug, Deserialize)]
struct NavigateQuery {
    to: String,
    #[serde(default)]
    from: Option<String>,
}

async fn navigate(
    State(state): State<AppState>,
    Query(query): Query<NavigateQuery>,
) -> impl IntoResponse {
    let outcome = state
        .guard
        .navigate(&query.to, query.from.as_deref())
        .await;
    Json(outcome)
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    path: String,
}

async fn authorize(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> impl IntoResponse {
    Json(json!({ "allowed": state.guard.authorize(&query.path) }))
}

async fn resolve(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<impl IntoResponse, NavError> {
    let node = state.guard.resolve_route(&query.path)?;
    Ok(Json(node))
}
