use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum NavError {
    #[error("session expired or credential rejected")]
    #[diagnostic(
        code(gatehouse::nav::auth_expired),
        help("Log in again; the stored credential is no longer valid")
    )]
    AuthExpired,

    #[error("access denied for `{path}`")]
    #[diagnostic(code(gatehouse::nav::access_denied))]
    AccessDenied { path: String },

    #[error("identity fetch failed: {0}")]
    #[diagnostic(code(gatehouse::nav::identity_fetch))]
    IdentityFetchFailed(String),

    #[error("no route matches `{path}`")]
    #[diagnostic(code(gatehouse::nav::route_not_found))]
    RouteNotFound { path: String },

    #[error("failed to load route document `{path}`")]
    #[diagnostic(
        code(gatehouse::nav::route_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    RouteLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid route document: {0}")]
    #[diagnostic(
        code(gatehouse::nav::route_document),
        help("Each route node needs a path argument and a name property; children are `meta`, `permissions`, `roles`, or nested `route` nodes")
    )]
    RouteDocument(String),

    #[error("session store error: {0}")]
    #[diagnostic(code(gatehouse::nav::storage))]
    Storage(#[from] std::io::Error),
}

impl IntoResponse for NavError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            NavError::AuthExpired | NavError::IdentityFetchFailed(_) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            NavError::AccessDenied { .. } => (StatusCode::FORBIDDEN, self.to_string()),
            NavError::RouteNotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
