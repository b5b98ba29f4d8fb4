//! Route document loading.
//!
//! Routes are authored in a KDL document, one top-level `route` node per
//! root of the forest. Example:
//!
//! ```kdl
//! route "/user" name="user" redirect="/user/list" {
//!     meta title="User Management" icon="ep:user"
//!     permissions {
//!         - "user:home"
//!     }
//!     roles {
//!         - "admin"
//!         - "superAdmin"
//!     }
//!     route "/user/list" name="user-list" view="user/UserList" {
//!         meta title="User List"
//!         permissions {
//!             - "user:view"
//!         }
//!     }
//! }
//! ```

use std::path::Path;

use kdl::KdlDocument;

use crate::nav::errors::NavError;
use crate::nav::route::{AccessMeta, RouteNode};

/// Read and parse a route document from disk.
pub fn load_routes(path: &Path) -> Result<Vec<RouteNode>, NavError> {
    let source = std::fs::read_to_string(path).map_err(|source| NavError::RouteLoad {
        path: path.display().to_string(),
        source,
    })?;
    let forest = parse_route_document(&source)?;
    tracing::info!(
        path = %path.display(),
        roots = forest.len(),
        "loaded route document"
    );
    Ok(forest)
}

/// Parse a KDL document string into the static route forest.
pub fn parse_route_document(source: &str) -> Result<Vec<RouteNode>, NavError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| NavError::RouteDocument(e.to_string()))?;

    let mut forest = Vec::new();
    for node in doc.nodes() {
        match node.name().value() {
            "route" => forest.push(parse_route(node)?),
            other => {
                // Ignore comments and unknown top-level nodes with a warning
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }
    Ok(forest)
}

fn parse_route(node: &kdl::KdlNode) -> Result<RouteNode, NavError> {
    let path = first_string_arg(node).ok_or_else(|| {
        NavError::RouteDocument(
            "route node requires a path argument (e.g. route \"/user\")".into(),
        )
    })?;
    if !path.starts_with('/') {
        return Err(NavError::RouteDocument(format!(
            "route path `{path}` must be absolute (start with `/`)"
        )));
    }

    let name = node
        .get("name")
        .and_then(|v| v.value().as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            NavError::RouteDocument(format!(
                "route `{path}` missing `name` property (e.g. name=\"user\")"
            ))
        })?;

    let mut route = RouteNode::new(path.clone(), name);
    route.view = node
        .get("view")
        .and_then(|v| v.value().as_string())
        .map(|s| s.to_string());
    route.redirect = node
        .get("redirect")
        .and_then(|v| v.value().as_string())
        .map(|s| s.to_string());

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "meta" => {
                    route.meta = parse_meta(child);
                }
                "permissions" => {
                    route.meta.permissions = dash_list(child);
                }
                "roles" => {
                    route.meta.roles = dash_list(child);
                }
                "route" => {
                    route.children.push(parse_route(child)?);
                }
                other => {
                    return Err(NavError::RouteDocument(format!(
                        "unexpected child `{other}` in route `{path}` (expected `meta`, `permissions`, `roles`, or nested `route`)"
                    )));
                }
            }
        }
    }

    Ok(route)
}

fn parse_meta(node: &kdl::KdlNode) -> AccessMeta {
    let mut meta = AccessMeta::default();
    if let Some(v) = node.get("requires-auth").and_then(|v| v.value().as_bool()) {
        meta.requires_auth = v;
    }
    if let Some(v) = node.get("hidden").and_then(|v| v.value().as_bool()) {
        meta.hidden = v;
    }
    if let Some(v) = node.get("affix").and_then(|v| v.value().as_bool()) {
        meta.affix = v;
    }
    meta.title = node
        .get("title")
        .and_then(|v| v.value().as_string())
        .map(|s| s.to_string());
    meta.icon = node
        .get("icon")
        .and_then(|v| v.value().as_string())
        .map(|s| s.to_string());
    meta.active_menu = node
        .get("active-menu")
        .and_then(|v| v.value().as_string())
        .map(|s| s.to_string());
    meta
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &kdl::KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// Extract dash-list children: nodes named "-" whose first argument is a string.
fn dash_list(node: &kdl::KdlNode) -> Vec<String> {
    let Some(children) = node.children() else {
        return Vec::new();
    };
    children
        .nodes()
        .iter()
        .filter(|n| n.name().value() == "-")
        .filter_map(|n| first_string_arg(n))
        .collect()
}
