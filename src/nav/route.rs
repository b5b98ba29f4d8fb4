//! The static route descriptor tree.
//!
//! Nodes are authored declaratively (see `loader`), never mutated at
//! runtime: filtering always produces new nodes.

use serde::{Deserialize, Serialize};

/// Path of the synthetic catch-all appended after filtering.
pub const CATCH_ALL_PATH: &str = "/*";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    /// Absolute path, e.g. `/user/list` or `/user/edit/:id`.
    pub path: String,
    /// Unique route name.
    pub name: String,
    /// View the node renders, if it renders one itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    /// Where a container node forwards to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default)]
    pub meta: AccessMeta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RouteNode>,
}

/// Access requirements plus display hints carried by every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessMeta {
    #[serde(default = "default_true")]
    pub requires_auth: bool,
    /// Required grants, ANY-mode. Empty = open.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Required roles, intersection. Empty = open.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Hidden from the navigation menu.
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Pinned as a permanent tab.
    #[serde(default)]
    pub affix: bool,
    /// Menu entry to highlight when this (usually hidden) route is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_menu: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for AccessMeta {
    fn default() -> Self {
        Self {
            requires_auth: true,
            permissions: Vec::new(),
            roles: Vec::new(),
            hidden: false,
            title: None,
            icon: None,
            affix: false,
            active_menu: None,
        }
    }
}

impl RouteNode {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            view: None,
            redirect: None,
            meta: AccessMeta::default(),
            children: Vec::new(),
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.path == CATCH_ALL_PATH
    }
}

/// Exact-path lookup over a forest, depth-first. Used for static-tree
/// questions (public flags, titles); pattern matching lives in `table`.
pub fn find_by_path<'a>(forest: &'a [RouteNode], path: &str) -> Option<&'a RouteNode> {
    for node in forest {
        if node.path == path {
            return Some(node);
        }
        if let Some(found) = find_by_path(&node.children, path) {
            return Some(found);
        }
    }
    None
}
