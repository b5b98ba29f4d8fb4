//! The registered route table: the substrate navigations resolve against.
//!
//! Empty until the guard registers an accessible forest; reset together
//! with the rest of the routing state on logout.

use crate::nav::route::RouteNode;

#[derive(Default)]
pub struct RouteTable {
    forest: Vec<RouteNode>,
    registered: bool,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, forest: Vec<RouteNode>) {
        self.forest = forest;
        self.registered = true;
    }

    pub fn clear(&mut self) {
        self.forest.clear();
        self.registered = false;
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// First node (depth-first, pre-order) whose path pattern matches.
    /// `:param` segments match exactly one path segment; a trailing `*`
    /// segment matches any remainder, so the synthetic `/*` catch-all
    /// matches everything.
    pub fn resolve(&self, path: &str) -> Option<&RouteNode> {
        resolve_in(&self.forest, path)
    }
}

fn resolve_in<'a>(nodes: &'a [RouteNode], path: &str) -> Option<&'a RouteNode> {
    for node in nodes {
        if path_matches(&node.path, path) {
            return Some(node);
        }
        if let Some(found) = resolve_in(&node.children, path) {
            return Some(found);
        }
    }
    None
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segs = pattern.split('/').filter(|s| !s.is_empty());
    let mut path_segs = path.split('/').filter(|s| !s.is_empty());

    loop {
        match (pattern_segs.next(), path_segs.next()) {
            (Some("*"), _) => return true,
            (Some(p), Some(s)) => {
                if !p.starts_with(':') && p != s {
                    return false;
                }
            }
            (Some(_), None) => return false,
            (None, Some(_)) => return false,
            (None, None) => return true,
        }
    }
}
