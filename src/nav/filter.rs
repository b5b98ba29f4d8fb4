//! Pruning the static route forest against an identity.
//!
//! Depth-first, pre-order: a denied node takes its whole subtree with it,
//! regardless of what its children would allow on their own. Filtering
//! never touches the input; every surviving node is a new value.

use serde::Serialize;

use crate::identity::Identity;
use crate::nav::grant::{any_satisfied, role_satisfies, MatchMode, UNIVERSAL_GRANT};
use crate::nav::route::{AccessMeta, RouteNode, CATCH_ALL_PATH};

/// Holders of the super role or the universal grant skip filtering.
pub fn has_full_access(identity: &Identity, super_role: &str) -> bool {
    identity.roles.iter().any(|r| r == super_role)
        || identity.permissions.iter().any(|p| p == UNIVERSAL_GRANT)
}

/// Both dimensions must pass independently; there is no OR across them.
pub fn node_permitted(identity: &Identity, meta: &AccessMeta) -> bool {
    any_satisfied(&identity.permissions, &meta.permissions, MatchMode::Any)
        && role_satisfies(&identity.roles, &meta.roles)
}

/// Compute the accessible forest for an identity.
///
/// Returns a pruned copy of the static forest with a synthetic catch-all
/// appended as the last root sibling. Super-role / universal-grant
/// identities get the full forest back unfiltered.
pub fn filter_routes(
    forest: &[RouteNode],
    identity: &Identity,
    super_role: &str,
) -> Vec<RouteNode> {
    let mut accessible = if has_full_access(identity, super_role) {
        tracing::debug!(user = %identity.username, "full-access identity, skipping route filter");
        forest.to_vec()
    } else {
        filter_children(forest, identity)
    };
    accessible.push(not_found_route());
    accessible
}

fn filter_children(nodes: &[RouteNode], identity: &Identity) -> Vec<RouteNode> {
    let mut accessible = Vec::new();

    for node in nodes {
        if !node_permitted(identity, &node.meta) {
            tracing::debug!(path = %node.path, user = %identity.username, "route pruned");
            continue;
        }

        let mut kept = node.clone();
        if !node.children.is_empty() {
            kept.children = filter_children(&node.children, identity);
            // A pure redirect container whose declared destinations were all
            // denied is meaningless. Leaves that never declared children are
            // not containers and stay.
            if kept.children.is_empty() && kept.redirect.is_some() && kept.view.is_none() {
                tracing::debug!(path = %node.path, "redirect container collapsed, all children pruned");
                continue;
            }
        }
        accessible.push(kept);
    }

    accessible
}

/// The catch-all appended after every filtering pass. Matches any path no
/// other node claims and renders the not-found view.
pub fn not_found_route() -> RouteNode {
    let mut node = RouteNode::new(CATCH_ALL_PATH, "not-found");
    node.view = Some("NotFound".to_string());
    node.meta.requires_auth = false;
    node.meta.hidden = true;
    node.meta.title = Some("Not Found".to_string());
    node
}

/// One entry of the navigation menu.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuEntry {
    pub title: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuEntry>,
}

/// Project the accessible forest onto menu entries, dropping hidden nodes
/// (and their subtrees) and anything without a title. Sibling order is
/// preserved.
pub fn menu_entries(forest: &[RouteNode]) -> Vec<MenuEntry> {
    forest
        .iter()
        .filter(|node| !node.meta.hidden && !node.is_catch_all())
        .filter_map(|node| {
            node.meta.title.as_ref().map(|title| MenuEntry {
                title: title.clone(),
                path: node.path.clone(),
                icon: node.meta.icon.clone(),
                children: menu_entries(&node.children),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(path: &str, name: &str) -> RouteNode {
        RouteNode::new(path, name)
    }

    fn with_perms(mut n: RouteNode, perms: &[&str]) -> RouteNode {
        n.meta.permissions = perms.iter().map(|p| p.to_string()).collect();
        n
    }

    fn with_roles(mut n: RouteNode, roles: &[&str]) -> RouteNode {
        n.meta.roles = roles.iter().map(|r| r.to_string()).collect();
        n
    }

    /// Forest shaped like the admin console: dashboard, a user module
    /// gated on role + permission, and a hidden profile section.
    fn static_forest() -> Vec<RouteNode> {
        let mut home = with_perms(node("/", "layout"), &["Layout:view"]);
        home.redirect = Some("/dashboard".to_string());
        home.meta.title = Some("Home".to_string());
        let mut dashboard = with_perms(node("/dashboard", "dashboard"), &["Dashboard:view"]);
        dashboard.view = Some("Dashboard".to_string());
        dashboard.meta.title = Some("Dashboard".to_string());
        home.children.push(dashboard);

        let mut user = with_roles(
            with_perms(node("/user", "user"), &["user:home"]),
            &["admin", "superAdmin"],
        );
        user.redirect = Some("/user/list".to_string());
        user.meta.title = Some("User Management".to_string());
        let mut list = with_perms(node("/user/list", "user-list"), &["user:view"]);
        list.view = Some("user/UserList".to_string());
        list.meta.title = Some("User List".to_string());
        let mut create = with_perms(node("/user/create", "user-create"), &["user:create"]);
        create.view = Some("user/UserForm".to_string());
        create.meta.hidden = true;
        user.children.push(list);
        user.children.push(create);

        let mut profile = node("/profile", "profile");
        profile.view = Some("Profile".to_string());
        profile.meta.hidden = true;
        profile.meta.title = Some("Profile".to_string());

        vec![home, user, profile]
    }

    fn viewer() -> Identity {
        Identity::new(1, "viewer")
            .with_roles(&["admin"])
            .with_permissions(&["Layout:view", "Dashboard:view", "user:home", "user:view"])
    }

    fn collect_paths(forest: &[RouteNode]) -> Vec<String> {
        let mut out = Vec::new();
        for n in forest {
            out.push(n.path.clone());
            out.extend(collect_paths(&n.children));
        }
        out
    }

    #[test]
    fn test_filter_keeps_permitted_subtree() {
        let accessible = filter_routes(&static_forest(), &viewer(), "superAdmin");
        let paths = collect_paths(&accessible);
        assert!(paths.contains(&"/dashboard".to_string()));
        assert!(paths.contains(&"/user/list".to_string()));
        // user:create not held, the hidden create form is pruned
        assert!(!paths.contains(&"/user/create".to_string()));
        // open-access profile survives
        assert!(paths.contains(&"/profile".to_string()));
    }

    #[test]
    fn test_parent_denial_excludes_children() {
        // No admin role: /user is denied even though user:view would pass
        // on the child.
        let identity = Identity::new(2, "plain").with_permissions(&["user:home", "user:view"]);
        let accessible = filter_routes(&static_forest(), &identity, "superAdmin");
        let paths = collect_paths(&accessible);
        assert!(!paths.contains(&"/user".to_string()));
        assert!(!paths.contains(&"/user/list".to_string()));
    }

    #[test]
    fn test_any_mode_on_node_requirements() {
        // Node requires either of two grants; holding one is enough.
        let forest = vec![with_perms(node("/reports", "reports"), &[
            "report:view",
            "report:edit",
        ])];
        let identity = Identity::new(3, "half").with_permissions(&["report:view"]);
        let accessible = filter_routes(&forest, &identity, "superAdmin");
        assert_eq!(accessible[0].path, "/reports");
    }

    #[test]
    fn test_redirect_container_collapses_when_all_children_pruned() {
        let identity = Identity::new(4, "n").with_permissions(&["Layout:view"]);
        // Layout:view passes the root, but Dashboard:view is missing, so
        // the redirect-only container loses its sole child and is dropped.
        let accessible = filter_routes(&static_forest(), &identity, "superAdmin");
        let paths = collect_paths(&accessible);
        assert!(!paths.contains(&"/".to_string()));
        assert!(!paths.contains(&"/dashboard".to_string()));
    }

    #[test]
    fn test_childless_leaf_with_redirect_is_not_collapsed() {
        // Declared no children in the static tree: the collapse rule must
        // not treat it as an emptied container.
        let mut leaf = node("/external", "external");
        leaf.redirect = Some("/somewhere".to_string());
        let accessible = filter_routes(&[leaf], &Identity::new(5, "any"), "superAdmin");
        assert_eq!(accessible[0].path, "/external");
    }

    #[test]
    fn test_super_role_bypasses_filtering() {
        let root = Identity::new(6, "root").with_roles(&["superAdmin"]);
        let forest = static_forest();
        let accessible = filter_routes(&forest, &root, "superAdmin");
        // Full forest back, plus the catch-all at the end.
        assert_eq!(accessible.len(), forest.len() + 1);
        assert_eq!(accessible[..forest.len()], forest[..]);
        assert!(accessible.last().unwrap().is_catch_all());
    }

    #[test]
    fn test_universal_grant_bypasses_filtering() {
        let root = Identity::new(7, "wild").with_permissions(&["*:*"]);
        let forest = static_forest();
        let accessible = filter_routes(&forest, &root, "superAdmin");
        assert_eq!(accessible.len(), forest.len() + 1);
    }

    #[test]
    fn test_catch_all_always_appended_last() {
        let empty_identity = Identity::new(8, "nobody");
        let accessible = filter_routes(&static_forest(), &empty_identity, "superAdmin");
        assert!(accessible.last().unwrap().is_catch_all());
    }

    #[test]
    fn test_filter_is_idempotent_and_preserves_order() {
        let forest = static_forest();
        let a = filter_routes(&forest, &viewer(), "superAdmin");
        let b = filter_routes(&forest, &viewer(), "superAdmin");
        assert_eq!(a, b);

        // Sibling order of the input is preserved.
        let paths = collect_paths(&a);
        let home_idx = paths.iter().position(|p| p == "/dashboard").unwrap();
        let user_idx = paths.iter().position(|p| p == "/user").unwrap();
        assert!(home_idx < user_idx);
    }

    #[test]
    fn test_monotonicity_of_grants() {
        let small = Identity::new(9, "small")
            .with_roles(&["admin"])
            .with_permissions(&["user:home", "user:view"]);
        let big = Identity::new(10, "big")
            .with_roles(&["admin"])
            .with_permissions(&["user:home", "user:view", "Layout:view", "Dashboard:view"]);

        let forest = static_forest();
        let small_paths = collect_paths(&filter_routes(&forest, &small, "superAdmin"));
        let big_paths = collect_paths(&filter_routes(&forest, &big, "superAdmin"));
        for p in &small_paths {
            assert!(big_paths.contains(p), "superset identity lost path {p}");
        }
    }

    #[test]
    fn test_input_forest_untouched() {
        let forest = static_forest();
        let before = forest.clone();
        let _ = filter_routes(&forest, &viewer(), "superAdmin");
        assert_eq!(forest, before);
    }

    #[test]
    fn test_menu_entries_hide_hidden_and_catch_all() {
        let accessible = filter_routes(&static_forest(), &viewer(), "superAdmin");
        let menu = menu_entries(&accessible);

        let titles: Vec<&str> = menu.iter().map(|m| m.title.as_str()).collect();
        assert!(titles.contains(&"Home"));
        assert!(titles.contains(&"User Management"));
        // hidden profile and the synthetic catch-all never show up
        assert!(!titles.contains(&"Profile"));
        assert!(!titles.contains(&"Not Found"));

        let user = menu.iter().find(|m| m.title == "User Management").unwrap();
        assert_eq!(user.children.len(), 1);
        assert_eq!(user.children[0].title, "User List");
    }
}
