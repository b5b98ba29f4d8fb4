//! End-to-end navigation flow: boot, login, materialization, menu,
//! per-navigation gating, logout, and session resume across restarts.

use std::sync::Arc;

use gatehouse::identity::{Credentials, Identity, StaticIdentityProvider};
use gatehouse::nav::guard::{GuardState, NavOutcome, NavigationGuard};
use gatehouse::nav::loader::parse_route_document;
use gatehouse::nav::route::RouteNode;
use gatehouse::nav::session::FileSessionStore;
use gatehouse::settings::AuthSettings;

const ROUTES: &str = r#"
route "/login" name="login" view="Login" {
    meta title="Sign In" hidden=true requires-auth=false
}

route "/" name="layout" redirect="/dashboard" {
    meta title="Home"
    permissions {
        - "Layout:view"
    }
    route "/dashboard" name="dashboard" view="Dashboard" {
        meta title="Dashboard" icon="ep:data-board"
        permissions {
            - "Dashboard:view"
        }
    }
}

route "/user" name="user" redirect="/user/list" {
    meta title="User Management" icon="ep:user"
    permissions {
        - "user:home"
    }
    roles {
        - "admin"
        - "superAdmin"
    }
    route "/user/list" name="user-list" view="user/UserList" {
        meta title="User List"
        permissions {
            - "user:view"
        }
    }
    route "/user/edit/:id" name="user-edit" view="user/UserForm" {
        meta title="Edit User" hidden=true
        permissions {
            - "user:edit"
        }
    }
}

route "/system" name="system" redirect="/system/config" {
    meta title="System" icon="ep:setting"
    roles {
        - "superAdmin"
    }
    route "/system/config" name="system-config" view="system/SystemConfig" {
        meta title="Configuration"
        permissions {
            - "system:config"
        }
    }
}
"#;

fn forest() -> Vec<RouteNode> {
    parse_route_document(ROUTES).expect("route document parses")
}

fn provider() -> Arc<StaticIdentityProvider> {
    Arc::new(
        StaticIdentityProvider::new()
            .with_user(
                "admin-pw",
                Identity::new(1, "admin")
                    .with_roles(&["admin"])
                    .with_permissions(&[
                        "Layout:view",
                        "Dashboard:view",
                        "user:home",
                        "user:view",
                        "user:edit",
                    ]),
            )
            .with_user(
                "root-pw",
                Identity::new(2, "root").with_roles(&["superAdmin"]),
            ),
    )
}

fn guard_at(path: &std::path::Path) -> NavigationGuard {
    NavigationGuard::new(
        AuthSettings::default(),
        forest(),
        provider(),
        Box::new(FileSessionStore::new(path.to_path_buf())),
    )
}

async fn login(guard: &NavigationGuard, username: &str, password: &str) -> Identity {
    guard
        .login(&Credentials {
            username: username.into(),
            password: password.into(),
        })
        .await
        .expect("login succeeds")
}

#[tokio::test]
async fn admin_walks_the_console() {
    let dir = tempfile::TempDir::new().unwrap();
    let guard = guard_at(&dir.path().join("session.json"));

    // Cold tab: everything but the whitelist bounces to login.
    assert_eq!(guard.state(), GuardState::Unauthenticated);
    assert_eq!(
        guard.navigate("/user/list", None).await,
        NavOutcome::Redirect {
            to: "/login?redirect=%2Fuser%2Flist".into()
        }
    );

    let identity = login(&guard, "admin", "admin-pw").await;
    assert_eq!(identity.username, "admin");
    assert_eq!(guard.state(), GuardState::PendingRoutes);

    // First navigation materializes and replays to the original target.
    let outcome = guard.navigate("/user/list", None).await;
    assert_eq!(
        outcome,
        NavOutcome::Allow {
            path: "/user/list".into(),
            title: Some("User List".into()),
        }
    );
    assert_eq!(guard.state(), GuardState::Ready);

    // Param routes resolve.
    assert!(matches!(
        guard.navigate("/user/edit/42", Some("/user/list")).await,
        NavOutcome::Allow { .. }
    ));

    // The superAdmin-only system section was pruned.
    assert_eq!(
        guard.navigate("/system/config", None).await,
        NavOutcome::Redirect { to: "/404".into() }
    );
    assert!(!guard.authorize("/system/config"));

    // Menu shows the visible accessible sections only.
    let menu = guard.menu();
    let titles: Vec<&str> = menu.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["Home", "User Management"]);
    let user = &menu[1];
    assert_eq!(user.children.len(), 1);
    assert_eq!(user.children[0].title, "User List");

    // Login page bounces authenticated users to the landing location.
    assert_eq!(
        guard.navigate("/login", None).await,
        NavOutcome::Redirect {
            to: "/dashboard".into()
        }
    );

    guard.logout().await;
    assert_eq!(guard.state(), GuardState::Unauthenticated);
    assert!(guard.menu().is_empty());
}

#[tokio::test]
async fn super_admin_sees_everything() {
    let dir = tempfile::TempDir::new().unwrap();
    let guard = guard_at(&dir.path().join("session.json"));

    login(&guard, "root", "root-pw").await;
    let outcome = guard.navigate("/system/config", None).await;
    assert!(matches!(outcome, NavOutcome::Allow { .. }));

    // Bypass returns the full static forest plus the catch-all.
    let accessible = guard.accessible_forest();
    assert_eq!(accessible.len(), forest().len() + 1);
    assert!(accessible.last().unwrap().is_catch_all());
}

#[tokio::test]
async fn session_resumes_after_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let mirror = dir.path().join("session.json");

    {
        let guard = guard_at(&mirror);
        login(&guard, "admin", "admin-pw").await;
        guard.navigate("/dashboard", None).await;
    }

    // A new guard over the same mirror starts authenticated but with the
    // forest not yet materialized.
    let resumed = guard_at(&mirror);
    assert_eq!(resumed.state(), GuardState::PendingRoutes);
    assert!(!resumed.is_materialized());

    let outcome = resumed.navigate("/dashboard", None).await;
    assert!(matches!(outcome, NavOutcome::Allow { .. }));
    assert!(resumed.is_materialized());
}

#[tokio::test]
async fn revoked_credential_forces_relogin_on_resume() {
    let dir = tempfile::TempDir::new().unwrap();
    let mirror = dir.path().join("session.json");
    let shared_provider = provider();

    {
        let guard = NavigationGuard::new(
            AuthSettings::default(),
            forest(),
            shared_provider.clone(),
            Box::new(FileSessionStore::new(mirror.clone())),
        );
        login(&guard, "admin", "admin-pw").await;
    }

    // Upstream drops every token while the tab is closed. The resumed
    // session still carries the mirrored identity, so wipe that too to
    // force a fetch.
    shared_provider.revoke_all();
    let session: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&mirror).unwrap()).unwrap();
    let credential = session["credential"].as_str().unwrap().to_string();
    std::fs::write(
        &mirror,
        serde_json::json!({ "credential": credential }).to_string(),
    )
    .unwrap();

    let resumed = NavigationGuard::new(
        AuthSettings::default(),
        forest(),
        shared_provider,
        Box::new(FileSessionStore::new(mirror.clone())),
    );
    assert_eq!(resumed.state(), GuardState::PendingRoutes);

    let outcome = resumed.navigate("/dashboard", None).await;
    assert_eq!(
        outcome,
        NavOutcome::Redirect {
            to: "/login?redirect=%2Fdashboard".into()
        }
    );
    assert_eq!(resumed.state(), GuardState::Unauthenticated);
    assert!(!mirror.exists(), "failed fetch must clear the mirror");
}
