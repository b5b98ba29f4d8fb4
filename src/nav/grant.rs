//! Wildcard-capable grant matching.
//!
//! A grant is a `resource:action` token. `*` matches any value in its
//! position; `*:*` is the universal grant and matches everything,
//! including itself. Malformed tokens (no `:`, or an empty segment)
//! never match and never panic.

use crate::identity::Identity;

pub const UNIVERSAL_GRANT: &str = "*:*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Any,
    All,
}

fn split_grant(token: &str) -> Option<(&str, &str)> {
    let (resource, action) = token.split_once(':')?;
    if resource.is_empty() || action.is_empty() {
        return None;
    }
    Some((resource, action))
}

/// Does `held` satisfy `required`?
///
/// The universal grant on the held side satisfies anything; on the
/// required side it is satisfied only by the universal grant itself.
pub fn grant_satisfies(held: &str, required: &str) -> bool {
    if held == UNIVERSAL_GRANT {
        return true;
    }
    if required == UNIVERSAL_GRANT {
        // Only *:* satisfies a *:* requirement, and that case returned above.
        return false;
    }

    let Some((held_res, held_act)) = split_grant(held) else {
        tracing::trace!(token = held, "skipping malformed held grant");
        return false;
    };
    let Some((req_res, req_act)) = split_grant(required) else {
        tracing::trace!(token = required, "skipping malformed required grant");
        return false;
    };

    (held_res == req_res || held_res == "*" || req_res == "*")
        && (held_act == req_act || held_act == "*" || req_act == "*")
}

/// Check a set of required grants against the held set.
///
/// An empty required set means no requirement: always true.
pub fn any_satisfied(held: &[String], required: &[String], mode: MatchMode) -> bool {
    if required.is_empty() {
        return true;
    }

    match mode {
        MatchMode::Any => required
            .iter()
            .any(|req| held.iter().any(|h| grant_satisfies(h, req))),
        MatchMode::All => required
            .iter()
            .all(|req| held.iter().any(|h| grant_satisfies(h, req))),
    }
}

/// Role check: empty requirement passes, otherwise any intersection does.
pub fn role_satisfies(held: &[String], required: &[String]) -> bool {
    if required.is_empty() {
        return true;
    }
    held.iter().any(|role| required.contains(role))
}

/// Pure predicate for the view layer: should an element gated on
/// `required` grants be rendered for this identity?
pub fn can_render(identity: &Identity, required: &[String]) -> bool {
    any_satisfied(&identity.permissions, required, MatchMode::Any)
}
