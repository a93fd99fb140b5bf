//! Dashboard route guard.
//!
//! Decides whether a signed-in user may view a front-end path, and where to
//! send them otherwise. Paths outside `/dashboard/` only need a session.
//! Dashboard paths are checked in order and the first rule that fires wins.

use serde::Serialize;

use super::directory::Role;
use super::session::SessionUser;

const DASHBOARD_PREFIX: &str = "/dashboard/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum GuardDecision {
    Allow,
    Redirect { location: String },
}

impl GuardDecision {
    fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect { location: location.into() }
    }

    fn home_of(role: Role) -> Self {
        Self::redirect(format!("{DASHBOARD_PREFIX}{role}"))
    }
}

/// Apply the guard rules to `path` for `user`.
#[must_use]
pub fn authorize(user: Option<&SessionUser>, path: &str, allowed_roles: Option<&[Role]>) -> GuardDecision {
    let Some(user) = user else {
        return GuardDecision::redirect("/");
    };

    // Everything outside the dashboard only needs a session.
    if !path.contains(DASHBOARD_PREFIX) {
        return GuardDecision::Allow;
    }

    if let Some(requested) = dashboard_role_segment(path) {
        if requested != user.role.as_str() {
            return GuardDecision::home_of(user.role);
        }
    }

    if allowed_roles.is_some_and(|roles| !roles.contains(&user.role)) {
        return GuardDecision::home_of(user.role);
    }

    if user.role == Role::Parent && path.contains("/student/") && !path.contains(&user.id) {
        return GuardDecision::home_of(Role::Parent);
    }

    GuardDecision::Allow
}

/// First path segment after `/dashboard/`, if any.
fn dashboard_role_segment(path: &str) -> Option<&str> {
    let (_, rest) = path.split_once(DASHBOARD_PREFIX)?;
    rest.split(['/', '?', '#']).next().filter(|s| !s.is_empty())
}

/// Parse a comma-separated role list. Unknown names are dropped.
#[must_use]
pub fn parse_roles(raw: &str) -> Vec<Role> {
    raw.split(',').filter_map(Role::parse).collect()
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
