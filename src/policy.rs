//! Route policy table.
//!
//! Maps path patterns to the role predicate required to reach them. The request
//! gate and the `premium_access` flag served to clients both read this table, so
//! a tier's reach is defined exactly once.

use crate::models::Role;

/// Roles that unlock premium content.
pub const PREMIUM_ROLES: &[Role] = &[Role::Premium, Role::Vip, Role::Admin];

/// How a policy selects the paths it governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPattern {
    /// Matches when the path starts with the string.
    Prefix(&'static str),
    /// Matches when the string occurs anywhere in the path.
    Contains(&'static str),
}

impl PathPattern {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Prefix(prefix) => path.starts_with(prefix),
            PathPattern::Contains(needle) => path.contains(needle),
        }
    }
}

/// The role predicate a policy enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    Exactly(Role),
    AnyOf(&'static [Role]),
}

impl RoleRequirement {
    pub fn is_satisfied_by(&self, role: Role) -> bool {
        match self {
            RoleRequirement::Exactly(required) => role == *required,
            RoleRequirement::AnyOf(allowed) => allowed.contains(&role),
        }
    }
}

/// RoutePolicy
///
/// One row of the table: where it applies, who may pass and where everyone else
/// is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    pub name: &'static str,
    pub pattern: PathPattern,
    pub requirement: RoleRequirement,
    pub fallback: &'static str,
}

/// Evaluated in order; the first failing policy decides the redirect.
pub const ROUTE_POLICIES: &[RoutePolicy] = &[
    RoutePolicy {
        name: "admin",
        pattern: PathPattern::Prefix("/admin"),
        requirement: RoleRequirement::Exactly(Role::Admin),
        fallback: "/",
    },
    // Substring match: also catches paths such as `/exercises/premium-bac`.
    RoutePolicy {
        name: "premium",
        pattern: PathPattern::Contains("/premium"),
        requirement: RoleRequirement::AnyOf(PREMIUM_ROLES),
        fallback: "/subscription",
    },
];

/// Returns the first policy in `policies` that governs `path` and that `role` fails.
pub fn first_violation<'a>(
    policies: &'a [RoutePolicy],
    path: &str,
    role: Role,
) -> Option<&'a RoutePolicy> {
    policies
        .iter()
        .find(|policy| policy.pattern.matches(path) && !policy.requirement.is_satisfied_by(role))
}

/// Whether `role` may open `path` under the default table.
pub fn is_allowed(path: &str, role: Role) -> bool {
    first_violation(ROUTE_POLICIES, path, role).is_none()
}

/// Feature flag for clients: can this role open premium content?
pub fn has_premium_access(role: Role) -> bool {
    ROUTE_POLICIES
        .iter()
        .filter(|policy| policy.name == "premium")
        .all(|policy| policy.requirement.is_satisfied_by(role))
}

/// ProtectedPaths
///
/// The gate's matcher: the explicit allow-list of path prefixes that require a
/// session. Prefixes match whole segments, so `/dashboard` covers `/dashboard`
/// and `/dashboard/profile` but not `/dashboards`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPaths {
    prefixes: Vec<String>,
}

impl ProtectedPaths {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}
