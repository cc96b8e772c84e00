/// Router Module Index
///
/// Routes are grouped by who may reach them. The request gate runs in front of the
/// whole router and only acts on the configured protected prefixes, which is where
/// `pages` and `admin` live.

/// Routes reachable without a session: health, sign-in/sign-out, plan catalog.
pub mod public;

/// API routes that resolve the caller through the `SessionUser` extractor.
pub mod authenticated;

/// Gated pages under `/dashboard` and `/premium`.
pub mod pages;

/// Gated routes under `/admin`; handlers re-check the admin role.
pub mod admin;
