/// Router Module Index
///
/// Organizes the routing surface into one module per resource, mirroring the
/// versioned API layout (`/api/v1/<resource>`). Authentication and
/// authorization are not applied here as blanket layers: each handler declares
/// its own requirement through the extractor it takes (`ActiveUser`,
/// `Superuser`), so a route's guard is visible at its definition.

/// Login and token validation.
pub mod auth;

/// User administration plus the self-profile endpoint.
pub mod users;

/// Post CRUD with tag association and filtering.
pub mod posts;

/// Comment CRUD with the per-post listing filter.
pub mod comments;

/// Tag CRUD; reads are public, writes are superuser-only.
pub mod tags;
