/// Router Module Index
///
/// Routes are split by who may reach them. Every request first passes the
/// `resolve_caller` middleware, which attaches a `CallerContext`; the split below only
/// documents intent, the actual checks live in each handler's call to the gate.

/// Anonymous, read-only routes backing the public pages.
pub mod public;

/// Routes that need a signed-in caller of any role.
pub mod authenticated;

/// The CMS admin API, nested under `/admin`. Each handler authorizes against the
/// permission table before touching storage.
pub mod admin;
