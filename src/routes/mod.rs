/// Router Module Index
///
/// Routing split by access level. Access control is attached per module (see
/// `create_router`), so a new endpoint inherits the guard of the module it joins.

/// Routes open to anonymous viewers. Visibility is enforced by the handlers.
pub mod public;

/// Routes behind `auth_middleware`; anonymous requests are sent to the login page.
pub mod authenticated;

/// Staff-only routes, nested under `/admin`.
pub mod admin;
