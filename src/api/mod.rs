//! HTTP surface: router, middleware, endpoint handlers and the shared
//! request context.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;
