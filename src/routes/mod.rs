//! HTTP route handlers grouped by resource.
//!
//! Handlers are annotated with `#[openapi]` so `rocket_okapi` can derive the
//! OpenAPI document served next to them.

pub mod customers;
pub mod health;
pub mod orders;
pub mod pagination;
pub mod params;
