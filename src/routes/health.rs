//! Lightweight service health endpoint used for readiness checks and tests.

use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    pub status: String,
    /// `import_override` when this service answers the customers listing.
    pub customers_endpoint: String,
}

#[openapi(tag = "Health")]
#[get("/health")]
pub fn health_check(config: &State<AppConfig>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        customers_endpoint: config.customers_endpoint.as_str().to_string(),
    })
}
