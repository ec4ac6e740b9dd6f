//! JSON bodies for requests that never reach a handler.

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Catcher, Request};

use crate::error::ErrorResponse;

#[catch(404)]
fn not_found(request: &Request<'_>) -> Json<ErrorResponse> {
    Json(ErrorResponse::new(
        "NotFound",
        format!("no route matches {}", request.uri().path()),
    ))
}

#[catch(422)]
fn unprocessable(request: &Request<'_>) -> Json<ErrorResponse> {
    log::debug!("rejected unparsable query on {}", request.uri());
    Json(ErrorResponse::new(
        "UnprocessableEntity",
        "one or more query parameters could not be parsed",
    ))
}

#[catch(default)]
fn fallback(status: Status, _request: &Request<'_>) -> (Status, Json<ErrorResponse>) {
    let reason = status.reason().unwrap_or("request failed");
    (status, Json(ErrorResponse::new("Error", reason)))
}

pub fn json_catchers() -> Vec<Catcher> {
    catchers![not_found, unprocessable, fallback]
}
