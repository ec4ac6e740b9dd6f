use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};
use std::time::Instant;

use crate::import_mode::ImportMode;

/// Fairing to log one line per HTTP request with timing and import mode
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let start_time = request.local_cache(Instant::now);
        let duration = start_time.elapsed();
        let import_mode = ImportMode::from_request_parts(request);

        log::info!(
            "{} {} -> {} ({:.2}ms, import_mode={})",
            request.method(),
            request.uri(),
            response.status().code,
            duration.as_secs_f64() * 1000.0,
            import_mode.suppress_derived_metrics()
        );
    }
}
