//! Request classification for the bulk import client.
//!
//! A request is in import mode when its `User-Agent` mentions the import
//! client or when it carries a truthy `no_spend_data` query flag. The result
//! is computed once per request by the [`ImportMode`] guard and handed to the
//! metric lookups as a plain boolean, so nothing outlives the request.

use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};

/// Case-insensitive substring identifying the import client's user agent.
pub const IMPORT_USER_AGENT_TOKEN: &str = "metorik";

/// Query flag that forces import mode regardless of user agent.
pub const NO_SPEND_DATA_PARAM: &str = "no_spend_data";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportMode {
    suppress_derived_metrics: bool,
}

impl ImportMode {
    /// Classify a request from its user agent and raw `no_spend_data` value.
    pub fn detect(user_agent: Option<&str>, no_spend_data: Option<&str>) -> Self {
        let from_agent = user_agent
            .map(|agent| agent.to_lowercase().contains(IMPORT_USER_AGENT_TOKEN))
            .unwrap_or(false);
        let from_flag = no_spend_data.map(flag_is_set).unwrap_or(false);

        ImportMode {
            suppress_derived_metrics: from_agent || from_flag,
        }
    }

    pub fn from_request_parts(request: &Request<'_>) -> Self {
        let user_agent = request.headers().get_one("User-Agent");
        let no_spend_data = request
            .query_value::<&str>(NO_SPEND_DATA_PARAM)
            .and_then(|value| value.ok());
        Self::detect(user_agent, no_spend_data)
    }

    pub fn suppress_derived_metrics(self) -> bool {
        self.suppress_derived_metrics
    }
}

/// A flag is set unless it is empty or exactly `0`; `" 0"` counts as set.
fn flag_is_set(value: &str) -> bool {
    !value.is_empty() && value != "0"
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ImportMode {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ImportMode::from_request_parts(request))
    }
}

impl<'r> OpenApiFromRequest<'r> for ImportMode {
    fn from_request_input(
        _generator: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
