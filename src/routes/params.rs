//! Query parameter helpers shared by the API route handlers.
//!
//! These structs and enums provide strongly-typed parsing for URL query strings
//! while exposing the metadata needed for OpenAPI generation via `rocket_okapi`.
//! Values that cannot be parsed at all (an unknown `orderby`, a non-numeric
//! `page`) make Rocket reject the request with a 422; values that parse but are
//! out of range are rejected by the `resolve`/`window` helpers with a 400.

use rocket::form::{self, ValueField};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::EntityId;
use crate::store::{CustomerQuery, CustomerSearch};
use crate::sync::LookbackWindow;

const DEFAULT_PER_PAGE: i64 = 10;
const MAX_PER_PAGE: i64 = 100;

/// Role listed when the request does not name one.
pub const DEFAULT_CUSTOMER_ROLE: &str = "customer";

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Sort ascending.
    Asc,
    /// Sort descending.
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Asc
    }
}

impl SortOrder {
    /// Render the sort order as a SQL keyword.
    pub fn sql_keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl<'r> form::FromFormField<'r> for SortOrder {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        match field.value.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(form::Error::validation(format!(
                "invalid sort order '{other}'; expected 'asc' or 'desc'"
            ))
            .into()),
        }
    }
}

/// Sort keys supported by the customers listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CustomerOrderBy {
    Id,
    /// Position in the `include` list.
    Include,
    Name,
    RegisteredDate,
}

impl Default for CustomerOrderBy {
    fn default() -> Self {
        CustomerOrderBy::Name
    }
}

impl<'r> form::FromFormField<'r> for CustomerOrderBy {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        match field.value {
            "id" => Ok(CustomerOrderBy::Id),
            "include" => Ok(CustomerOrderBy::Include),
            "name" => Ok(CustomerOrderBy::Name),
            "registered_date" => Ok(CustomerOrderBy::RegisteredDate),
            other => Err(form::Error::validation(format!(
                "invalid orderby '{other}'; expected one of id, include, name, registered_date"
            ))
            .into()),
        }
    }
}

/// Comma-separated list of entity ids (`include=4,8,15`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct IdListParam(pub Vec<EntityId>);

impl<'r> form::FromFormField<'r> for IdListParam {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        let mut ids = Vec::new();
        for part in field.value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.parse::<i64>() {
                Ok(id) if id > 0 => ids.push(EntityId(id)),
                _ => {
                    return Err(form::Error::validation(format!(
                        "invalid id '{part}'; expected a positive integer"
                    ))
                    .into());
                }
            }
        }
        Ok(IdListParam(ids))
    }
}

/// Query parameters accepted by the orders-updated endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, rocket::form::FromForm, JsonSchema)]
pub struct UpdatedOrdersParams {
    /// Lookback window in days (defaults to 30, must not be negative).
    #[field(default = 30)]
    #[serde(default = "default_days")]
    pub days: i64,
}

const fn default_days() -> i64 {
    30
}

impl Default for UpdatedOrdersParams {
    fn default() -> Self {
        Self {
            days: default_days(),
        }
    }
}

impl UpdatedOrdersParams {
    pub fn window(&self) -> Result<LookbackWindow, ApiError> {
        LookbackWindow::from_days(self.days).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "invalid days '{}'; the lookback window cannot be negative",
                self.days
            ))
        })
    }
}

/// Query parameters supported by the customers listing.
#[derive(Debug, Clone, Serialize, Deserialize, rocket::form::FromForm, JsonSchema)]
pub struct CustomerListParams {
    /// One-based page index (defaults to 1).
    #[field(default = 1)]
    #[serde(default = "default_page")]
    pub page: i64,
    /// Page size between 1 and 100 (defaults to 10).
    #[field(default = 10)]
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    /// Explicit row offset; when positive it overrides the offset derived from `page`.
    #[field(default = 0)]
    #[serde(default)]
    pub offset: i64,
    /// Sort direction (defaults to `asc`).
    #[field(default = SortOrder::Asc)]
    #[serde(default)]
    pub order: SortOrder,
    /// Sort key (defaults to `name`).
    #[field(name = "orderby", default = CustomerOrderBy::Name)]
    #[serde(rename = "orderby", default)]
    pub order_by: CustomerOrderBy,
    /// Substring matched against email, username and display name.
    #[serde(default)]
    pub search: Option<String>,
    /// Exact email match; takes precedence over `search`.
    #[serde(default)]
    pub email: Option<String>,
    /// Role to filter by (defaults to `customer`, `all` disables the filter).
    #[serde(default)]
    pub role: Option<String>,
    /// Only list these customer ids.
    #[field(default = IdListParam(Vec::new()))]
    #[serde(default)]
    pub include: IdListParam,
    /// Never list these customer ids.
    #[field(default = IdListParam(Vec::new()))]
    #[serde(default)]
    pub exclude: IdListParam,
}

const fn default_page() -> i64 {
    1
}

const fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

impl Default for CustomerListParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
            offset: 0,
            order: SortOrder::Asc,
            order_by: CustomerOrderBy::Name,
            search: None,
            email: None,
            role: None,
            include: IdListParam::default(),
            exclude: IdListParam::default(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl CustomerListParams {
    /// Validate the parameters and turn them into a store query.
    pub fn resolve(&self) -> Result<CustomerQuery, ApiError> {
        if self.page < 1 {
            return Err(ApiError::BadRequest(format!(
                "invalid page '{}'; pages start at 1",
                self.page
            )));
        }

        if !(1..=MAX_PER_PAGE).contains(&self.per_page) {
            return Err(ApiError::BadRequest(format!(
                "invalid per_page '{}'; expected a value between 1 and {MAX_PER_PAGE}",
                self.per_page
            )));
        }

        let offset = match self.offset {
            offset if offset < 0 => {
                return Err(ApiError::BadRequest(format!(
                    "invalid offset '{offset}'; the offset cannot be negative"
                )));
            }
            0 => (self.page - 1).checked_mul(self.per_page).ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "invalid page '{}'; the derived offset is out of range",
                    self.page
                ))
            })?,
            offset => offset,
        };

        let search = match (non_empty(&self.email), non_empty(&self.search)) {
            (Some(email), _) => Some(CustomerSearch::Email(email.to_string())),
            (None, Some(term)) => Some(CustomerSearch::Term(term.to_string())),
            (None, None) => None,
        };

        let role = match non_empty(&self.role) {
            Some("all") => None,
            Some(role) => Some(role.to_string()),
            None => Some(DEFAULT_CUSTOMER_ROLE.to_string()),
        };

        Ok(CustomerQuery {
            role,
            search,
            include: self.include.0.clone(),
            exclude: self.exclude.0.clone(),
            order_by: self.order_by,
            order: self.order,
            limit: self.per_page,
            offset,
        })
    }
}
