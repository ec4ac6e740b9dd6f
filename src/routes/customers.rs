//! Customer endpoints.
//!
//! The id listing is always served. The paginated listing is only mounted
//! while an import is running, in which case it replaces the store's own
//! customers endpoint and renders derived metrics according to the
//! request's [`ImportMode`].

use chrono::{DateTime, Utc};
use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::customer_metrics;
use crate::error::ApiError;
use crate::import_mode::ImportMode;
use crate::models::{Customer, CustomerLinks, CustomerRecord, EntityKind, IdList, Link};
use crate::routes::pagination::{PageLinks, Paginated, RequestQuery};
use crate::routes::params::CustomerListParams;
use crate::store::{CommerceStore, SharedStore, StoreResult};
use crate::sync;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const AVATAR_SIZE: u32 = 96;

/// Ids of every customer holding the `customer` role.
#[openapi(tag = "Customers")]
#[get("/customers/ids")]
pub async fn list_customer_ids(store: &State<SharedStore>) -> Result<Json<IdList>, ApiError> {
    let ids = sync::list_all_ids(store.inner().as_ref(), EntityKind::Customer).await?;
    Ok(Json(ids))
}

/// Paginated customer records with `X-WP-Total`, `X-WP-TotalPages` and `Link` headers.
#[openapi(tag = "Customers")]
#[get("/customers?<params..>")]
pub async fn list_customers(
    params: CustomerListParams,
    mode: ImportMode,
    query: RequestQuery,
    store: &State<SharedStore>,
    config: &State<AppConfig>,
) -> Result<Paginated<CustomerRecord>, ApiError> {
    let customer_query = params.resolve()?;
    let store = store.inner().as_ref();
    let page = store.query_customers(&customer_query).await?;

    let mut items = Vec::with_capacity(page.customers.len());
    for customer in page.customers {
        items.push(prepare_customer(store, customer, mode.suppress_derived_metrics(), config).await?);
    }

    let links = PageLinks::compute(
        page.total,
        customer_query.limit,
        customer_query.offset,
        &config.api_url("customers"),
        &query,
    );

    Ok(Paginated { items, links })
}

async fn prepare_customer(
    store: &dyn CommerceStore,
    customer: Customer,
    suppress_derived_metrics: bool,
    config: &AppConfig,
) -> StoreResult<CustomerRecord> {
    let orders_count =
        customer_metrics::order_count(store, customer.id, suppress_derived_metrics).await?;
    let total_spent =
        customer_metrics::total_spent(store, customer.id, suppress_derived_metrics).await?;

    Ok(CustomerRecord {
        id: customer.id,
        date_created: format_date(customer.registered_at),
        date_modified: customer.last_update.map(format_date),
        avatar_url: avatar_url(&customer.email),
        links: CustomerLinks {
            self_link: vec![Link {
                href: config.api_url(&format!("customers/{}", customer.id)),
            }],
            collection: vec![Link {
                href: config.api_url("customers"),
            }],
        },
        email: customer.email,
        first_name: customer.first_name,
        last_name: customer.last_name,
        username: customer.username,
        orders_count,
        total_spent,
        billing: customer.billing.into(),
        shipping: customer.shipping.into(),
    })
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// Gravatar URL keyed by the SHA-256 of the normalised email.
pub fn avatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    let hash: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("https://secure.gravatar.com/avatar/{hash}?s={AVATAR_SIZE}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn avatar_hash_ignores_case_and_whitespace() {
        assert_eq!(avatar_url(" Ada@Example.com "), avatar_url("ada@example.com"));
        assert_eq!(
            avatar_url(""),
            "https://secure.gravatar.com/avatar/e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855?s=96"
        );
    }

    #[test]
    fn dates_render_without_offset() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_date(at), "2024-03-09T07:05:01");
    }
}
