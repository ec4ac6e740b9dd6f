//! Derived customer metrics: lifetime spend and order count.
//!
//! Both values are cached in customer metadata and rebuilt from the
//! customer's orders on the first read that finds no cached value. Import
//! requests pass `suppress_derived_metrics = true`, which makes both keys
//! read as zero without touching the cache or the orders.

use crate::models::EntityId;
use crate::store::{CommerceStore, StoreResult};

/// Metadata key caching the customer's lifetime spend.
pub const MONEY_SPENT_KEY: &str = "_money_spent";
/// Metadata key caching the customer's order count.
pub const ORDER_COUNT_KEY: &str = "_order_count";

/// Metadata keys holding derived metrics.
pub const DERIVED_METRIC_KEYS: [&str; 2] = [MONEY_SPENT_KEY, ORDER_COUNT_KEY];

pub fn is_derived_metric(key: &str) -> bool {
    DERIVED_METRIC_KEYS.contains(&key)
}

/// Read one customer metadata value.
///
/// While suppressing, derived metric keys yield `"0"` whatever is stored;
/// every other key is read through unchanged.
pub async fn read_customer_meta(
    store: &dyn CommerceStore,
    customer: EntityId,
    key: &str,
    suppress_derived_metrics: bool,
) -> StoreResult<Option<String>> {
    if suppress_derived_metrics && is_derived_metric(key) {
        return Ok(Some("0".to_string()));
    }
    store.customer_meta(customer, key).await
}

/// Lifetime spend formatted with two decimals (`"12.50"`).
pub async fn total_spent(
    store: &dyn CommerceStore,
    customer: EntityId,
    suppress_derived_metrics: bool,
) -> StoreResult<String> {
    let cached = read_customer_meta(store, customer, MONEY_SPENT_KEY, suppress_derived_metrics)
        .await?
        .filter(|value| !value.trim().is_empty());

    if let Some(value) = cached {
        return Ok(format_decimal(&value));
    }

    let stats = store.customer_order_stats(customer).await?;
    let spent = format_cents(stats.money_spent_cents);
    store
        .set_customer_meta(customer, MONEY_SPENT_KEY, &spent)
        .await?;
    log::debug!("cached lifetime spend {} for customer {}", spent, customer);
    Ok(spent)
}

/// Number of non-trashed orders placed by the customer.
pub async fn order_count(
    store: &dyn CommerceStore,
    customer: EntityId,
    suppress_derived_metrics: bool,
) -> StoreResult<i64> {
    let cached = read_customer_meta(store, customer, ORDER_COUNT_KEY, suppress_derived_metrics)
        .await?
        .filter(|value| !value.trim().is_empty());

    if let Some(value) = cached {
        return Ok(value.trim().parse::<i64>().map(i64::abs).unwrap_or(0));
    }

    let stats = store.customer_order_stats(customer).await?;
    store
        .set_customer_meta(customer, ORDER_COUNT_KEY, &stats.order_count.to_string())
        .await?;
    log::debug!(
        "cached order count {} for customer {}",
        stats.order_count,
        customer
    );
    Ok(stats.order_count)
}

/// Recompute and cache both metrics, ignoring any cached value.
pub async fn warm(store: &dyn CommerceStore, customer: EntityId) -> StoreResult<()> {
    let stats = store.customer_order_stats(customer).await?;
    store
        .set_customer_meta(customer, MONEY_SPENT_KEY, &format_cents(stats.money_spent_cents))
        .await?;
    store
        .set_customer_meta(customer, ORDER_COUNT_KEY, &stats.order_count.to_string())
        .await?;
    Ok(())
}

/// Drop every cached derived metric so the next read recomputes it.
pub async fn reset(store: &dyn CommerceStore) -> StoreResult<u64> {
    let mut removed = 0;
    for key in DERIVED_METRIC_KEYS {
        removed += store.delete_customer_meta(key).await?;
    }
    Ok(removed)
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

/// Normalise a stored decimal string to two places; unparsable values read as zero.
fn format_decimal(value: &str) -> String {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .map(|amount| format!("{amount:.2}"))
        .unwrap_or_else(|| "0.00".to_string())
}
