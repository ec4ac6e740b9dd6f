//! Order metadata as exposed to the import client.
//!
//! Core order fields already travel in the regular order payload, so their
//! metadata keys are dropped here and only extension-owned keys remain.

use serde_json::Value;

use crate::models::{OrderMetaEntry, OrderMetaRow};

/// Metadata keys that mirror core order fields.
pub const CORE_ORDER_META_KEYS: &[&str] = &[
    "_customer_user",
    "_order_key",
    "_order_currency",
    "_billing_first_name",
    "_billing_last_name",
    "_billing_company",
    "_billing_address_1",
    "_billing_address_2",
    "_billing_city",
    "_billing_state",
    "_billing_postcode",
    "_billing_country",
    "_billing_email",
    "_billing_phone",
    "_shipping_first_name",
    "_shipping_last_name",
    "_shipping_company",
    "_shipping_address_1",
    "_shipping_address_2",
    "_shipping_city",
    "_shipping_state",
    "_shipping_postcode",
    "_shipping_country",
    "_completed_date",
    "_paid_date",
    "_edit_lock",
    "_edit_last",
    "_cart_discount",
    "_cart_discount_tax",
    "_order_shipping",
    "_order_shipping_tax",
    "_order_tax",
    "_order_total",
    "_payment_method",
    "_payment_method_title",
    "_transaction_id",
    "_customer_ip_address",
    "_customer_user_agent",
    "_created_via",
    "_order_version",
    "_prices_include_tax",
    "_date_completed",
    "_date_paid",
    "_payment_tokens",
    "_billing_address_index",
    "_shipping_address_index",
    "_recorded_sales",
    "_shipping_method",
];

pub fn is_core_key(key: &str) -> bool {
    CORE_ORDER_META_KEYS.contains(&key)
}

/// Decode a stored value: JSON objects and arrays are returned structured,
/// anything else stays a string.
pub fn decode_value(raw: &str) -> Value {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return value;
        }
    }
    Value::String(raw.to_string())
}

/// Drop core keys and decode the remaining rows, preserving store order.
pub fn visible_entries(rows: Vec<OrderMetaRow>) -> Vec<OrderMetaEntry> {
    rows.into_iter()
        .filter(|row| !is_core_key(&row.key))
        .map(|row| OrderMetaEntry {
            value: decode_value(&row.value),
            id: row.id,
            key: row.key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: i64, key: &str, value: &str) -> OrderMetaRow {
        OrderMetaRow {
            id,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn hides_core_keys() {
        let entries = visible_entries(vec![
            row(1, "_order_total", "10.00"),
            row(2, "_billing_email", "a@example.com"),
            row(3, "_wc_points_earned", "40"),
        ]);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 3);
        assert_eq!(entries[0].value, json!("40"));
    }

    #[test]
    fn decodes_structured_values_only() {
        assert_eq!(decode_value(r#"{"tier":"gold"}"#), json!({"tier": "gold"}));
        assert_eq!(decode_value("[1,2]"), json!([1, 2]));
        assert_eq!(decode_value("123"), json!("123"));
        assert_eq!(decode_value("{not json"), json!("{not json"));
    }
}
