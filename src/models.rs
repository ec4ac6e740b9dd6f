use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ===== Identifiers =====

/// Opaque store identifier of a customer or an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl EntityId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which entity family a bulk identifier listing targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Customer,
    Order,
}

// ===== Order Statuses =====

/// Order lifecycle states known to the store.
///
/// `Trash` is the soft-delete state: it is stored like any other status but
/// never reported as a registered status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum OrderStatus {
    #[serde(rename = "wc-pending")]
    Pending,
    #[serde(rename = "wc-processing")]
    Processing,
    #[serde(rename = "wc-on-hold")]
    OnHold,
    #[serde(rename = "wc-completed")]
    Completed,
    #[serde(rename = "wc-cancelled")]
    Cancelled,
    #[serde(rename = "wc-refunded")]
    Refunded,
    #[serde(rename = "wc-failed")]
    Failed,
    #[serde(rename = "trash")]
    Trash,
}

impl OrderStatus {
    /// Statuses exposed by the statuses endpoint, in display order.
    pub const REGISTERED: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::OnHold,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Failed,
    ];

    /// Statuses whose totals count toward a customer's lifetime spend.
    pub const PAID: [OrderStatus; 2] = [OrderStatus::Processing, OrderStatus::Completed];

    pub fn code(self) -> &'static str {
        match self {
            OrderStatus::Pending => "wc-pending",
            OrderStatus::Processing => "wc-processing",
            OrderStatus::OnHold => "wc-on-hold",
            OrderStatus::Completed => "wc-completed",
            OrderStatus::Cancelled => "wc-cancelled",
            OrderStatus::Refunded => "wc-refunded",
            OrderStatus::Failed => "wc-failed",
            OrderStatus::Trash => "trash",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending payment",
            OrderStatus::Processing => "Processing",
            OrderStatus::OnHold => "On hold",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
            OrderStatus::Failed => "Failed",
            OrderStatus::Trash => "Trash",
        }
    }

    pub fn is_registered(self) -> bool {
        self != OrderStatus::Trash
    }

    pub fn is_paid(self) -> bool {
        Self::PAID.contains(&self)
    }
}

// ===== Sync and Listing Responses =====

/// One changed order as reported to a polling client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncRecord {
    pub id: EntityId,
    /// Last modification time as Unix seconds (UTC).
    pub last_updated: i64,
}

/// Complete identifier listing for one entity family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IdList {
    pub count: usize,
    pub ids: Vec<EntityId>,
}

impl IdList {
    pub fn new(ids: Vec<EntityId>) -> Self {
        Self {
            count: ids.len(),
            ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdatedOrdersResponse {
    pub orders: Vec<SyncRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrderStatusesResponse {
    /// Status code mapped to its human readable label.
    pub statuses: BTreeMap<String, String>,
}

impl OrderStatusesResponse {
    pub fn registered() -> Self {
        Self {
            statuses: OrderStatus::REGISTERED
                .into_iter()
                .map(|status| (status.code().to_string(), status.label().to_string()))
                .collect(),
        }
    }
}

/// Raw order metadata row as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderMetaRow {
    pub id: i64,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OrderMetaEntry {
    pub id: i64,
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrderMetaResponse {
    pub meta_data: Vec<OrderMetaEntry>,
}

// ===== Customer Models =====

/// Postal address attached to a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub email: String,
    pub phone: String,
}

/// Customer as loaded from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub registered_at: DateTime<Utc>,
    pub last_update: Option<DateTime<Utc>>,
    pub billing: Address,
    pub shipping: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BillingAddress {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub email: String,
    pub phone: String,
}

impl From<Address> for BillingAddress {
    fn from(address: Address) -> Self {
        Self {
            first_name: address.first_name,
            last_name: address.last_name,
            company: address.company,
            address_1: address.address_1,
            address_2: address.address_2,
            city: address.city,
            state: address.state,
            postcode: address.postcode,
            country: address.country,
            email: address.email,
            phone: address.phone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
}

impl From<Address> for ShippingAddress {
    fn from(address: Address) -> Self {
        Self {
            first_name: address.first_name,
            last_name: address.last_name,
            company: address.company,
            address_1: address.address_1,
            address_2: address.address_2,
            city: address.city,
            state: address.state,
            postcode: address.postcode,
            country: address.country,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerLinks {
    #[serde(rename = "self")]
    pub self_link: Vec<Link>,
    pub collection: Vec<Link>,
}

/// Customer record returned by the customers listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerRecord {
    pub id: EntityId,
    pub date_created: String,
    pub date_modified: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub orders_count: i64,
    pub total_spent: String,
    pub avatar_url: String,
    pub billing: BillingAddress,
    pub shipping: ShippingAddress,
    #[serde(rename = "_links")]
    pub links: CustomerLinks,
}

/// Aggregates over a customer's orders used to rebuild derived metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerOrderStats {
    /// Orders in any registered (non-trashed) status.
    pub order_count: i64,
    /// Sum of totals, in cents, over orders in a paid status.
    pub money_spent_cents: i64,
}
