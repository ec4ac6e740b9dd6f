//! Access to the customer and order data the helper endpoints read from.
//!
//! Route handlers and services only see the [`CommerceStore`] trait. The
//! PostgreSQL implementation backs the running service; the in-memory one
//! backs unit and route tests.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Customer, CustomerOrderStats, EntityId, OrderMetaRow, SyncRecord};
use crate::routes::params::{CustomerOrderBy, SortOrder};

pub use memory::MemoryStore;
pub use postgres::PgCommerceStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle managed as Rocket state.
pub type SharedStore = Arc<dyn CommerceStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Free-text restriction applied to a customer query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerSearch {
    /// Case-insensitive substring match on email, username and display name.
    Term(String),
    /// Exact case-insensitive match on the account email.
    Email(String),
}

/// Fully resolved customer listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerQuery {
    /// Required role; `None` lists every customer regardless of role.
    pub role: Option<String>,
    pub search: Option<CustomerSearch>,
    pub include: Vec<EntityId>,
    pub exclude: Vec<EntityId>,
    pub order_by: CustomerOrderBy,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            role: None,
            search: None,
            include: Vec::new(),
            exclude: Vec::new(),
            order_by: CustomerOrderBy::Name,
            order: SortOrder::Asc,
            limit: 10,
            offset: 0,
        }
    }
}

/// One page of customers plus the size of the unpaginated result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerPage {
    pub customers: Vec<Customer>,
    pub total: i64,
}

#[rocket::async_trait]
pub trait CommerceStore: Send + Sync {
    /// Every order id regardless of status, trashed orders included.
    async fn all_order_ids(&self) -> StoreResult<Vec<EntityId>>;

    /// Orders modified strictly after `cutoff` that are not trashed.
    async fn orders_modified_after(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<SyncRecord>>;

    /// Customers whose role set contains `role`.
    async fn customer_ids_with_role(&self, role: &str) -> StoreResult<Vec<EntityId>>;

    async fn query_customers(&self, query: &CustomerQuery) -> StoreResult<CustomerPage>;

    async fn customer_meta(&self, customer: EntityId, key: &str) -> StoreResult<Option<String>>;

    async fn set_customer_meta(&self, customer: EntityId, key: &str, value: &str)
    -> StoreResult<()>;

    /// Remove `key` from every customer, returning how many values were dropped.
    async fn delete_customer_meta(&self, key: &str) -> StoreResult<u64>;

    async fn customer_order_stats(&self, customer: EntityId) -> StoreResult<CustomerOrderStats>;

    /// Metadata rows of an order, or `None` when the order does not exist.
    async fn order_meta(&self, order: EntityId) -> StoreResult<Option<Vec<OrderMetaRow>>>;
}

/// Escape `%`, `_` and `\` so a user term is matched literally by `LIKE`.
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
