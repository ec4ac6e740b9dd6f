//! In-memory [`CommerceStore`] used by tests and local fixtures.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{
    CommerceStore, CustomerPage, CustomerQuery, CustomerSearch, StoreError, StoreResult,
};
use crate::models::{
    Customer, CustomerOrderStats, EntityId, OrderMetaRow, OrderStatus, SyncRecord,
};
use crate::routes::params::{CustomerOrderBy, SortOrder};

#[derive(Debug, Clone)]
struct CustomerEntry {
    customer: Customer,
    roles: BTreeSet<String>,
    meta: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct OrderEntry {
    customer: Option<EntityId>,
    status: OrderStatus,
    total_cents: i64,
    modified_at: DateTime<Utc>,
    meta: Vec<OrderMetaRow>,
}

/// Order to be inserted into a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: EntityId,
    pub customer: Option<EntityId>,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    customers: BTreeMap<EntityId, CustomerEntry>,
    orders: BTreeMap<EntityId, OrderEntry>,
    next_meta_id: i64,
    outage: Option<String>,
    meta_reads: u64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_customer(&self, customer: Customer, roles: &[&str]) {
        let mut state = self.state.write();
        state.customers.insert(
            customer.id,
            CustomerEntry {
                customer,
                roles: roles.iter().map(|role| role.to_string()).collect(),
                meta: HashMap::new(),
            },
        );
    }

    pub fn insert_order(&self, order: NewOrder) {
        let mut state = self.state.write();
        state.orders.insert(
            order.id,
            OrderEntry {
                customer: order.customer,
                status: order.status,
                total_cents: order.total_cents,
                modified_at: order.modified_at,
                meta: Vec::new(),
            },
        );
    }

    /// Attach a metadata row to an existing order. Returns `false` when the
    /// order is unknown.
    pub fn add_order_meta(&self, order: EntityId, key: &str, value: &str) -> bool {
        let mut state = self.state.write();
        state.next_meta_id += 1;
        let id = state.next_meta_id;
        match state.orders.get_mut(&order) {
            Some(entry) => {
                entry.meta.push(OrderMetaRow {
                    id,
                    key: key.to_string(),
                    value: value.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Make every subsequent query fail until [`MemoryStore::restore`] is called.
    pub fn simulate_outage(&self, reason: &str) {
        self.state.write().outage = Some(reason.to_string());
    }

    pub fn restore(&self) {
        self.state.write().outage = None;
    }

    /// Number of customer metadata reads served so far.
    pub fn meta_reads(&self) -> u64 {
        self.state.read().meta_reads
    }

    fn check_available(state: &MemoryState) -> StoreResult<()> {
        match &state.outage {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

fn matches_query(entry: &CustomerEntry, query: &CustomerQuery) -> bool {
    let customer = &entry.customer;

    if let Some(role) = &query.role {
        if !entry.roles.contains(role) {
            return false;
        }
    }

    if !query.include.is_empty() && !query.include.contains(&customer.id) {
        return false;
    }

    if query.exclude.contains(&customer.id) {
        return false;
    }

    match &query.search {
        Some(CustomerSearch::Term(term)) => {
            let needle = term.to_lowercase();
            [&customer.email, &customer.username, &customer.display_name]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        }
        Some(CustomerSearch::Email(email)) => customer.email.to_lowercase() == email.to_lowercase(),
        None => true,
    }
}

fn compare_customers(a: &Customer, b: &Customer, query: &CustomerQuery) -> Ordering {
    let position = |id: EntityId| query.include.iter().position(|included| *included == id);

    let primary = match query.order_by {
        CustomerOrderBy::Include if !query.include.is_empty() => position(a.id).cmp(&position(b.id)),
        CustomerOrderBy::Include | CustomerOrderBy::Id => a.id.cmp(&b.id),
        CustomerOrderBy::Name => a.display_name.cmp(&b.display_name),
        CustomerOrderBy::RegisteredDate => a.registered_at.cmp(&b.registered_at),
    };

    let primary = match query.order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };

    primary.then_with(|| a.id.cmp(&b.id))
}

#[rocket::async_trait]
impl CommerceStore for MemoryStore {
    async fn all_order_ids(&self) -> StoreResult<Vec<EntityId>> {
        let state = self.state.read();
        Self::check_available(&state)?;
        Ok(state.orders.keys().copied().collect())
    }

    async fn orders_modified_after(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<SyncRecord>> {
        let state = self.state.read();
        Self::check_available(&state)?;
        Ok(state
            .orders
            .iter()
            .filter(|(_, order)| order.modified_at > cutoff && order.status != OrderStatus::Trash)
            .map(|(id, order)| SyncRecord {
                id: *id,
                last_updated: order.modified_at.timestamp(),
            })
            .collect())
    }

    async fn customer_ids_with_role(&self, role: &str) -> StoreResult<Vec<EntityId>> {
        let state = self.state.read();
        Self::check_available(&state)?;
        Ok(state
            .customers
            .values()
            .filter(|entry| entry.roles.contains(role))
            .map(|entry| entry.customer.id)
            .collect())
    }

    async fn query_customers(&self, query: &CustomerQuery) -> StoreResult<CustomerPage> {
        let state = self.state.read();
        Self::check_available(&state)?;

        let mut matching: Vec<&Customer> = state
            .customers
            .values()
            .filter(|entry| matches_query(entry, query))
            .map(|entry| &entry.customer)
            .collect();
        matching.sort_by(|a, b| compare_customers(a, b, query));

        let total = matching.len() as i64;
        let customers = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok(CustomerPage { customers, total })
    }

    async fn customer_meta(&self, customer: EntityId, key: &str) -> StoreResult<Option<String>> {
        let mut state = self.state.write();
        Self::check_available(&state)?;
        state.meta_reads += 1;
        Ok(state
            .customers
            .get(&customer)
            .and_then(|entry| entry.meta.get(key).cloned()))
    }

    async fn set_customer_meta(
        &self,
        customer: EntityId,
        key: &str,
        value: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        Self::check_available(&state)?;
        if let Some(entry) = state.customers.get_mut(&customer) {
            entry.meta.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn delete_customer_meta(&self, key: &str) -> StoreResult<u64> {
        let mut state = self.state.write();
        Self::check_available(&state)?;
        let removed = state
            .customers
            .values_mut()
            .filter_map(|entry| entry.meta.remove(key))
            .count();
        Ok(removed as u64)
    }

    async fn customer_order_stats(&self, customer: EntityId) -> StoreResult<CustomerOrderStats> {
        let state = self.state.read();
        Self::check_available(&state)?;
        let stats = state
            .orders
            .values()
            .filter(|order| order.customer == Some(customer))
            .fold(CustomerOrderStats::default(), |mut stats, order| {
                if order.status.is_registered() {
                    stats.order_count += 1;
                }
                if order.status.is_paid() {
                    stats.money_spent_cents += order.total_cents;
                }
                stats
            });
        Ok(stats)
    }

    async fn order_meta(&self, order: EntityId) -> StoreResult<Option<Vec<OrderMetaRow>>> {
        let state = self.state.read();
        Self::check_available(&state)?;
        Ok(state.orders.get(&order).map(|entry| entry.meta.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use chrono::TimeZone;

    fn customer(id: i64, name: &str, email: &str) -> Customer {
        Customer {
            id: EntityId(id),
            email: email.to_string(),
            username: name.to_lowercase(),
            display_name: name.to_string(),
            first_name: name.to_string(),
            last_name: String::new(),
            registered_at: Utc.with_ymd_and_hms(2024, 1, id as u32, 0, 0, 0).unwrap(),
            last_update: None,
            billing: Address::default(),
            shipping: Address::default(),
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_customer(customer(1, "Carol", "carol@example.com"), &["customer"]);
        store.insert_customer(customer(2, "Alice", "alice@example.com"), &["customer"]);
        store.insert_customer(customer(3, "Bob", "bob@shop.test"), &["shop_manager"]);
        store
    }

    #[tokio::test]
    async fn filters_by_role_and_sorts_by_name() {
        let store = seeded();
        let query = CustomerQuery {
            role: Some("customer".into()),
            ..CustomerQuery::default()
        };

        let page = store.query_customers(&query).await.unwrap();
        let names: Vec<_> = page.customers.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(page.total, 2);
        assert_eq!(names, vec!["Alice", "Carol"]);
    }

    #[tokio::test]
    async fn include_ordering_follows_requested_positions() {
        let store = seeded();
        let query = CustomerQuery {
            include: vec![EntityId(3), EntityId(1)],
            order_by: CustomerOrderBy::Include,
            ..CustomerQuery::default()
        };

        let page = store.query_customers(&query).await.unwrap();
        let ids: Vec<_> = page.customers.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![EntityId(3), EntityId(1)]);
    }

    #[tokio::test]
    async fn paginates_but_reports_full_total() {
        let store = seeded();
        let query = CustomerQuery {
            order_by: CustomerOrderBy::Id,
            order: SortOrder::Desc,
            limit: 1,
            offset: 1,
            ..CustomerQuery::default()
        };

        let page = store.query_customers(&query).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.customers.len(), 1);
        assert_eq!(page.customers[0].id, EntityId(2));
    }

    #[tokio::test]
    async fn outage_surfaces_as_store_error() {
        let store = seeded();
        store.simulate_outage("maintenance");
        assert!(matches!(
            store.all_order_ids().await,
            Err(StoreError::Unavailable(_))
        ));
        store.restore();
        assert!(store.all_order_ids().await.unwrap().is_empty());
    }
}
