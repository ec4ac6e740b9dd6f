//! PostgreSQL-backed [`CommerceStore`].

use chrono::{DateTime, NaiveDate, Utc};
use rocket_db_pools::sqlx::{self, FromRow, PgPool, Postgres, QueryBuilder};

use super::{CommerceStore, CustomerPage, CustomerQuery, CustomerSearch, StoreResult, escape_like};
use crate::models::{
    Address, Customer, CustomerOrderStats, EntityId, OrderMetaRow, OrderStatus, SyncRecord,
};
use crate::routes::params::CustomerOrderBy;

const CUSTOMER_COLUMNS: &str = r#"
    SELECT
        c.id, c.email, c.username, c.display_name, c.first_name, c.last_name,
        c.registered_at, c.last_update,
        COALESCE(b.first_name, '') AS billing_first_name,
        COALESCE(b.last_name, '') AS billing_last_name,
        COALESCE(b.company, '') AS billing_company,
        COALESCE(b.address_1, '') AS billing_address_1,
        COALESCE(b.address_2, '') AS billing_address_2,
        COALESCE(b.city, '') AS billing_city,
        COALESCE(b.state, '') AS billing_state,
        COALESCE(b.postcode, '') AS billing_postcode,
        COALESCE(b.country, '') AS billing_country,
        COALESCE(b.email, '') AS billing_email,
        COALESCE(b.phone, '') AS billing_phone,
        COALESCE(s.first_name, '') AS shipping_first_name,
        COALESCE(s.last_name, '') AS shipping_last_name,
        COALESCE(s.company, '') AS shipping_company,
        COALESCE(s.address_1, '') AS shipping_address_1,
        COALESCE(s.address_2, '') AS shipping_address_2,
        COALESCE(s.city, '') AS shipping_city,
        COALESCE(s.state, '') AS shipping_state,
        COALESCE(s.postcode, '') AS shipping_postcode,
        COALESCE(s.country, '') AS shipping_country
    FROM customers c
    LEFT JOIN customer_addresses b ON b.customer_id = c.id AND b.kind = 'billing'
    LEFT JOIN customer_addresses s ON s.customer_id = c.id AND s.kind = 'shipping'
    WHERE TRUE"#;

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: i64,
    email: String,
    username: String,
    display_name: String,
    first_name: String,
    last_name: String,
    registered_at: DateTime<Utc>,
    last_update: Option<DateTime<Utc>>,
    billing_first_name: String,
    billing_last_name: String,
    billing_company: String,
    billing_address_1: String,
    billing_address_2: String,
    billing_city: String,
    billing_state: String,
    billing_postcode: String,
    billing_country: String,
    billing_email: String,
    billing_phone: String,
    shipping_first_name: String,
    shipping_last_name: String,
    shipping_company: String,
    shipping_address_1: String,
    shipping_address_2: String,
    shipping_city: String,
    shipping_state: String,
    shipping_postcode: String,
    shipping_country: String,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: EntityId(row.id),
            email: row.email,
            username: row.username,
            display_name: row.display_name,
            first_name: row.first_name,
            last_name: row.last_name,
            registered_at: row.registered_at,
            last_update: row.last_update,
            billing: Address {
                first_name: row.billing_first_name,
                last_name: row.billing_last_name,
                company: row.billing_company,
                address_1: row.billing_address_1,
                address_2: row.billing_address_2,
                city: row.billing_city,
                state: row.billing_state,
                postcode: row.billing_postcode,
                country: row.billing_country,
                email: row.billing_email,
                phone: row.billing_phone,
            },
            shipping: Address {
                first_name: row.shipping_first_name,
                last_name: row.shipping_last_name,
                company: row.shipping_company,
                address_1: row.shipping_address_1,
                address_2: row.shipping_address_2,
                city: row.shipping_city,
                state: row.shipping_state,
                postcode: row.shipping_postcode,
                country: row.shipping_country,
                email: String::new(),
                phone: String::new(),
            },
        }
    }
}

/// Cutoffs older than any `timestamptz` Postgres accepts (4713 BC) bound
/// nothing, so the predicate is dropped instead of bound out of range.
fn bindable_cutoff(cutoff: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let earliest = NaiveDate::from_ymd_opt(-4712, 1, 1)?
        .and_hms_opt(0, 0, 0)?
        .and_utc();
    (cutoff >= earliest).then_some(cutoff)
}

fn raw_ids(ids: &[EntityId]) -> Vec<i64> {
    ids.iter().map(|id| id.get()).collect()
}

fn status_codes(statuses: &[OrderStatus]) -> Vec<String> {
    statuses
        .iter()
        .map(|status| status.code().to_string())
        .collect()
}

/// Append the WHERE clauses shared by the count and page queries.
fn push_customer_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &CustomerQuery) {
    if let Some(role) = &query.role {
        builder
            .push(" AND EXISTS (SELECT 1 FROM customer_roles r WHERE r.customer_id = c.id AND r.role = ")
            .push_bind(role.clone())
            .push(")");
    }

    if !query.include.is_empty() {
        builder
            .push(" AND c.id = ANY(")
            .push_bind(raw_ids(&query.include))
            .push(")");
    }

    if !query.exclude.is_empty() {
        builder
            .push(" AND NOT (c.id = ANY(")
            .push_bind(raw_ids(&query.exclude))
            .push("))");
    }

    match &query.search {
        Some(CustomerSearch::Term(term)) => {
            let pattern = format!("%{}%", escape_like(term));
            builder
                .push(" AND (c.email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.username ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.display_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        Some(CustomerSearch::Email(email)) => {
            builder
                .push(" AND lower(c.email) = lower(")
                .push_bind(email.clone())
                .push(")");
        }
        None => {}
    }
}

fn push_customer_ordering(builder: &mut QueryBuilder<'_, Postgres>, query: &CustomerQuery) {
    builder.push(" ORDER BY ");
    match query.order_by {
        CustomerOrderBy::Include if !query.include.is_empty() => {
            builder
                .push("array_position(")
                .push_bind(raw_ids(&query.include))
                .push("::bigint[], c.id)");
        }
        CustomerOrderBy::Include | CustomerOrderBy::Id => {
            builder.push("c.id");
        }
        CustomerOrderBy::Name => {
            builder.push("c.display_name");
        }
        CustomerOrderBy::RegisteredDate => {
            builder.push("c.registered_at");
        }
    }
    builder
        .push(" ")
        .push(query.order.sql_keyword())
        .push(", c.id ASC");
}

pub struct PgCommerceStore {
    pool: PgPool,
}

impl PgCommerceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[rocket::async_trait]
impl CommerceStore for PgCommerceStore {
    async fn all_order_ids(&self) -> StoreResult<Vec<EntityId>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM orders ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().map(EntityId).collect())
    }

    async fn orders_modified_after(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<SyncRecord>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT id, modified_at FROM orders WHERE status <> ",
        );
        builder.push_bind(OrderStatus::Trash.code());
        if let Some(cutoff) = bindable_cutoff(cutoff) {
            builder.push(" AND modified_at > ").push_bind(cutoff);
        }

        let rows: Vec<(i64, DateTime<Utc>)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, modified_at)| SyncRecord {
                id: EntityId(id),
                last_updated: modified_at.timestamp(),
            })
            .collect())
    }

    async fn customer_ids_with_role(&self, role: &str) -> StoreResult<Vec<EntityId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT customer_id FROM customer_roles WHERE role = $1 ORDER BY customer_id",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(EntityId).collect())
    }

    async fn query_customers(&self, query: &CustomerQuery) -> StoreResult<CustomerPage> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customers c WHERE TRUE");
        push_customer_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(CUSTOMER_COLUMNS);
        push_customer_filters(&mut select, query);
        push_customer_ordering(&mut select, query);
        select
            .push(" LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let rows: Vec<CustomerRow> = select.build_query_as::<CustomerRow>().fetch_all(&self.pool).await?;

        Ok(CustomerPage {
            customers: rows.into_iter().map(Customer::from).collect(),
            total,
        })
    }

    async fn customer_meta(&self, customer: EntityId, key: &str) -> StoreResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT meta_value FROM customer_meta WHERE customer_id = $1 AND meta_key = $2",
        )
        .bind(customer.get())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set_customer_meta(
        &self,
        customer: EntityId,
        key: &str,
        value: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO customer_meta (customer_id, meta_key, meta_value)
               VALUES ($1, $2, $3)
               ON CONFLICT (customer_id, meta_key) DO UPDATE SET meta_value = EXCLUDED.meta_value"#,
        )
        .bind(customer.get())
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_customer_meta(&self, key: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM customer_meta WHERE meta_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn customer_order_stats(&self, customer: EntityId) -> StoreResult<CustomerOrderStats> {
        let (order_count, money_spent_cents): (i64, i64) = sqlx::query_as(
            r#"SELECT
                   COUNT(*) FILTER (WHERE status = ANY($2)) AS order_count,
                   CAST(COALESCE(SUM(total_cents) FILTER (WHERE status = ANY($3)), 0) AS BIGINT)
                       AS money_spent_cents
               FROM orders
               WHERE customer_id = $1"#,
        )
        .bind(customer.get())
        .bind(status_codes(&OrderStatus::REGISTERED))
        .bind(status_codes(&OrderStatus::PAID))
        .fetch_one(&self.pool)
        .await?;

        Ok(CustomerOrderStats {
            order_count,
            money_spent_cents,
        })
    }

    async fn order_meta(&self, order: EntityId) -> StoreResult<Option<Vec<OrderMetaRow>>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(order.get())
            .fetch_one(&self.pool)
            .await?;

        if !exists {
            return Ok(None);
        }

        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT id, meta_key, meta_value FROM order_meta WHERE order_id = $1 ORDER BY id",
        )
        .bind(order.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(
            rows.into_iter()
                .map(|(id, key, value)| OrderMetaRow { id, key, value })
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cutoffs_before_the_timestamptz_range_are_unbounded() {
        assert_eq!(bindable_cutoff(DateTime::<Utc>::MIN_UTC), None);

        let ancient = Utc.with_ymd_and_hms(-8000, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(bindable_cutoff(ancient), None);

        let recent = Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap();
        assert_eq!(bindable_cutoff(recent), Some(recent));
    }
}
