use std::sync::Arc;

use chrono::{Duration, Utc};
use metorik_helper::api_routes;
use metorik_helper::config::{AppConfig, CustomersEndpoint};
use metorik_helper::customer_metrics;
use metorik_helper::models::{
    CustomerRecord, EntityId, EntityKind, OrderMetaResponse, OrderStatus,
};
use metorik_helper::routes::params::{CustomerOrderBy, SortOrder};
use metorik_helper::store::{CommerceStore, CustomerQuery, CustomerSearch, PgCommerceStore};
use metorik_helper::sync::{self, LookbackWindow};
use metorik_helper::test_support::{TestDatabase, TestDatabaseError, TestFixtures, TestRocketBuilder};
use rocket::http::{Header, Status};

macro_rules! test_database {
    () => {
        match TestDatabase::new_from_env().await {
            Ok(db) => db,
            Err(TestDatabaseError::MissingUrl) => {
                eprintln!("skipping postgres store test: no test database configured");
                return;
            }
            Err(err) => panic!("failed to provision test database: {err:?}"),
        }
    };
}

#[tokio::test]
async fn sync_queries_honour_window_and_trash() {
    let test_db = test_database!();
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let now = Utc::now();

    let recent = fixtures
        .insert_order(None, OrderStatus::Processing, 1_000, now - Duration::days(1))
        .await
        .expect("insert order");
    fixtures
        .insert_order(None, OrderStatus::Completed, 1_000, now - Duration::days(8))
        .await
        .expect("insert order");
    fixtures
        .insert_order(None, OrderStatus::Pending, 1_000, now - Duration::days(30))
        .await
        .expect("insert order");
    let trashed = fixtures
        .insert_order(None, OrderStatus::Trash, 1_000, now - Duration::days(1))
        .await
        .expect("insert order");

    let store = PgCommerceStore::new(pool.clone());
    let window = LookbackWindow::from_days(7).expect("valid window");

    let updated = sync::list_updated(&store, window, now).await.expect("query");
    let ids: Vec<i64> = updated.iter().map(|record| record.id.get()).collect();
    assert_eq!(ids, vec![recent]);

    let all = sync::list_all_ids(&store, EntityKind::Order).await.expect("query");
    assert_eq!(all.count, 4);
    assert!(all.ids.contains(&EntityId(trashed)));

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn windows_beyond_the_timestamp_range_return_every_live_order() {
    let test_db = test_database!();
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let now = Utc::now();

    let mut live = Vec::new();
    for days_ago in [1, 400, 20_000] {
        live.push(
            fixtures
                .insert_order(None, OrderStatus::Completed, 1_000, now - Duration::days(days_ago))
                .await
                .expect("insert order"),
        );
    }
    fixtures
        .insert_order(None, OrderStatus::Trash, 1_000, now - Duration::days(2))
        .await
        .expect("insert order");

    let store = PgCommerceStore::new(pool.clone());
    for days in [3_000_000, i64::from(u32::MAX)] {
        let window = LookbackWindow::from_days(days).expect("valid window");
        let updated = sync::list_updated(&store, window, now)
            .await
            .expect("cutoff outside the timestamptz range still queries");
        let mut ids: Vec<i64> = updated.iter().map(|record| record.id.get()).collect();
        ids.sort_unstable();
        assert_eq!(ids, live, "days={days}");
    }

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn customer_queries_filter_sort_and_count() {
    let test_db = test_database!();
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let now = Utc::now();

    let alice = fixtures
        .insert_customer("alice", "Alice@Example.com", "Alice", &["customer"], now)
        .await
        .expect("insert customer");
    let bob = fixtures
        .insert_customer("bob", "bob@shop.test", "Bob", &["customer"], now)
        .await
        .expect("insert customer");
    let agent = fixtures
        .insert_customer("agent", "agent@shop.test", "Agent", &["customer_service"], now)
        .await
        .expect("insert customer");
    fixtures
        .insert_billing_city(bob, "Leeds")
        .await
        .expect("insert address");

    let store = PgCommerceStore::new(pool.clone());

    let ids = store.customer_ids_with_role("customer").await.expect("query");
    assert_eq!(ids, vec![EntityId(alice), EntityId(bob)]);
    assert!(!ids.contains(&EntityId(agent)));

    let page = store
        .query_customers(&CustomerQuery {
            role: Some("customer".into()),
            order_by: CustomerOrderBy::Name,
            order: SortOrder::Desc,
            ..CustomerQuery::default()
        })
        .await
        .expect("query");
    assert_eq!(page.total, 2);
    assert_eq!(page.customers[0].username, "bob");
    assert_eq!(page.customers[0].billing.city, "Leeds");
    assert_eq!(page.customers[1].billing.city, "");

    let page = store
        .query_customers(&CustomerQuery {
            search: Some(CustomerSearch::Email("alice@example.COM".into())),
            ..CustomerQuery::default()
        })
        .await
        .expect("query");
    assert_eq!(page.total, 1);
    assert_eq!(page.customers[0].id, EntityId(alice));

    let page = store
        .query_customers(&CustomerQuery {
            search: Some(CustomerSearch::Term("SHOP".into())),
            include: vec![EntityId(agent), EntityId(bob)],
            order_by: CustomerOrderBy::Include,
            ..CustomerQuery::default()
        })
        .await
        .expect("query");
    let ids: Vec<EntityId> = page.customers.iter().map(|customer| customer.id).collect();
    assert_eq!(ids, vec![EntityId(agent), EntityId(bob)]);

    let page = store
        .query_customers(&CustomerQuery {
            search: Some(CustomerSearch::Term("100%".into())),
            ..CustomerQuery::default()
        })
        .await
        .expect("query");
    assert_eq!(page.total, 0);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn derived_metrics_are_cached_and_reset() {
    let test_db = test_database!();
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let now = Utc::now();

    let customer = fixtures
        .insert_customer("carol", "carol@example.com", "Carol", &["customer"], now)
        .await
        .expect("insert customer");
    for (status, total_cents) in [
        (OrderStatus::Completed, 2_550),
        (OrderStatus::Processing, 1_000),
        (OrderStatus::Refunded, 4_000),
        (OrderStatus::Trash, 9_999),
    ] {
        fixtures
            .insert_order(Some(customer), status, total_cents, now)
            .await
            .expect("insert order");
    }

    let store = PgCommerceStore::new(pool.clone());
    let id = EntityId(customer);

    assert_eq!(
        customer_metrics::total_spent(&store, id, false).await.expect("metric"),
        "35.50"
    );
    assert_eq!(
        customer_metrics::order_count(&store, id, false).await.expect("metric"),
        3
    );
    assert_eq!(
        store
            .customer_meta(id, customer_metrics::MONEY_SPENT_KEY)
            .await
            .expect("meta")
            .as_deref(),
        Some("35.50")
    );
    assert_eq!(
        customer_metrics::total_spent(&store, id, true).await.expect("metric"),
        "0.00"
    );

    assert_eq!(customer_metrics::reset(&store).await.expect("reset"), 2);
    assert_eq!(
        store
            .customer_meta(id, customer_metrics::ORDER_COUNT_KEY)
            .await
            .expect("meta"),
        None
    );

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn routes_read_through_postgres() {
    let test_db = test_database!();
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let now = Utc::now();

    let customer = fixtures
        .insert_customer("dave", "dave@example.com", "Dave", &["customer"], now)
        .await
        .expect("insert customer");
    let order = fixtures
        .insert_order(Some(customer), OrderStatus::Completed, 4_200, now)
        .await
        .expect("insert order");
    fixtures
        .insert_order_meta(order, "_order_total", "42.00")
        .await
        .expect("insert meta");
    fixtures
        .insert_order_meta(order, "_gift_wrap", "yes")
        .await
        .expect("insert meta");

    let client = TestRocketBuilder::new()
        .manage_store(Arc::new(PgCommerceStore::new(pool.clone())))
        .manage_config(AppConfig {
            customers_endpoint: CustomersEndpoint::ImportOverride,
            ..AppConfig::default()
        })
        .mount_api_routes(api_routes(CustomersEndpoint::ImportOverride))
        .async_client()
        .await;

    let response = client
        .get(format!("/wp-json/wc/v1/orders/{order}/meta"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let meta: OrderMetaResponse = response.into_json().await.expect("valid JSON payload");
    assert_eq!(meta.meta_data.len(), 1);
    assert_eq!(meta.meta_data[0].key, "_gift_wrap");

    let response = client
        .get("/wp-json/wc/v1/customers")
        .header(Header::new("User-Agent", "Metorik"))
        .dispatch()
        .await;
    assert_eq!(response.headers().get_one("X-WP-Total"), Some("1"));
    let records: Vec<CustomerRecord> = response.into_json().await.expect("valid JSON payload");
    assert_eq!(records[0].total_spent, "0.00");

    let response = client.get("/wp-json/wc/v1/customers").dispatch().await;
    let records: Vec<CustomerRecord> = response.into_json().await.expect("valid JSON payload");
    assert_eq!(records[0].total_spent, "42.00");
    assert_eq!(records[0].orders_count, 1);

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}
