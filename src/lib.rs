#[macro_use]
extern crate rocket;

pub mod catchers;
pub mod config;
pub mod customer_metrics;
pub mod db;
pub mod error;
pub mod import_mode;
pub mod models;
pub mod order_meta;
pub mod request_logger;
pub mod routes;
pub mod store;
pub mod sync;

use crate::config::{API_MOUNT_PATH, AppConfig, CustomersEndpoint};
use crate::db::StoreDb;
use crate::request_logger::RequestLogger;
use crate::store::{PgCommerceStore, SharedStore};
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket, Route};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    match AppConfig::from_env() {
        Ok(config) => build_rocket(config),
        Err(err) => {
            log::error!("invalid configuration: {}", err);
            rocket::build().attach(AdHoc::try_on_ignite("Configuration", |rocket| async move {
                Err(rocket)
            }))
        }
    }
}

/// Assemble the service for `config`: database, migrations, store and routes.
pub fn build_rocket(config: AppConfig) -> Rocket<Build> {
    log::info!(
        "starting store sync helper (customers endpoint: {})",
        config.customers_endpoint.as_str()
    );

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .to_cors()
        .expect("Error creating CORS");

    let routes = api_routes(config.customers_endpoint);

    rocket::build()
        .attach(RequestLogger)
        .attach(StoreDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match StoreDb::fetch(&rocket) {
                    Some(pool) => match db::run_migrations(pool).await {
                        Ok(_) => Ok(rocket),
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    },
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite(
            "Manage Commerce Store",
            |rocket| async move {
                match StoreDb::fetch(&rocket) {
                    Some(pool) => {
                        let store: SharedStore = Arc::new(PgCommerceStore::new((**pool).clone()));
                        Ok(rocket.manage(store))
                    }
                    None => Err(rocket),
                }
            },
        ))
        .manage(config)
        .mount(API_MOUNT_PATH, routes)
        .mount(
            "/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../wp-json/wc/v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .register("/", catchers::json_catchers())
}

/// Routes served under [`API_MOUNT_PATH`], including `openapi.json`.
///
/// The customers listing is only part of the set while an import overrides
/// the store's own endpoint.
pub fn api_routes(endpoint: CustomersEndpoint) -> Vec<Route> {
    match endpoint {
        CustomersEndpoint::Core => openapi_get_routes![
            routes::health::health_check,
            routes::orders::list_order_ids,
            routes::orders::list_updated_orders,
            routes::orders::list_order_statuses,
            routes::orders::get_order_meta,
            routes::customers::list_customer_ids,
        ],
        CustomersEndpoint::ImportOverride => openapi_get_routes![
            routes::health::health_check,
            routes::orders::list_order_ids,
            routes::orders::list_updated_orders,
            routes::orders::list_order_statuses,
            routes::orders::get_order_meta,
            routes::customers::list_customer_ids,
            routes::customers::list_customers,
        ],
    }
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use chrono::{DateTime, Utc};
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};
    use std::sync::Arc;

    use crate::config::{API_MOUNT_PATH, AppConfig};
    use crate::models::OrderStatus;
    use crate::store::{CommerceStore, SharedStore};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Helpers for seeding the commerce tables in PostgreSQL tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert a customer with the given roles, returning the new id.
        pub async fn insert_customer(
            &self,
            username: &str,
            email: &str,
            display_name: &str,
            roles: &[&str],
            registered_at: DateTime<Utc>,
        ) -> Result<i64, sqlx::Error> {
            let customer_id: i64 = sqlx::query_scalar(
                "INSERT INTO customers (email, username, display_name, registered_at) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(email)
            .bind(username)
            .bind(display_name)
            .bind(registered_at)
            .fetch_one(self.pool)
            .await?;

            for role in roles {
                sqlx::query("INSERT INTO customer_roles (customer_id, role) VALUES ($1, $2)")
                    .bind(customer_id)
                    .bind(*role)
                    .execute(self.pool)
                    .await?;
            }

            Ok(customer_id)
        }

        /// Attach a billing address holding only a city.
        pub async fn insert_billing_city(
            &self,
            customer_id: i64,
            city: &str,
        ) -> Result<(), sqlx::Error> {
            sqlx::query(
                "INSERT INTO customer_addresses (customer_id, kind, city) VALUES ($1, 'billing', $2)",
            )
            .bind(customer_id)
            .bind(city)
            .execute(self.pool)
            .await?;
            Ok(())
        }

        /// Insert an order, returning the new id.
        pub async fn insert_order(
            &self,
            customer_id: Option<i64>,
            status: OrderStatus,
            total_cents: i64,
            modified_at: DateTime<Utc>,
        ) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO orders (customer_id, status, total_cents, modified_at) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(customer_id)
            .bind(status.code())
            .bind(total_cents)
            .bind(modified_at)
            .fetch_one(self.pool)
            .await
        }

        pub async fn insert_order_meta(
            &self,
            order_id: i64,
            key: &str,
            value: &str,
        ) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO order_meta (order_id, meta_key, meta_value) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(order_id)
            .bind(key)
            .bind(value)
            .fetch_one(self.pool)
            .await
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("neither TEST_DATABASE_URL nor TEST_USE_CONTAINERS is set")]
            MissingUrl,
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral, fully migrated database for integration tests.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<GenericImage>>,
        }

        impl TestDatabase {
            /// Create a database on `TEST_DATABASE_URL`, or in a disposable
            /// Postgres container when `TEST_USE_CONTAINERS` is set.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
                    return Self::provision(&url, None).await;
                }
                if std::env::var_os("TEST_USE_CONTAINERS").is_some() {
                    return Self::new_in_container().await;
                }
                Err(TestDatabaseError::MissingUrl)
            }

            async fn new_in_container() -> Result<Self, TestDatabaseError> {
                let container = GenericImage::new("postgres", "16-alpine")
                    .with_wait_for(WaitFor::message_on_stderr(
                        "database system is ready to accept connections",
                    ))
                    .with_env_var("POSTGRES_DB", "postgres")
                    .with_env_var("POSTGRES_USER", "postgres")
                    .with_env_var("POSTGRES_PASSWORD", "postgres")
                    .start()
                    .await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::provision(&admin_url, Some(container)).await
            }

            async fn provision(
                base_url: &str,
                container: Option<ContainerAsync<GenericImage>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = base_url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_options = base_options.clone().database("postgres");
                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.database(&new_db_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name: new_db_name,
                    container,
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database(self.admin_options.clone(), &self.database_name).await?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_sql = format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", database_name);
            sqlx::query(&drop_sql).execute(&admin_pool).await?;
            Ok(())
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database(admin_options, &db_name).await;
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        store: Option<SharedStore>,
        config: AppConfig,
    }

    impl Default for TestRocketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                store: None,
                config: AppConfig::default(),
            }
        }

        /// Mount routes under `/wp-json/wc/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push((API_MOUNT_PATH.to_string(), routes));
            self
        }

        /// Manage `store` as the [`SharedStore`] handlers read from.
        pub fn manage_store(mut self, store: Arc<dyn CommerceStore>) -> Self {
            self.store = Some(store);
            self
        }

        pub fn manage_config(mut self, config: AppConfig) -> Self {
            self.config = config;
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment)
                .manage(self.config)
                .register("/", crate::catchers::json_catchers());

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(store) = self.store {
                rocket = rocket.manage(store);
            }

            rocket
        }

        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
