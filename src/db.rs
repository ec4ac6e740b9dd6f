//! Database pool and schema migrations.

use rocket_db_pools::sqlx::{self, PgPool, migrate::Migrator};
use rocket_db_pools::Database;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Pool configured under `databases.metorik_db` in Rocket's figment.
#[derive(Database)]
#[database("metorik_db")]
pub struct StoreDb(sqlx::PgPool);

/// Apply pending migrations. Already applied migrations are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    log::info!("checking database migration state");

    MIGRATOR.run(pool).await?;

    log::info!("database migrations up to date");
    Ok(())
}
