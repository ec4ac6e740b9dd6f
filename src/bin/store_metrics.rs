use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use metorik_helper::customer_metrics;
use metorik_helper::routes::params::{CustomerOrderBy, SortOrder};
use metorik_helper::store::{CommerceStore, CustomerQuery, PgCommerceStore};

const WARM_BATCH: i64 = 100;

#[derive(Parser, Debug)]
#[command(
    name = "store_metrics",
    about = "Maintain the cached lifetime spend and order count of customers"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete every cached metric so the next read recomputes it.
    Reset,
    /// Recompute and cache the metrics of every customer.
    Warm {
        /// Only warm customers holding this role.
        #[arg(long)]
        role: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    let store = PgCommerceStore::new(pool);

    match args.command {
        Command::Reset => {
            let removed = customer_metrics::reset(&store).await?;
            log::info!("removed {} cached metric values", removed);
        }
        Command::Warm { role } => {
            let warmed = warm_all(&store, role).await?;
            log::info!("warmed metrics for {} customers", warmed);
        }
    }

    store.pool().close().await;
    Ok(())
}

async fn warm_all(
    store: &dyn CommerceStore,
    role: Option<String>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut query = CustomerQuery {
        role,
        order_by: CustomerOrderBy::Id,
        order: SortOrder::Asc,
        limit: WARM_BATCH,
        offset: 0,
        ..CustomerQuery::default()
    };
    let mut warmed = 0;

    loop {
        let page = store.query_customers(&query).await?;
        if page.customers.is_empty() {
            break;
        }
        for customer in &page.customers {
            customer_metrics::warm(store, customer.id).await?;
        }
        warmed += page.customers.len();
        log::debug!("warmed {} of {} customers", warmed, page.total);
        query.offset += WARM_BATCH;
    }

    Ok(warmed)
}
