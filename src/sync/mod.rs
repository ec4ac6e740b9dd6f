//! Incremental and bulk synchronisation queries.
//!
//! A polling import client bootstraps with the complete identifier listings
//! ([`list_all_ids`]) and afterwards asks only for orders changed inside a
//! lookback window ([`list_updated`]).
//!
//! The two queries deliberately disagree about soft-deleted orders: the bulk
//! listing includes trashed orders, the incremental one never reports them.
//! Hard-deleted orders are reported by neither.

mod window;

pub use window::LookbackWindow;

use chrono::{DateTime, Utc};

use crate::models::{EntityKind, IdList, SyncRecord};
use crate::routes::params::DEFAULT_CUSTOMER_ROLE;
use crate::store::{CommerceStore, StoreResult};

/// Orders modified strictly after `now - window` that are not trashed.
///
/// Returns an empty collection when nothing changed. Ordering is whatever the
/// store yields.
pub async fn list_updated(
    store: &dyn CommerceStore,
    window: LookbackWindow,
    now: DateTime<Utc>,
) -> StoreResult<Vec<SyncRecord>> {
    let cutoff = window.cutoff(now);
    let records = store.orders_modified_after(cutoff).await?;
    log::debug!(
        "{} orders modified in the last {} days (cutoff {})",
        records.len(),
        window.days(),
        cutoff
    );
    Ok(records)
}

/// Every identifier of the given kind: customers holding the `customer` role,
/// or all orders in any status.
pub async fn list_all_ids(store: &dyn CommerceStore, kind: EntityKind) -> StoreResult<IdList> {
    let ids = match kind {
        EntityKind::Customer => store.customer_ids_with_role(DEFAULT_CUSTOMER_ROLE).await?,
        EntityKind::Order => store.all_order_ids().await?,
    };
    Ok(IdList::new(ids))
}
