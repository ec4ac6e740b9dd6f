//! Order synchronisation endpoints.

use chrono::Utc;
use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

use crate::error::ApiError;
use crate::models::{
    EntityId, EntityKind, IdList, OrderMetaResponse, OrderStatusesResponse, UpdatedOrdersResponse,
};
use crate::order_meta;
use crate::routes::params::UpdatedOrdersParams;
use crate::store::SharedStore;
use crate::sync;

/// Every order id, trashed orders included.
#[openapi(tag = "Orders")]
#[get("/orders/ids")]
pub async fn list_order_ids(store: &State<SharedStore>) -> Result<Json<IdList>, ApiError> {
    let ids = sync::list_all_ids(store.inner().as_ref(), EntityKind::Order).await?;
    Ok(Json(ids))
}

/// Orders modified within the last `days` days, excluding trashed orders.
#[openapi(tag = "Orders")]
#[get("/orders/updated?<params..>")]
pub async fn list_updated_orders(
    params: UpdatedOrdersParams,
    store: &State<SharedStore>,
) -> Result<Json<UpdatedOrdersResponse>, ApiError> {
    let window = params.window()?;
    let orders = sync::list_updated(store.inner().as_ref(), window, Utc::now()).await?;
    Ok(Json(UpdatedOrdersResponse { orders }))
}

#[openapi(tag = "Orders")]
#[get("/orders/statuses")]
pub fn list_order_statuses() -> Json<OrderStatusesResponse> {
    Json(OrderStatusesResponse::registered())
}

/// Extension-owned metadata of one order.
#[openapi(tag = "Orders")]
#[get("/orders/<id>/meta")]
pub async fn get_order_meta(
    id: i64,
    store: &State<SharedStore>,
) -> Result<Json<OrderMetaResponse>, ApiError> {
    let rows = store
        .order_meta(EntityId(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;

    Ok(Json(OrderMetaResponse {
        meta_data: order_meta::visible_entries(rows),
    }))
}
