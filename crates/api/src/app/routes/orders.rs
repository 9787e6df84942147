use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;

use bazaar_infra::{CreateOrderRequest, PaymentResult, ServiceError, StatusUpdate};
use bazaar_orders::{OrderFilter, OrderId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order).delete(delete_order))
        .route("/:id/status", patch(update_status))
        .route("/:id/confirm", post(confirm_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/force-cancel", post(force_cancel_order))
        .route("/:id/cancel-vendor-items", post(cancel_vendor_items))
        .route("/:id/fulfillment", patch(update_fulfillment))
        .route("/:id/payment", post(record_payment))
        .route("/:id/invoice", get(invoice))
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> axum::response::Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(filter): Query<OrderFilter>,
) -> axum::response::Response {
    let actor = ctx.actor();
    let result = services.run(move |engine| engine.list_orders(&actor, &filter)).await;
    respond(StatusCode::OK, result)
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<CreateOrderRequest>,
) -> axum::response::Response {
    let actor = ctx.actor();
    let result = services.run(move |engine| engine.create_order(&actor, body)).await;
    respond(StatusCode::CREATED, result)
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    let result = services.run(move |engine| engine.get_order(&actor, order_id)).await;
    respond(StatusCode::OK, result)
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    match services.run(move |engine| engine.delete_order(&actor, order_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    let result = services.run(move |engine| engine.update_status(&actor, order_id, body)).await;
    respond(StatusCode::OK, result)
}

pub async fn confirm_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::NotesRequest>>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let notes = body.and_then(|Json(b)| b.notes);
    let actor = ctx.actor();
    let result = services.run(move |engine| engine.confirm_order(&actor, order_id, notes)).await;
    respond(StatusCode::OK, result)
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelRequest>>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let reason = body.and_then(|Json(b)| b.reason);
    let actor = ctx.actor();
    let result = services.run(move |engine| engine.cancel_order(&actor, order_id, reason)).await;
    respond(StatusCode::OK, result)
}

pub async fn force_cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelRequest>>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let reason = body.and_then(|Json(b)| b.reason);
    let actor = ctx.actor();
    let result = services
        .run(move |engine| engine.force_cancel_order(&actor, order_id, reason))
        .await;
    respond(StatusCode::OK, result)
}

pub async fn cancel_vendor_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::VendorCancelRequest>>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let actor = ctx.actor();
    let result = services
        .run(move |engine| engine.cancel_vendor_items(&actor, order_id, body.vendor_id, body.reason))
        .await;
    respond(StatusCode::OK, result)
}

pub async fn update_fulfillment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::FulfillmentRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    let result = services
        .run(move |engine| engine.update_fulfillment(&actor, order_id, body.vendor_id, body.update))
        .await;
    respond(StatusCode::OK, result)
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<PaymentResult>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    let result = services.run(move |engine| engine.record_payment(&actor, order_id, body)).await;
    respond(StatusCode::OK, result)
}

pub async fn invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match errors::parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    let result = services.run(move |engine| engine.invoice(&actor, order_id)).await;
    respond(StatusCode::OK, result)
}
