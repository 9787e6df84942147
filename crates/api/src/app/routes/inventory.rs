use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use bazaar_auth::require_admin;
use bazaar_core::VariantId;
use bazaar_infra::{ServiceError, StockAdjustment};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/reconcile", get(reconcile))
        .route("/variants/:id/adjust", post(adjust_stock))
        .route("/variants/:id/ledger", get(variant_ledger))
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<StockAdjustment>,
) -> axum::response::Response {
    let variant_id: VariantId = match errors::parse_id(&id, "variant") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    match services.run(move |engine| engine.adjust_stock(&actor, variant_id, body)).await {
        Ok(adjusted) => (StatusCode::OK, Json(adjusted)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn variant_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let variant_id: VariantId = match errors::parse_id(&id, "variant") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    match services.run(move |engine| engine.variant_ledger(&actor, variant_id)).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "variant_id": variant_id.to_string(),
                "entries": entries,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Counter vs ledger drift report (admin).
pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> axum::response::Response {
    let actor = ctx.actor();
    let result = services
        .run(move |engine| {
            require_admin(&actor).map_err(ServiceError::from)?;
            engine.reconcile_stock()
        })
        .await;
    match result {
        Ok(drift) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "consistent": drift.is_empty(),
                "drift": drift,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
