// ============================================================================
// HTTP API
// ============================================================================
//
// POST  /orders            create
// GET   /orders?userId=    list a user's orders
// GET   /orders/{id}       read
// PATCH /orders/{id}       partial update
// GET   /metrics           prometheus text exposition
// GET   /health            liveness
//
// ============================================================================

mod error;
mod handlers;

use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::domain::order::OrderCommandHandler;
use crate::metrics::Metrics;

pub use handlers::OrderList;

/// Shared by every worker
pub struct AppState {
    pub orders: Arc<OrderCommandHandler>,
    pub metrics: Arc<Metrics>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        actix_web::error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(serde_json::json!({ "error": message })),
        )
        .into()
    });

    cfg.app_data(json_config)
        .route("/orders", web::post().to(handlers::create_order))
        .route("/orders", web::get().to(handlers::list_orders))
        .route("/orders/{id}", web::get().to(handlers::get_order))
        .route("/orders/{id}", web::patch().to(handlers::update_order))
        .route("/metrics", web::get().to(handlers::metrics))
        .route("/health", web::get().to(handlers::health));
}
