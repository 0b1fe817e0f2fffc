use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::domain::order::{Order, OrderDraft, OrderError, OrderPatch};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderList {
    pub items: Vec<Order>,
}

/// Ids that do not parse cannot name a stored order
fn parse_order_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn unknown_order(raw: &str) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": format!("Order not found: {}", raw) }))
}

pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<OrderDraft>,
) -> Result<HttpResponse, OrderError> {
    let order = state.orders.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, OrderError> {
    let Some(id) = parse_order_id(&path) else {
        return Ok(unknown_order(&path));
    };
    let order = state.orders.read(id).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn update_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<OrderPatch>,
) -> Result<HttpResponse, OrderError> {
    let Some(id) = parse_order_id(&path) else {
        return Ok(unknown_order(&path));
    };
    let order = state.orders.update(id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

pub async fn list_orders(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, OrderError> {
    let user_id = query.user_id.as_deref().unwrap_or_default();
    let items = state.orders.list_for_user(user_id).await?;
    Ok(HttpResponse::Ok().json(OrderList { items }))
}

pub async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    match state.metrics.render() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-records",
        "statusPolicy": state.orders.policy().as_str(),
    }))
}
