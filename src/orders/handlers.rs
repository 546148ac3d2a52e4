use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::auth::Session;
use crate::error::AppError;
use crate::orders::{OrderRequest, StatusUpdate};
use crate::AppState;

pub async fn create_order(
    body: web::Json<OrderRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let created = state.orders.place_order(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Order created successfully",
        "data": { "order": created.order, "items": created.items },
    })))
}

pub async fn list_orders(
    _session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let orders = state.orders.list_orders().await?;
    info!("Returning {} orders", orders.len());
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": orders })))
}

pub async fn pending_count(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let count = state.orders.pending_count().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "count": count })))
}

pub async fn get_order(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let order = state.orders.find_order(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": order })))
}

pub async fn customer_orders(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let orders = state.orders.customer_orders(&path).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": orders })))
}

pub async fn update_status(
    session: Session,
    path: web::Path<Uuid>,
    body: web::Json<StatusUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    info!(admin = session.email(), %id, status = %body.status, "Order status change requested");
    let order = state.orders.update_status(id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Order status updated",
        "data": order,
    })))
}

pub async fn delete_order(
    session: Session,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    info!(admin = session.email(), %id, "Deleting order");
    state.orders.delete_order(id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Order deleted successfully",
    })))
}
