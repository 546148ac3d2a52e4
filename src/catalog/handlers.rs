use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::auth::Session;
use crate::db::{ProductDraft, QrisDraft, QrisUpdate};
use crate::error::AppError;
use crate::AppState;

pub async fn list_products(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let products = state.catalog.storefront().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": products })))
}

pub async fn get_product(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let product = state.catalog.available_product(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": product })))
}

pub async fn product_qris(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    match state.catalog.qris_for_product(path.into_inner()).await? {
        Some(qris) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": qris }))),
        None => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": null,
            "message": "No QRIS assigned to this product",
        }))),
    }
}

pub async fn admin_list_products(
    _session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let products = state.catalog.all_products().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": products })))
}

pub async fn create_product(
    session: Session,
    body: web::Json<ProductDraft>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!(admin = session.email(), "Creating product");
    let product = state.catalog.create_product(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": product,
        "message": "Product created successfully",
    })))
}

pub async fn update_product(
    session: Session,
    path: web::Path<Uuid>,
    body: web::Json<ProductDraft>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    info!(admin = session.email(), %id, "Updating product");
    let product = state.catalog.update_product(id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": product,
        "message": "Product updated successfully",
    })))
}

pub async fn delete_product(
    session: Session,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    info!(admin = session.email(), %id, "Deleting product");
    state.catalog.delete_product(id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Product deleted successfully",
    })))
}

pub async fn toggle_product(
    _session: Session,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let product = state.catalog.toggle_availability(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": product,
        "message": "Product availability updated",
    })))
}

pub async fn list_qris(
    _session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let codes = state.catalog.qris_codes().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "data": codes })))
}

pub async fn create_qris(
    _session: Session,
    body: web::Json<QrisDraft>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let qris = state.catalog.create_qris(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": qris,
        "message": "QRIS created successfully",
    })))
}

pub async fn update_qris(
    _session: Session,
    path: web::Path<Uuid>,
    body: web::Json<QrisUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let qris = state
        .catalog
        .update_qris(path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": qris,
        "message": "QRIS updated successfully",
    })))
}

pub async fn delete_qris(
    session: Session,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    info!(admin = session.email(), %id, "Deleting QRIS");
    state.catalog.delete_qris(id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "QRIS deleted successfully",
    })))
}
