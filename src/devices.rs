// src/devices.rs
use crate::cache::ListCaches;
use crate::db::{self, EntityTable};
use crate::error::AppError;
use crate::models::{
    ApiMessage, BulkDeleteRequest, BulkStatusRequest, DeviceListQuery, DeviceStatus,
};
use crate::selection::EntityStatus;
use actix_web::{HttpResponse, get, post, web};
use sqlx::PgPool;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_device_stats);
    cfg.service(list_devices);
    cfg.service(update_device_status);
    cfg.service(delete_devices);
}

#[get("/devices")]
pub async fn list_devices(
    pool: web::Data<PgPool>,
    caches: web::Data<ListCaches>,
    query: web::Query<DeviceListQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let cache_key = format!("devices_{:?}", query);
    let generation = caches.devices.generation();
    if let Some(cached) = caches.devices.get(generation, &cache_key).await {
        tracing::debug!("Cache hit for key: {}", cache_key);
        return Ok(HttpResponse::Ok().json(cached));
    }

    let page = db::list_devices(&pool, &query).await?;
    let response = serde_json::json!(page);
    caches.devices.insert(generation, &cache_key, response.clone()).await;

    Ok(HttpResponse::Ok().json(response))
}

#[get("/devices/stats")]
pub async fn get_device_stats(
    pool: web::Data<PgPool>,
    caches: web::Data<ListCaches>,
) -> Result<HttpResponse, AppError> {
    let cache_key = "devices_stats";
    let generation = caches.devices.generation();
    if let Some(cached) = caches.devices.get(generation, cache_key).await {
        return Ok(HttpResponse::Ok().json(cached));
    }

    let stats = serde_json::json!(db::get_device_stats(&pool).await?);
    caches.devices.insert(generation, cache_key, stats.clone()).await;
    Ok(HttpResponse::Ok().json(stats))
}

#[post("/devices/status")]
pub async fn update_device_status(
    pool: web::Data<PgPool>,
    caches: web::Data<ListCaches>,
    req: web::Json<BulkStatusRequest<DeviceStatus>>,
) -> Result<HttpResponse, AppError> {
    let updated = db::update_status(&pool, EntityTable::Devices, &req.ids, req.status).await?;
    caches.devices_changed();

    tracing::info!(
        count = updated,
        status = req.status.as_str(),
        "Bulk device status update"
    );
    Ok(HttpResponse::Ok().json(ApiMessage::ok(format!(
        "Updated {} device(s) to {}",
        updated,
        req.status.as_str()
    ))))
}

#[post("/devices/delete")]
pub async fn delete_devices(
    pool: web::Data<PgPool>,
    caches: web::Data<ListCaches>,
    req: web::Json<BulkDeleteRequest>,
) -> Result<HttpResponse, AppError> {
    let deleted = db::delete_entities(&pool, EntityTable::Devices, &req.ids).await?;
    caches.devices_removed();

    tracing::info!(count = deleted, "Bulk device delete");
    Ok(HttpResponse::Ok().json(ApiMessage::ok(format!("Deleted {} device(s)", deleted))))
}
