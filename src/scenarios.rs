// src/scenarios.rs
use crate::action_config::ActionConfig;
use crate::error::AppError;
use crate::registry::{self, ActionDefinition, ActionType, Category};
use crate::scenario::{ScenarioStatus, SharedScenarios};
use actix_web::{HttpResponse, delete, get, patch, post, put, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_catalog);
    cfg.service(get_default_config);
    cfg.service(list_scenarios);
    cfg.service(create_scenario);
    cfg.service(update_scenario);
    cfg.service(delete_scenario);
    cfg.service(select_scenario);
    cfg.service(add_action);
    cfg.service(update_action);
    cfg.service(update_action_field);
    cfg.service(delete_action);
}

#[derive(Serialize)]
struct CatalogCategory {
    category: Category,
    label: &'static str,
    actions: Vec<&'static ActionDefinition>,
}

#[derive(Serialize, Deserialize)]
pub struct CreateScenarioRequest {
    pub name: String,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateScenarioRequest {
    pub name: Option<String>,
    pub status: Option<ScenarioStatus>,
}

#[derive(Serialize, Deserialize)]
pub struct AddActionRequest {
    pub action_type: ActionType,
    pub name: Option<String>,
    pub config: ActionConfig,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateActionRequest {
    pub config: ActionConfig,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateActionFieldRequest {
    pub path: String,
    pub value: Value,
}

#[get("/actions/catalog")]
pub async fn get_catalog() -> HttpResponse {
    let catalog: Vec<CatalogCategory> = registry::list_categories()
        .iter()
        .map(|&category| CatalogCategory {
            category,
            label: category.label(),
            actions: category.list_actions(),
        })
        .collect();
    HttpResponse::Ok().json(catalog)
}

#[get("/actions/catalog/{action_type}/default")]
pub async fn get_default_config(path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let action_type: ActionType = path.into_inner().parse()?;
    let definition = registry::select(action_type)?;
    Ok(HttpResponse::Ok().json(json!({
        "action_type": action_type,
        "name": definition.name,
        "config": definition.default_config(),
        "is_new": true,
    })))
}

#[get("/scenarios")]
pub async fn list_scenarios(store: web::Data<SharedScenarios>) -> HttpResponse {
    let snapshot = store.read().await.snapshot();
    HttpResponse::Ok().json(&*snapshot)
}

#[post("/scenarios")]
pub async fn create_scenario(
    store: web::Data<SharedScenarios>,
    req: web::Json<CreateScenarioRequest>,
) -> Result<HttpResponse, AppError> {
    let scenario = store.write().await.create_scenario(&req.name)?;
    tracing::info!(scenario_id = %scenario.id, "Scenario created");
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": format!("Scenario \"{}\" created", scenario.name),
        "scenario": scenario,
    })))
}

#[put("/scenarios/{scenario_id}")]
pub async fn update_scenario(
    store: web::Data<SharedScenarios>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateScenarioRequest>,
) -> Result<HttpResponse, AppError> {
    let scenario_id = path.into_inner();
    let req = req.into_inner();
    let mut store = store.write().await;

    // Validate the rename before touching the status so a bad name changes nothing.
    let mut scenario = match req.name {
        Some(name) => store.rename_scenario(scenario_id, &name)?,
        None => store
            .snapshot()
            .scenario(scenario_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Scenario {}", scenario_id)))?,
    };
    if let Some(status) = req.status {
        scenario = store.set_status(scenario_id, status)?;
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Scenario \"{}\" updated", scenario.name),
        "scenario": scenario,
    })))
}

#[delete("/scenarios/{scenario_id}")]
pub async fn delete_scenario(
    store: web::Data<SharedScenarios>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let removed = store.write().await.delete_scenario(path.into_inner())?;
    tracing::info!(
        scenario_id = %removed.id,
        actions = removed.actions.len(),
        "Scenario deleted"
    );
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Scenario \"{}\" deleted", removed.name),
    })))
}

#[post("/scenarios/{scenario_id}/select")]
pub async fn select_scenario(
    store: web::Data<SharedScenarios>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let scenario_id = path.into_inner();
    store.write().await.select_scenario(scenario_id)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Scenario selected",
        "selected_id": scenario_id,
    })))
}

#[post("/scenarios/{scenario_id}/actions")]
pub async fn add_action(
    store: web::Data<SharedScenarios>,
    path: web::Path<Uuid>,
    req: web::Json<AddActionRequest>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let action = store
        .write()
        .await
        .add_action(path.into_inner(), req.action_type, req.name, req.config)?;
    tracing::info!(
        action_id = %action.id,
        action_type = %action.action_type,
        "Action added"
    );
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": format!("Action \"{}\" added", action.name),
        "action": action,
    })))
}

#[put("/actions/{action_id}")]
pub async fn update_action(
    store: web::Data<SharedScenarios>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateActionRequest>,
) -> Result<HttpResponse, AppError> {
    let action = store
        .write()
        .await
        .update_action_config(path.into_inner(), req.into_inner().config)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Action \"{}\" saved", action.name),
        "action": action,
    })))
}

#[patch("/actions/{action_id}")]
pub async fn update_action_field(
    store: web::Data<SharedScenarios>,
    path: web::Path<Uuid>,
    req: web::Json<UpdateActionFieldRequest>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let action = store
        .write()
        .await
        .update_action_field(path.into_inner(), &req.path, req.value)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Action \"{}\" saved", action.name),
        "action": action,
    })))
}

#[delete("/actions/{action_id}")]
pub async fn delete_action(
    store: web::Data<SharedScenarios>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let removed = store.write().await.remove_action(path.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Action \"{}\" deleted", removed.name),
    })))
}
