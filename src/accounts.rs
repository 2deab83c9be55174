// src/accounts.rs
use crate::cache::ListCaches;
use crate::db::{self, EntityTable};
use crate::error::{AppError, ValidationError};
use crate::models::{
    AccountDetail, AccountListQuery, AccountStatus, ApiMessage, BulkDeleteRequest,
    BulkStatusRequest, ImportAccountsRequest, ImportedAccount, TaskStatus,
};
use crate::scenario::SharedScenarios;
use crate::selection::EntityStatus;
use actix_web::{HttpResponse, get, post, web};
use sqlx::PgPool;
use std::collections::HashSet;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_account_stats);
    cfg.service(list_accounts);
    cfg.service(get_account);
    cfg.service(update_account_status);
    cfg.service(delete_accounts);
    cfg.service(import_accounts);
}

/// Parses `username:password[:email]` lines. Blank lines are skipped; any
/// malformed or repeated line rejects the whole list.
pub fn parse_account_list(text: &str) -> Result<Vec<ImportedAccount>, AppError> {
    let mut accounts = Vec::new();
    let mut seen = HashSet::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = index + 1;
        let invalid = |message: &str| {
            AppError::from(ValidationError::new(
                "account_list",
                format!("Line {}: {}", line_no, message),
            ))
        };

        let mut parts = line.splitn(3, ':').map(str::trim);
        let username = parts.next().unwrap_or_default();
        let password = parts.next().unwrap_or_default();
        let email = parts.next().filter(|e| !e.is_empty());

        if username.is_empty() || password.is_empty() {
            return Err(invalid("expected username:password"));
        }
        if email.is_some_and(|e| !e.contains('@')) {
            return Err(invalid("email is not valid"));
        }
        if !seen.insert(username.to_lowercase()) {
            return Err(invalid("username is listed more than once"));
        }

        accounts.push(ImportedAccount {
            username: username.to_string(),
            password: password.to_string(),
            email: email.map(String::from),
        });
    }

    if accounts.is_empty() {
        return Err(AppError::validation(
            "account_list",
            "Enter at least one account",
        ));
    }
    Ok(accounts)
}

#[get("/accounts")]
pub async fn list_accounts(
    pool: web::Data<PgPool>,
    caches: web::Data<ListCaches>,
    query: web::Query<AccountListQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let cache_key = format!("accounts_{:?}", query);
    let generation = caches.accounts.generation();
    if let Some(cached) = caches.accounts.get(generation, &cache_key).await {
        tracing::debug!("Cache hit for key: {}", cache_key);
        return Ok(HttpResponse::Ok().json(cached));
    }

    let page = db::list_accounts(&pool, &query).await?;
    let response = serde_json::json!(page);
    caches.accounts.insert(generation, &cache_key, response.clone()).await;

    Ok(HttpResponse::Ok().json(response))
}

#[get("/accounts/stats")]
pub async fn get_account_stats(
    pool: web::Data<PgPool>,
    caches: web::Data<ListCaches>,
) -> Result<HttpResponse, AppError> {
    let cache_key = "accounts_stats";
    let generation = caches.accounts.generation();
    if let Some(cached) = caches.accounts.get(generation, cache_key).await {
        return Ok(HttpResponse::Ok().json(cached));
    }

    let stats = serde_json::json!(db::get_account_stats(&pool).await?);
    caches.accounts.insert(generation, cache_key, stats.clone()).await;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/accounts/{account_id}")]
pub async fn get_account(
    pool: web::Data<PgPool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let account_id = path.into_inner();
    let account = db::get_account_by_id(&pool, account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {}", account_id)))?;

    let running_tasks = db::get_account_tasks(&pool, account_id, TaskStatus::Running).await?;
    let pending_tasks = db::get_account_tasks(&pool, account_id, TaskStatus::Pending).await?;
    let task_statistics = db::get_task_statistics(&pool, account_id).await?;

    Ok(HttpResponse::Ok().json(AccountDetail {
        account,
        running_tasks,
        pending_tasks,
        task_statistics,
    }))
}

#[post("/accounts/status")]
pub async fn update_account_status(
    pool: web::Data<PgPool>,
    caches: web::Data<ListCaches>,
    req: web::Json<BulkStatusRequest<AccountStatus>>,
) -> Result<HttpResponse, AppError> {
    let updated = db::update_status(&pool, EntityTable::Accounts, &req.ids, req.status).await?;
    caches.accounts_changed();

    tracing::info!(
        count = updated,
        status = req.status.as_str(),
        "Bulk account status update"
    );
    Ok(HttpResponse::Ok().json(ApiMessage::ok(format!(
        "Updated {} account(s) to {}",
        updated,
        req.status.as_str()
    ))))
}

#[post("/accounts/delete")]
pub async fn delete_accounts(
    pool: web::Data<PgPool>,
    caches: web::Data<ListCaches>,
    req: web::Json<BulkDeleteRequest>,
) -> Result<HttpResponse, AppError> {
    let deleted = db::delete_entities(&pool, EntityTable::Accounts, &req.ids).await?;
    caches.accounts_changed();

    tracing::info!(count = deleted, "Bulk account delete");
    Ok(HttpResponse::Ok().json(ApiMessage::ok(format!("Deleted {} account(s)", deleted))))
}

#[post("/accounts/import")]
pub async fn import_accounts(
    pool: web::Data<PgPool>,
    caches: web::Data<ListCaches>,
    scenarios: web::Data<SharedScenarios>,
    req: web::Json<ImportAccountsRequest>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let accounts = parse_account_list(&req.account_list)?;

    let (device_id, scenario_id) = if req.auto_assign {
        let device_id = req.device_id.ok_or_else(|| {
            AppError::validation("device_id", "Choose a device to assign accounts to")
        })?;
        if !db::device_exists(&pool, device_id).await? {
            return Err(AppError::NotFound(format!("Device {}", device_id)));
        }
        if let Some(scenario_id) = req.scenario_id {
            if scenarios.read().await.snapshot().scenario(scenario_id).is_none() {
                return Err(AppError::NotFound(format!("Scenario {}", scenario_id)));
            }
        }
        (Some(device_id), req.scenario_id)
    } else {
        (None, None)
    };

    let usernames: Vec<String> = accounts.iter().map(|a| a.username.clone()).collect();
    let existing = db::find_existing_usernames(&pool, &usernames).await?;
    if let Some(taken) = existing.first() {
        return Err(AppError::validation(
            "account_list",
            format!("Account \"{}\" already exists", taken),
        ));
    }

    let status = if req.enable_running_status {
        AccountStatus::Active
    } else {
        AccountStatus::Inactive
    };
    let imported = db::import_accounts(&pool, &accounts, status, device_id, scenario_id).await?;
    caches.accounts_changed();

    tracing::info!(count = imported, status = status.as_str(), "Imported accounts");
    Ok(HttpResponse::Ok().json(ApiMessage::ok(format!(
        "Imported {} account(s)",
        imported
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let accounts =
            parse_account_list("alice:pw1\n\n  bob : pw2 : bob@mail.com  \r\n").unwrap();
        assert_eq!(
            accounts,
            vec![
                ImportedAccount {
                    username: "alice".to_string(),
                    password: "pw1".to_string(),
                    email: None,
                },
                ImportedAccount {
                    username: "bob".to_string(),
                    password: "pw2".to_string(),
                    email: Some("bob@mail.com".to_string()),
                },
            ]
        );
    }

    #[test]
    fn malformed_line_rejects_everything() {
        let err = parse_account_list("alice:pw1\ncarol\n").unwrap_err();
        assert_eq!(err.to_string(), "Line 2: expected username:password");
        assert_eq!(err.first_field(), Some("account_list"));
    }

    #[test]
    fn duplicates_and_bad_emails_are_rejected() {
        assert_eq!(
            parse_account_list("a:1\nA:2").unwrap_err().to_string(),
            "Line 2: username is listed more than once"
        );
        assert_eq!(
            parse_account_list("a:1:not-an-email").unwrap_err().to_string(),
            "Line 1: email is not valid"
        );
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(parse_account_list(" \n \n").is_err());
    }
}
