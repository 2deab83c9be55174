// src/db.rs
use crate::error::AppError;
use crate::models::{
    AccountListQuery, AccountStats, AccountStatus, AccountTask, Device, DeviceListQuery,
    DeviceStats, ImportedAccount, Page, TaskStatistics, TaskStatus, TiktokAccount,
};
use crate::selection::{EntityStatus, check_bulk_transition};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

pub const MAX_PER_PAGE: i64 = 100;
const DEFAULT_PER_PAGE: i64 = 20;

pub const DEVICE_SORT_FIELDS: &[&str] = &[
    "id",
    "device_name",
    "device_type",
    "platform",
    "status",
    "last_active_at",
    "created_at",
];

pub const ACCOUNT_SORT_FIELDS: &[&str] = &["id", "username", "email", "status", "created_at"];

/// Tables that support bulk status updates and deletes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityTable {
    Devices,
    Accounts,
}

impl EntityTable {
    fn name(self) -> &'static str {
        match self {
            EntityTable::Devices => "devices",
            EntityTable::Accounts => "tiktok_accounts",
        }
    }

    fn entity(self) -> &'static str {
        match self {
            EntityTable::Devices => "Device",
            EntityTable::Accounts => "Account",
        }
    }
}

/// Returns `(limit, offset)` for a 1-based page request.
pub fn paging(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let page = page.unwrap_or(1).max(1);
    // Huge pages saturate to an offset past every row instead of overflowing.
    (per_page, (page - 1).saturating_mul(per_page))
}

/// Builds an ORDER BY clause from `field` or `-field`. Unknown fields fall
/// back to newest first.
pub fn sort_clause(sort: Option<&str>, allowed: &[&str]) -> String {
    let requested = sort.map(str::trim).unwrap_or_default();
    let (field, direction) = match requested.strip_prefix('-') {
        Some(field) => (field, "DESC"),
        None => (requested, "ASC"),
    };
    if allowed.contains(&field) {
        format!("{} {}, id ASC", field, direction)
    } else {
        "created_at DESC, id ASC".to_string()
    }
}

fn search_pattern(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
}

fn push_device_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &DeviceListQuery) {
    builder.push(" WHERE 1=1");
    if let Some(pattern) = search_pattern(&query.search) {
        builder.push(" AND (device_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR platform ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(platform) = &query.platform {
        builder.push(" AND platform = ");
        builder.push_bind(platform.clone());
    }
    if let Some(is_online) = query.is_online {
        builder.push(" AND is_online = ");
        builder.push_bind(is_online);
    }
}

pub async fn list_devices(pool: &PgPool, query: &DeviceListQuery) -> Result<Page<Device>, sqlx::Error> {
    let (limit, offset) = paging(query.page, query.per_page);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM devices");
    push_device_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new(
        "SELECT id, device_name, device_type, platform, status, is_online, last_active_at, created_at, owner AS \"user\" FROM devices",
    );
    push_device_filters(&mut select, query);
    select.push(" ORDER BY ");
    select.push(sort_clause(query.sort.as_deref(), DEVICE_SORT_FIELDS));
    select.push(" LIMIT ");
    select.push_bind(limit);
    select.push(" OFFSET ");
    select.push_bind(offset);

    let list = select.build_query_as::<Device>().fetch_all(pool).await?;
    Ok(Page { list, total })
}

pub async fn get_device_stats(pool: &PgPool) -> Result<DeviceStats, sqlx::Error> {
    sqlx::query_as::<_, DeviceStats>(
        "SELECT COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE status = 'active') AS active, \
         COUNT(*) FILTER (WHERE status = 'inactive') AS inactive, \
         COUNT(*) FILTER (WHERE status = 'blocked') AS blocked, \
         COUNT(*) FILTER (WHERE is_online) AS online \
         FROM devices",
    )
    .fetch_one(pool)
    .await
}

pub async fn device_exists(pool: &PgPool, device_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM devices WHERE id = $1)")
        .bind(device_id)
        .fetch_one(pool)
        .await
}

fn push_account_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &AccountListQuery) {
    builder.push(" WHERE 1=1");
    if let Some(pattern) = search_pattern(&query.search) {
        builder.push(" AND (username ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR phone_number ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
}

const ACCOUNT_COLUMNS: &str = "id, username, email, phone_number, status, two_factor_enabled, device_id, scenario_id, created_at";

pub async fn list_accounts(
    pool: &PgPool,
    query: &AccountListQuery,
) -> Result<Page<TiktokAccount>, sqlx::Error> {
    let (limit, offset) = paging(query.page, query.per_page);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tiktok_accounts");
    push_account_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new(format!(
        "SELECT {} FROM tiktok_accounts",
        ACCOUNT_COLUMNS
    ));
    push_account_filters(&mut select, query);
    select.push(" ORDER BY ");
    select.push(sort_clause(query.sort.as_deref(), ACCOUNT_SORT_FIELDS));
    select.push(" LIMIT ");
    select.push_bind(limit);
    select.push(" OFFSET ");
    select.push_bind(offset);

    let list = select
        .build_query_as::<TiktokAccount>()
        .fetch_all(pool)
        .await?;
    Ok(Page { list, total })
}

pub async fn get_account_stats(pool: &PgPool) -> Result<AccountStats, sqlx::Error> {
    sqlx::query_as::<_, AccountStats>(
        "SELECT COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE status = 'active') AS active, \
         COUNT(*) FILTER (WHERE status = 'inactive') AS inactive, \
         COUNT(*) FILTER (WHERE status = 'suspended') AS suspended \
         FROM tiktok_accounts",
    )
    .fetch_one(pool)
    .await
}

pub async fn get_account_by_id(
    pool: &PgPool,
    account_id: i64,
) -> Result<Option<TiktokAccount>, sqlx::Error> {
    sqlx::query_as::<_, TiktokAccount>(&format!(
        "SELECT {} FROM tiktok_accounts WHERE id = $1",
        ACCOUNT_COLUMNS
    ))
    .bind(account_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_account_tasks(
    pool: &PgPool,
    account_id: i64,
    status: TaskStatus,
) -> Result<Vec<AccountTask>, sqlx::Error> {
    sqlx::query_as::<_, AccountTask>(
        "SELECT id, account_id, task_type, status, progress, started_at, created_at FROM account_tasks WHERE account_id = $1 AND status = $2 ORDER BY created_at ASC",
    )
    .bind(account_id)
    .bind(status)
    .fetch_all(pool)
    .await
}

pub async fn get_task_statistics(
    pool: &PgPool,
    account_id: i64,
) -> Result<TaskStatistics, sqlx::Error> {
    sqlx::query_as::<_, TaskStatistics>(
        "SELECT COUNT(*) AS total, \
         COUNT(*) FILTER (WHERE status = 'completed') AS completed, \
         COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
         COUNT(*) FILTER (WHERE status = 'running') AS running, \
         COUNT(*) FILTER (WHERE status = 'pending') AS pending \
         FROM account_tasks WHERE account_id = $1",
    )
    .bind(account_id)
    .fetch_one(pool)
    .await
}

/// Sets `status` on every id or on none of them.
pub async fn update_status<S>(
    pool: &PgPool,
    table: EntityTable,
    ids: &[i64],
    status: S,
) -> Result<u64, AppError>
where
    S: EntityStatus
        + sqlx::Type<Postgres>
        + for<'r> sqlx::Decode<'r, Postgres>
        + for<'q> sqlx::Encode<'q, Postgres>
        + Unpin,
{
    let mut tx = pool.begin().await?;

    let current: Vec<(i64, S)> = sqlx::query_as(&format!(
        "SELECT id, status FROM {} WHERE id = ANY($1) FOR UPDATE",
        table.name()
    ))
    .bind(ids)
    .fetch_all(&mut *tx)
    .await?;
    check_bulk_transition(&current, ids, status)?;

    let result = sqlx::query(&format!(
        "UPDATE {} SET status = $1 WHERE id = ANY($2)",
        table.name()
    ))
    .bind(status)
    .bind(ids)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.rows_affected())
}

/// Deletes every id or none of them.
pub async fn delete_entities(pool: &PgPool, table: EntityTable, ids: &[i64]) -> Result<u64, AppError> {
    if ids.is_empty() {
        return Err(AppError::validation(
            "ids",
            format!("Select at least one {}", table.entity().to_lowercase()),
        ));
    }

    let mut tx = pool.begin().await?;

    let existing: Vec<i64> = sqlx::query_scalar(&format!(
        "SELECT id FROM {} WHERE id = ANY($1) FOR UPDATE",
        table.name()
    ))
    .bind(ids)
    .fetch_all(&mut *tx)
    .await?;
    if let Some(missing) = ids.iter().find(|id| !existing.contains(id)) {
        return Err(AppError::NotFound(format!("{} {}", table.entity(), missing)));
    }

    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ANY($1)", table.name()))
        .bind(ids)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected())
}

pub async fn find_existing_usernames(
    pool: &PgPool,
    usernames: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT username FROM tiktok_accounts WHERE username = ANY($1)")
        .bind(usernames)
        .fetch_all(pool)
        .await
}

pub async fn import_accounts(
    pool: &PgPool,
    accounts: &[ImportedAccount],
    status: AccountStatus,
    device_id: Option<i64>,
    scenario_id: Option<Uuid>,
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    for account in accounts {
        sqlx::query("INSERT INTO tiktok_accounts (username, password, email, status, device_id, scenario_id) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(&account.username)
            .bind(&account.password)
            .bind(&account.email)
            .bind(status)
            .bind(device_id)
            .bind(scenario_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(accounts.len() as u64)
}
