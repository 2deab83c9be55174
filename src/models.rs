// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "device_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Blocked,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct Device {
    pub id: i64,
    pub device_name: String,
    pub device_type: String,
    pub platform: String,
    pub status: DeviceStatus,
    pub is_online: bool,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub user: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct TiktokAccount {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub status: AccountStatus,
    pub two_factor_enabled: bool,
    pub device_id: Option<i64>,
    pub scenario_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, FromRow)]
pub struct AccountTask {
    pub id: i64,
    pub account_id: i64,
    pub task_type: String,
    pub status: TaskStatus,
    pub progress: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct TaskStatistics {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub running: i64,
    pub pending: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AccountDetail {
    #[serde(flatten)]
    pub account: TiktokAccount,
    pub running_tasks: Vec<AccountTask>,
    pub pending_tasks: Vec<AccountTask>,
    pub task_statistics: TaskStatistics,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct DeviceStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub blocked: i64,
    pub online: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct AccountStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub suspended: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DeviceListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub sort: Option<String>,
    pub search: Option<String>,
    pub status: Option<DeviceStatus>,
    pub platform: Option<String>,
    pub is_online: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AccountListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub sort: Option<String>,
    pub search: Option<String>,
    pub status: Option<AccountStatus>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub total: i64,
}

/// Outcome of a mutating call. `message` is rendered to the user as-is.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BulkStatusRequest<S> {
    pub ids: Vec<i64>,
    pub status: S,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ImportAccountsRequest {
    pub account_list: String,
    #[serde(default)]
    pub enable_running_status: bool,
    #[serde(default)]
    pub auto_assign: bool,
    pub device_id: Option<i64>,
    pub scenario_id: Option<Uuid>,
}

/// One parsed line of an account import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedAccount {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}
