// src/store.rs
use crate::error::AppError;
use crate::models::{
    AccountStatus, ApiMessage, BulkDeleteRequest, BulkStatusRequest, Device, DeviceStatus, Page,
    TiktokAccount,
};
use crate::selection::{EntityStatus, SelectionSet};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

pub trait Entity: Clone + DeserializeOwned + Send + Sync + 'static {
    type Status: EntityStatus;

    /// Path segment of the REST resource, e.g. `devices`.
    const RESOURCE: &'static str;

    fn id(&self) -> i64;
}

impl Entity for Device {
    type Status = DeviceStatus;
    const RESOURCE: &'static str = "devices";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for TiktokAccount {
    type Status = AccountStatus;
    const RESOURCE: &'static str = "accounts";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PageQuery {
    pub page: i64,
    pub per_page: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Extra resource-specific filters such as `status=active`.
    #[serde(skip)]
    pub filters: Vec<(String, String)>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
            sort: None,
            search: None,
            filters: Vec::new(),
        }
    }
}

#[async_trait]
pub trait EntityBackend<E: Entity>: Send + Sync {
    async fn fetch(&self, query: &PageQuery) -> Result<Page<E>, AppError>;
    async fn update_status(&self, ids: &[i64], status: E::Status) -> Result<ApiMessage, AppError>;
    async fn delete(&self, ids: &[i64]) -> Result<ApiMessage, AppError>;
}

pub struct RestBackend<E> {
    client: reqwest::Client,
    base_url: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> RestBackend<E> {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            _entity: PhantomData,
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, E::RESOURCE, suffix)
    }
}

// Error replies carry `{success: false, message}`; anything else is reported
// with the HTTP status only.
async fn read_message(response: reqwest::Response) -> Result<ApiMessage, AppError> {
    let status = response.status();
    match response.json::<ApiMessage>().await {
        Ok(mut message) => {
            if !status.is_success() {
                message.success = false;
            }
            Ok(message)
        }
        Err(_) if !status.is_success() => Ok(ApiMessage::failed(format!(
            "Request failed with status {}",
            status
        ))),
        Err(e) => Err(AppError::from(e)),
    }
}

#[async_trait]
impl<E: Entity> EntityBackend<E> for RestBackend<E> {
    async fn fetch(&self, query: &PageQuery) -> Result<Page<E>, AppError> {
        let response = self
            .client
            .get(self.url(""))
            .query(query)
            .query(&query.filters)
            .send()
            .await?;
        if !response.status().is_success() {
            let message = read_message(response).await?;
            return Err(AppError::Backend(message.message));
        }
        Ok(response.json::<Page<E>>().await?)
    }

    async fn update_status(&self, ids: &[i64], status: E::Status) -> Result<ApiMessage, AppError> {
        let body = BulkStatusRequest {
            ids: ids.to_vec(),
            status,
        };
        let response = self
            .client
            .post(self.url("/status"))
            .json(&body)
            .send()
            .await?;
        read_message(response).await
    }

    async fn delete(&self, ids: &[i64]) -> Result<ApiMessage, AppError> {
        let body = BulkDeleteRequest { ids: ids.to_vec() };
        let response = self
            .client
            .post(self.url("/delete"))
            .json(&body)
            .send()
            .await?;
        read_message(response).await
    }
}

#[derive(Clone, Debug)]
pub struct ListState<E> {
    pub items: Vec<E>,
    pub total: i64,
    pub query: PageQuery,
    pub selection: SelectionSet,
    /// Set when a confirmed mutation could not be followed by a refetch.
    pub stale: bool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ListStore<E: Entity, B: EntityBackend<E>> {
    backend: B,
    state: RwLock<ListState<E>>,
    busy: AtomicBool,
    detached: AtomicBool,
}

impl<E: Entity, B: EntityBackend<E>> ListStore<E, B> {
    pub fn new(backend: B, query: PageQuery) -> Self {
        Self {
            backend,
            state: RwLock::new(ListState {
                items: Vec::new(),
                total: 0,
                query,
                selection: SelectionSet::new(),
                stale: false,
            }),
            busy: AtomicBool::new(false),
            detached: AtomicBool::new(false),
        }
    }

    pub async fn snapshot(&self) -> ListState<E> {
        self.state.read().await.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Stops applying responses to this store. Requests already in flight
    /// still complete, but their results are dropped.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<BusyGuard<'_>, AppError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Busy)?;
        Ok(BusyGuard(&self.busy))
    }

    pub async fn toggle_selection(&self, id: i64) -> bool {
        self.state.write().await.selection.toggle(id)
    }

    pub async fn select_all(&self) {
        let mut state = self.state.write().await;
        let ids: Vec<i64> = state.items.iter().map(|e| e.id()).collect();
        state.selection.select_all(ids);
    }

    pub async fn clear_selection(&self) {
        self.state.write().await.selection.clear();
    }

    // The previous query is restored if the load fails.
    pub async fn set_query(&self, query: PageQuery) -> Result<(), AppError> {
        let _guard = self.begin()?;
        let previous = std::mem::replace(&mut self.state.write().await.query, query);
        if let Err(e) = self.reload().await {
            self.state.write().await.query = previous;
            return Err(e);
        }
        Ok(())
    }

    pub async fn refresh(&self) -> Result<(), AppError> {
        let _guard = self.begin()?;
        self.reload().await
    }

    async fn reload(&self) -> Result<(), AppError> {
        let query = self.state.read().await.query.clone();
        let page = self.backend.fetch(&query).await?;
        if self.is_detached() {
            tracing::debug!("List store detached, dropping {} page", E::RESOURCE);
            return Ok(());
        }

        let mut state = self.state.write().await;
        let present: Vec<i64> = page.list.iter().map(|e| e.id()).collect();
        state.selection.retain_present(&present);
        state.items = page.list;
        state.total = page.total;
        state.stale = false;
        Ok(())
    }

    /// Moves every selected entity to `status`. On failure neither the
    /// selection nor the cached page changes.
    pub async fn apply_bulk_status(&self, status: E::Status) -> Result<String, AppError> {
        let _guard = self.begin()?;
        let ids = self.selected_ids().await?;

        let reply = self.backend.update_status(&ids, status).await?;
        self.finish_bulk(reply).await
    }

    pub async fn delete_selected(&self) -> Result<String, AppError> {
        let _guard = self.begin()?;
        let ids = self.selected_ids().await?;

        let reply = self.backend.delete(&ids).await?;
        self.finish_bulk(reply).await
    }

    async fn selected_ids(&self) -> Result<Vec<i64>, AppError> {
        let ids = self.state.read().await.selection.ids();
        if ids.is_empty() {
            let entity = <E::Status as EntityStatus>::ENTITY;
            return Err(AppError::validation(
                "ids",
                format!("Select at least one {}", entity),
            ));
        }
        Ok(ids)
    }

    // The backend has the final word: once it confirms, the call succeeded
    // even if the refetch below fails.
    async fn finish_bulk(&self, reply: ApiMessage) -> Result<String, AppError> {
        if !reply.success {
            tracing::warn!("Bulk {} request rejected: {}", E::RESOURCE, reply.message);
            return Err(AppError::Backend(reply.message));
        }
        if self.is_detached() {
            return Ok(reply.message);
        }

        let refetched = self.reload().await;
        let mut state = self.state.write().await;
        state.selection.clear();
        if let Err(e) = refetched {
            tracing::warn!("Refetching {} after bulk update failed: {}", E::RESOURCE, e);
            state.stale = true;
        }
        Ok(reply.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn device(id: i64, status: DeviceStatus) -> Device {
        Device {
            id,
            device_name: format!("Pixel {}", id),
            device_type: "phone".to_string(),
            platform: "android".to_string(),
            status,
            is_online: true,
            last_active_at: None,
            created_at: Utc::now(),
            user: None,
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        devices: Mutex<Vec<Device>>,
        reject_with: Option<String>,
        gate: Option<Arc<Notify>>,
        status_calls: Mutex<usize>,
        fetch_calls: Mutex<usize>,
        // Fetches from this call number on (1-based) fail.
        fail_fetch_from: Option<usize>,
    }

    impl FakeBackend {
        fn with(devices: Vec<Device>) -> Self {
            Self {
                devices: Mutex::new(devices),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl EntityBackend<Device> for FakeBackend {
        async fn fetch(&self, query: &PageQuery) -> Result<Page<Device>, AppError> {
            let call = {
                let mut calls = self.fetch_calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if self.fail_fetch_from.is_some_and(|from| call >= from) {
                return Err(AppError::Network("connection reset".to_string()));
            }
            let list: Vec<Device> = self
                .devices
                .lock()
                .unwrap()
                .iter()
                .filter(|d| query.search.as_deref().is_none_or(|s| d.device_name.contains(s)))
                .cloned()
                .collect();
            let total = list.len() as i64;
            Ok(Page { list, total })
        }

        async fn update_status(
            &self,
            ids: &[i64],
            status: DeviceStatus,
        ) -> Result<ApiMessage, AppError> {
            *self.status_calls.lock().unwrap() += 1;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(message) = &self.reject_with {
                return Ok(ApiMessage::failed(message.clone()));
            }
            for d in self.devices.lock().unwrap().iter_mut() {
                if ids.contains(&d.id) {
                    d.status = status;
                }
            }
            Ok(ApiMessage::ok(format!("Updated {} device(s)", ids.len())))
        }

        async fn delete(&self, ids: &[i64]) -> Result<ApiMessage, AppError> {
            self.devices.lock().unwrap().retain(|d| !ids.contains(&d.id));
            Ok(ApiMessage::ok(format!("Deleted {} device(s)", ids.len())))
        }
    }

    #[tokio::test]
    async fn bulk_block_then_refetch() {
        let backend = FakeBackend::with(vec![
            device(1, DeviceStatus::Active),
            device(2, DeviceStatus::Active),
        ]);
        let store = ListStore::new(backend, PageQuery::default());
        store.refresh().await.unwrap();
        store.select_all().await;

        let message = store.apply_bulk_status(DeviceStatus::Blocked).await.unwrap();
        assert_eq!(message, "Updated 2 device(s)");

        let state = store.snapshot().await;
        assert!(state.items.iter().all(|d| d.status == DeviceStatus::Blocked));
        assert!(state.selection.is_empty());
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn failure_keeps_selection_and_cache() {
        let backend = FakeBackend {
            reject_with: Some("Device 2 is locked by a running task".to_string()),
            ..FakeBackend::with(vec![device(1, DeviceStatus::Active), device(2, DeviceStatus::Active)])
        };
        let store = ListStore::new(backend, PageQuery::default());
        store.refresh().await.unwrap();
        store.toggle_selection(2).await;

        let err = store.apply_bulk_status(DeviceStatus::Inactive).await.unwrap_err();
        assert_eq!(err.user_message(), "Device 2 is locked by a running task");

        let state = store.snapshot().await;
        assert_eq!(state.selection.ids(), vec![2]);
        assert!(state.items.iter().all(|d| d.status == DeviceStatus::Active));
        assert_eq!(state.total, 2);
        assert!(!state.stale);
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn confirmed_update_survives_a_failed_refetch() {
        let backend = FakeBackend {
            fail_fetch_from: Some(2),
            ..FakeBackend::with(vec![device(1, DeviceStatus::Active), device(2, DeviceStatus::Active)])
        };
        let store = ListStore::new(backend, PageQuery::default());
        store.refresh().await.unwrap();
        store.select_all().await;

        let message = store.apply_bulk_status(DeviceStatus::Blocked).await.unwrap();
        assert_eq!(message, "Updated 2 device(s)");

        let state = store.snapshot().await;
        assert!(state.stale);
        assert!(state.selection.is_empty());
        assert_eq!(state.total, 2);
        assert!(
            store
                .backend
                .devices
                .lock()
                .unwrap()
                .iter()
                .all(|d| d.status == DeviceStatus::Blocked)
        );
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn set_query_loads_the_new_page() {
        let store = ListStore::new(
            FakeBackend::with(vec![device(1, DeviceStatus::Active), device(2, DeviceStatus::Active)]),
            PageQuery::default(),
        );
        store.refresh().await.unwrap();
        store.select_all().await;

        let query = PageQuery {
            search: Some("Pixel 2".to_string()),
            ..PageQuery::default()
        };
        store.set_query(query.clone()).await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.query, query);
        assert_eq!(state.total, 1);
        assert_eq!(state.selection.ids(), vec![2]);
    }

    #[tokio::test]
    async fn set_query_keeps_previous_query_when_fetch_fails() {
        let backend = FakeBackend {
            fail_fetch_from: Some(2),
            ..FakeBackend::with(vec![device(1, DeviceStatus::Active)])
        };
        let store = ListStore::new(backend, PageQuery::default());
        store.refresh().await.unwrap();

        let query = PageQuery {
            page: 2,
            ..PageQuery::default()
        };
        assert!(store.set_query(query).await.is_err());

        let state = store.snapshot().await;
        assert_eq!(state.query, PageQuery::default());
        assert_eq!(state.items.len(), 1);
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn set_query_while_busy_changes_nothing() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some(gate.clone()),
            ..FakeBackend::with(vec![device(1, DeviceStatus::Active)])
        };
        let store = Arc::new(ListStore::new(backend, PageQuery::default()));
        store.refresh().await.unwrap();
        store.toggle_selection(1).await;

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.apply_bulk_status(DeviceStatus::Inactive).await })
        };
        while !store.is_busy() {
            tokio::task::yield_now().await;
        }

        let query = PageQuery {
            page: 3,
            ..PageQuery::default()
        };
        assert!(matches!(store.set_query(query).await, Err(AppError::Busy)));
        assert_eq!(store.snapshot().await.query, PageQuery::default());

        gate.notify_one();
        pending.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn empty_selection_is_rejected_without_a_call() {
        let store = ListStore::new(FakeBackend::with(vec![device(1, DeviceStatus::Active)]), PageQuery::default());
        let err = store.apply_bulk_status(DeviceStatus::Blocked).await.unwrap_err();
        assert_eq!(err.first_field(), Some("ids"));
        assert_eq!(*store.backend.status_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn second_submission_while_busy_is_refused() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some(gate.clone()),
            ..FakeBackend::with(vec![device(1, DeviceStatus::Active)])
        };
        let store = Arc::new(ListStore::new(backend, PageQuery::default()));
        store.refresh().await.unwrap();
        store.toggle_selection(1).await;

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.apply_bulk_status(DeviceStatus::Inactive).await })
        };
        while !store.is_busy() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            store.apply_bulk_status(DeviceStatus::Blocked).await,
            Err(AppError::Busy)
        ));

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(*store.backend.status_calls.lock().unwrap(), 1);
        assert!(!store.is_busy());
    }

    #[tokio::test]
    async fn detached_store_ignores_late_responses() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            gate: Some(gate.clone()),
            ..FakeBackend::with(vec![device(1, DeviceStatus::Active)])
        };
        let store = Arc::new(ListStore::new(backend, PageQuery::default()));
        store.refresh().await.unwrap();
        store.toggle_selection(1).await;

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.apply_bulk_status(DeviceStatus::Inactive).await })
        };
        while !store.is_busy() {
            tokio::task::yield_now().await;
        }
        store.detach();
        gate.notify_one();
        pending.await.unwrap().unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.items[0].status, DeviceStatus::Active);
        assert_eq!(state.selection.ids(), vec![1]);
    }

    #[tokio::test]
    async fn delete_selected_refetches() {
        let backend = FakeBackend::with(vec![
            device(1, DeviceStatus::Active),
            device(2, DeviceStatus::Inactive),
        ]);
        let store = ListStore::new(backend, PageQuery::default());
        store.refresh().await.unwrap();
        store.toggle_selection(1).await;

        store.delete_selected().await.unwrap();
        let state = store.snapshot().await;
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.total, 1);
        assert_eq!(state.items[0].id, 2);
    }

    #[test]
    fn rest_urls() {
        let backend: RestBackend<Device> =
            RestBackend::new(reqwest::Client::new(), "http://localhost:8080/");
        assert_eq!(backend.url("/status"), "http://localhost:8080/devices/status");
        let accounts: RestBackend<TiktokAccount> =
            RestBackend::new(reqwest::Client::new(), "http://localhost:8080");
        assert_eq!(accounts.url(""), "http://localhost:8080/accounts");
    }
}
