//! 注册表：有序的资源集合，负责一次性初始化并把推送分发到各实体。

use crate::command::CommandFacade;
use crate::error::{Result, SyncError};
use crate::models::{PushRecord, ResourceConfig, ResourcePatch};
use crate::push::{PushChannel, Subscription, SERVICES_UPDATE};
use crate::resource::Resource;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

mod views;

pub use views::Counts;

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// 订阅的推送主题
    pub topic: String,
    /// 初始化成功后并发刷新目录指标
    pub refresh_directories_on_init: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            topic: SERVICES_UPDATE.to_string(),
            refresh_directories_on_init: true,
        }
    }
}

/// 按来源顺序保存的条目；推送不会改变顺序。
#[derive(Default)]
struct Items {
    order: Vec<String>,
    map: HashMap<String, Resource>,
}

impl Items {
    fn insert(&mut self, id: String, resource: Resource) {
        if self.map.insert(id.clone(), resource).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: &str) -> Option<Resource> {
        let removed = self.map.remove(id)?;
        self.order.retain(|k| k != id);
        Some(removed)
    }

    fn remove_entity(&mut self, resource: &Resource) -> bool {
        let key = self
            .map
            .iter()
            .find(|(_, r)| r.same_entity(resource))
            .map(|(k, _)| k.clone());
        match key {
            Some(key) => self.remove(&key).is_some(),
            None => false,
        }
    }

    fn rekey(&mut self, old: &str, new: &str) {
        if old == new {
            return;
        }
        let Some(resource) = self.map.remove(old) else {
            return;
        };
        if self.map.contains_key(new) {
            // 目标键已存在：沿用其位置，去掉旧键
            self.order.retain(|k| k != old);
        } else if let Some(slot) = self.order.iter_mut().find(|k| k.as_str() == old) {
            *slot = new.to_string();
        }
        self.map.insert(new.to_string(), resource);
    }

    fn ordered(&self) -> Vec<Resource> {
        self.order
            .iter()
            .filter_map(|id| self.map.get(id).cloned())
            .collect()
    }
}

struct RegistryInner {
    facade: CommandFacade,
    options: RegistryOptions,
    items: StdMutex<Items>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
    revision: Arc<watch::Sender<u64>>,
    subscription: StdMutex<Option<Subscription>>,
}

/// 资源注册表句柄，克隆后共享同一份集合。
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("topic", &self.inner.options.topic)
            .field("len", &self.len())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// 创建注册表并订阅推送主题；订阅持续到注册表被释放。需要在 tokio 运行时内调用。
    pub fn new(facade: CommandFacade, channel: &PushChannel, options: RegistryOptions) -> Self {
        let (revision, _) = watch::channel(0_u64);
        let registry = Self {
            inner: Arc::new(RegistryInner {
                facade,
                options,
                items: StdMutex::new(Items::default()),
                initialized: AtomicBool::new(false),
                init_lock: Mutex::new(()),
                revision: Arc::new(revision),
                subscription: StdMutex::new(None),
            }),
        };

        let weak: Weak<RegistryInner> = Arc::downgrade(&registry.inner);
        let lag_weak = weak.clone();
        let subscription = channel.subscribe_with_lag(
            &registry.inner.options.topic,
            move |batch| {
                if let Some(inner) = weak.upgrade() {
                    Registry { inner }.apply_batch(batch);
                }
            },
            move |_skipped| {
                if let Some(inner) = lag_weak.upgrade() {
                    let registry = Registry { inner };
                    tokio::spawn(async move { registry.resync().await });
                }
            },
        );
        *registry
            .inner
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(subscription);
        registry
    }

    fn items_guard(&self) -> std::sync::MutexGuard<'_, Items> {
        self.inner.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    fn resource(&self, config: ResourceConfig) -> Resource {
        Resource::attached(config, self.inner.facade.clone(), self.inner.revision.clone())
    }

    /// 路由一批推送：按批内顺序逐条应用，同 id 的后一条覆盖前一条；未知 id 丢弃。
    pub fn apply_batch(&self, batch: &[PushRecord]) {
        for record in batch {
            match self.get(&record.id) {
                Some(resource) => resource.update(record),
                None => debug!(resource_id = %record.id, "push for unknown resource dropped"),
            }
        }
    }

    /// 拉取服务与目录并填充注册表。两路都成功才提交；成功后再次调用为空操作。
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let _guard = self.inner.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        let facade = &self.inner.facade;
        let (services, directories) =
            tokio::join!(facade.fetch_services(), facade.fetch_directories());
        let services = services?;
        let directories = directories?;

        let mut merged = Items::default();
        for config in services.into_iter().chain(directories) {
            let id = config.id.clone();
            if merged.map.contains_key(&id) {
                warn!(resource_id = %id, "duplicate resource id; keeping the later entry");
            }
            merged.insert(id, self.resource(config));
        }
        let total = merged.order.len();
        *self.items_guard() = merged;
        self.inner.initialized.store(true, Ordering::SeqCst);
        self.bump();
        info!(total, "registry initialized");

        if self.inner.options.refresh_directories_on_init {
            self.refresh_directories().await;
        }
        Ok(())
    }

    async fn refresh_directories(&self) {
        refresh_all(&self.directories()).await;
    }

    /// 推送丢批后重新拉取所有实体的指标。失败只记日志。
    #[instrument(skip(self))]
    pub async fn resync(&self) {
        let items = self.items();
        warn!(resources = items.len(), "resyncing metrics after lost push batches");
        refresh_all(&items).await;
    }

    pub fn get(&self, id: &str) -> Option<Resource> {
        self.items_guard().map.get(id).cloned()
    }

    fn require(&self, id: &str) -> Result<Resource> {
        self.get(id)
            .ok_or_else(|| SyncError::NotFound(id.to_string()))
    }

    /// 新建资源：id 留空交给后端分配，确认后追加到列表末尾。
    #[instrument(skip(self, config), fields(name = %config.name))]
    pub async fn create(&self, mut config: ResourceConfig) -> Result<Resource> {
        config.id.clear();
        let confirmed = self.inner.facade.save(&config).await?;
        let id = confirmed.id.clone();
        let existing = self.get(&id);
        let resource = match existing {
            Some(resource) => {
                resource.replace_config(confirmed);
                resource
            }
            None => {
                let resource = self.resource(confirmed);
                self.items_guard().insert(id.clone(), resource.clone());
                self.bump();
                resource
            }
        };
        info!(resource_id = %id, "resource created");
        Ok(resource)
    }

    /// 保存补丁；若后端返回的 id 与原键不同，原位改键。
    pub async fn save(&self, id: &str, patch: &ResourcePatch) -> Result<ResourceConfig> {
        let resource = self.require(id)?;
        let confirmed = resource.save(patch).await?;
        if confirmed.id != id {
            self.items_guard().rekey(id, &confirmed.id);
            self.bump();
        }
        Ok(confirmed)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let resource = self.require(id)?;
        resource.delete().await?;
        // 等待期间键可能已变化，按实体本身移除
        if self.items_guard().remove_entity(&resource) {
            self.bump();
        }
        Ok(())
    }

    pub async fn start(&self, id: &str) -> Result<()> {
        self.require(id)?.start().await
    }

    pub async fn stop(&self, id: &str) -> Result<()> {
        self.require(id)?.stop().await
    }

    /// 版本号：成员变化或任一实体状态变化时递增，用于驱动重绘。
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.items_guard().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn topic(&self) -> &str {
        &self.inner.options.topic
    }
}

async fn refresh_all(resources: &[Resource]) {
    let results =
        futures::future::join_all(resources.iter().map(|r| r.refresh_metrics())).await;
    for (resource, result) in resources.iter().zip(results) {
        if let Err(err) = result {
            warn!(resource_id = %resource.id(), error = %err, "metrics refresh failed");
        }
    }
}
