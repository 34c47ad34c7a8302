//! 资源实体：每个被远程监管的对象一条响应式记录。

use crate::command::CommandFacade;
use crate::models::{Metrics, ResourceConfig, ResourceKind, Status};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

mod admin;
mod lifecycle;
mod update;

/// 实体的当前状态快照。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    pub config: ResourceConfig,
    pub status: Status,
    pub metrics: Metrics,
    /// 命令发出到结果返回之间为 true
    pub loading: bool,
}

impl ResourceState {
    fn initial(config: ResourceConfig) -> Self {
        Self {
            status: initial_status(config.kind),
            config,
            metrics: Metrics::zeroed(),
            loading: false,
        }
    }
}

fn initial_status(kind: ResourceKind) -> Status {
    match kind {
        ResourceKind::Service => Status::Stopped,
        ResourceKind::Directory => Status::NotApplicable,
    }
}

struct ResourceInner {
    facade: CommandFacade,
    state: watch::Sender<ResourceState>,
    /// 已应用的推送次数；命令结算时据此判断期间是否有推送到达
    push_seq: AtomicU64,
    /// 最近一次发出的命令代号；只有当前命令结算时才清除 `loading`
    command_seq: AtomicU64,
    revision: Arc<watch::Sender<u64>>,
}

/// 资源句柄，克隆后共享同一份状态。
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Resource")
            .field("id", &state.config.id)
            .field("status", &state.status)
            .field("loading", &state.loading)
            .finish_non_exhaustive()
    }
}

impl Resource {
    /// 独立实体（不属于任何注册表），主要用于测试与单资源场景。
    pub fn new(config: ResourceConfig, facade: CommandFacade) -> Self {
        let (revision, _) = watch::channel(0_u64);
        Self::attached(config, facade, Arc::new(revision))
    }

    pub(crate) fn attached(
        config: ResourceConfig,
        facade: CommandFacade,
        revision: Arc<watch::Sender<u64>>,
    ) -> Self {
        let (state, _) = watch::channel(ResourceState::initial(config));
        Self {
            inner: Arc::new(ResourceInner {
                facade,
                state,
                push_seq: AtomicU64::new(0),
                command_seq: AtomicU64::new(0),
                revision,
            }),
        }
    }

    pub fn snapshot(&self) -> ResourceState {
        self.inner.state.borrow().clone()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<ResourceState> {
        self.inner.state.subscribe()
    }

    pub fn id(&self) -> String {
        self.inner.state.borrow().config.id.clone()
    }

    pub fn config(&self) -> ResourceConfig {
        self.inner.state.borrow().config.clone()
    }

    pub fn status(&self) -> Status {
        self.inner.state.borrow().status
    }

    pub fn metrics(&self) -> Metrics {
        self.inner.state.borrow().metrics
    }

    pub fn is_service(&self) -> bool {
        self.inner.state.borrow().config.is_service()
    }

    pub fn is_directory(&self) -> bool {
        self.inner.state.borrow().config.is_directory()
    }

    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.status() == Status::Stopped
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    fn facade(&self) -> &CommandFacade {
        &self.inner.facade
    }

    fn push_seq(&self) -> u64 {
        self.inner.push_seq.load(Ordering::SeqCst)
    }

    /// 分配新的命令代号。须在 `modify` 闭包内与置位 `loading` 一起调用。
    fn next_command(&self) -> u64 {
        self.inner.command_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current_command(&self, token: u64) -> bool {
        self.inner.command_seq.load(Ordering::SeqCst) == token
    }

    pub(crate) fn same_entity(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 在写锁内同步修改状态；只有内容真正变化时才通知订阅者并推进注册表版本。
    fn modify(&self, f: impl FnOnce(&mut ResourceState)) -> bool {
        let changed = self.inner.state.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
        if changed {
            self.inner.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryBackend;

    fn facade() -> CommandFacade {
        CommandFacade::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn initial_status_depends_on_kind() {
        let svc = Resource::new(ResourceConfig::service("svc1", "One"), facade());
        assert!(svc.is_stopped());
        assert!(svc.is_service());
        assert!(!svc.is_loading());
        assert!(svc.metrics().is_zeroed());

        let dir = Resource::new(ResourceConfig::directory("d1", "Web", "/srv/web"), facade());
        assert_eq!(dir.status(), Status::NotApplicable);
        assert!(dir.is_directory());
        assert!(!dir.is_stopped());
    }

    #[test]
    fn modify_only_notifies_on_change() {
        let svc = Resource::new(ResourceConfig::service("svc1", "One"), facade());
        let rx = svc.subscribe();
        assert!(!svc.modify(|s| s.status = Status::Stopped));
        assert!(!rx.has_changed().unwrap());
        assert!(svc.modify(|s| s.loading = true));
        assert!(rx.has_changed().unwrap());
        assert!(svc.is_loading());
    }
}
