//! 内存模拟后端：用于测试与离线演示。支持故障注入、延迟注入与周期性指标抖动推送。

use crate::command::{Backend, Command};
use crate::models::{InstallFile, Metrics, PushRecord, ResourceConfig, ResourceKind, Status};
use crate::push::{PushChannel, SERVICES_UPDATE};
use anyhow::anyhow;
use async_trait::async_trait;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// 目录指标为常量
const DIRECTORY_TOTAL_SIZE: i64 = 204_857_600;
const DIRECTORY_LAST_MODIFIED: i64 = 16_251_588_000_000;

/// 超过以下幅度才推送
const CPU_THRESHOLD: f64 = 0.5;
const MEM_THRESHOLD: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
struct SimEntry {
    config: ResourceConfig,
    status: Status,
    metrics: Metrics,
}

#[derive(Debug, Default)]
struct SimState {
    order: Vec<String>,
    entries: HashMap<String, SimEntry>,
    failures: HashMap<Command, VecDeque<String>>,
    calls: HashMap<Command, usize>,
    latency: Duration,
    auto_confirm: bool,
    last_published: HashMap<String, (Status, Metrics)>,
}

impl SimState {
    fn entry(&mut self, id: &str) -> anyhow::Result<&mut SimEntry> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| anyhow!("resource not found for ID: {id}"))
    }

    fn of_kind(&self, kind: ResourceKind) -> Vec<ResourceConfig> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter(|e| e.config.kind == kind)
            .map(|e| e.config.clone())
            .collect()
    }
}

#[derive(Debug)]
pub struct MemoryBackend {
    sim: StdMutex<SimState>,
    channel: Option<PushChannel>,
    topic: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// 不带推送通道：启停只修改内存状态。
    pub fn new() -> Self {
        Self {
            sim: StdMutex::new(SimState::default()),
            channel: None,
            topic: SERVICES_UPDATE.to_string(),
        }
    }

    /// 带推送通道：启停成功后发布确认推送，`tick` 发布指标变化。
    pub fn with_channel(channel: PushChannel) -> Self {
        let backend = Self {
            channel: Some(channel),
            ..Self::new()
        };
        backend.auto_confirm(true);
        backend
    }

    pub fn with_resources(self, configs: impl IntoIterator<Item = ResourceConfig>) -> Self {
        for config in configs {
            self.add_resource(config);
        }
        self
    }

    fn sim(&self) -> MutexGuard<'_, SimState> {
        self.sim.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_resource(&self, config: ResourceConfig) {
        let mut sim = self.sim();
        let id = config.id.clone();
        let status = match config.kind {
            ResourceKind::Service => Status::Stopped,
            ResourceKind::Directory => Status::NotApplicable,
        };
        let entry = SimEntry {
            config,
            status,
            metrics: Metrics::zeroed(),
        };
        if sim.entries.insert(id.clone(), entry).is_none() {
            sim.order.push(id);
        }
    }

    pub fn set_latency(&self, latency: Duration) {
        self.sim().latency = latency;
    }

    /// 启停成功后是否发布确认推送
    pub fn auto_confirm(&self, enabled: bool) {
        self.sim().auto_confirm = enabled;
    }

    /// 让下一次 `command` 调用以 `message` 失败；可排队多条。
    pub fn fail_next(&self, command: Command, message: impl Into<String>) {
        self.sim()
            .failures
            .entry(command)
            .or_default()
            .push_back(message.into());
    }

    /// 直接改写模拟状态（不推送）；非运行态时指标清零。
    pub fn set_status(&self, id: &str, status: Status, metrics: Option<Metrics>) {
        if let Some(entry) = self.sim().entries.get_mut(id) {
            entry.status = status;
            entry.metrics = match (status, metrics) {
                (Status::Running, Some(metrics)) => metrics,
                (Status::Running, None) => entry.metrics,
                _ => Metrics::zeroed(),
            };
        }
    }

    /// 在模拟后端的主题上发布一批记录
    pub fn emit(&self, batch: Vec<PushRecord>) -> usize {
        match &self.channel {
            Some(channel) => channel.publish(&self.topic, batch),
            None => 0,
        }
    }

    pub fn calls(&self, command: Command) -> usize {
        self.sim().calls.get(&command).copied().unwrap_or(0)
    }

    pub fn status_of(&self, id: &str) -> Option<Status> {
        self.sim().entries.get(id).map(|e| e.status)
    }

    pub fn metrics_of(&self, id: &str) -> Option<Metrics> {
        self.sim().entries.get(id).map(|e| e.metrics)
    }

    /// 抖动运行中服务的指标，只发布变化显著的记录；返回发布条数。
    pub fn tick(&self) -> usize {
        let batch = {
            let mut sim = self.sim();
            let mut rng = rand::thread_rng();
            let mut batch = Vec::new();
            let ids = sim.order.clone();
            for id in ids {
                let Some(entry) = sim.entries.get_mut(&id) else {
                    continue;
                };
                if entry.config.is_directory() {
                    continue;
                }
                if entry.status == Status::Running {
                    let cpu = entry.metrics.cpu + rng.gen_range(-3.0..3.0);
                    entry.metrics.cpu = (cpu.max(0.0) * 10.0).round() / 10.0;
                    let delta: i64 = rng.gen_range(-8..=8) * 1024 * 1024;
                    entry.metrics.mem = entry.metrics.mem.saturating_add_signed(delta);
                }
                let next = (entry.status, entry.metrics);
                let changed = match sim.last_published.get(&id) {
                    Some(prev) => significant(prev, &next),
                    None => true,
                };
                if changed {
                    sim.last_published.insert(id.clone(), next);
                    batch.push(PushRecord::status(id, next.0).with_metrics(next.1));
                }
            }
            batch
        };
        let published = batch.len();
        if published > 0 {
            debug!(published, "simulated metrics tick");
            self.emit(batch);
        }
        published
    }

    /// 调用计数 + 延迟 + 故障注入
    async fn enter(&self, command: Command) -> anyhow::Result<()> {
        let (latency, failure) = {
            let mut sim = self.sim();
            *sim.calls.entry(command).or_default() += 1;
            let failure = sim
                .failures
                .get_mut(&command)
                .and_then(VecDeque::pop_front);
            (sim.latency, failure)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }

    fn transition(&self, id: &str, status: Status) -> anyhow::Result<()> {
        let record = {
            let mut sim = self.sim();
            let auto_confirm = sim.auto_confirm;
            let entry = sim.entry(id)?;
            if !entry.config.is_service() {
                return Err(anyhow!("resource is not a service: {id}"));
            }
            entry.status = status;
            entry.metrics = if status == Status::Running {
                running_metrics()
            } else {
                Metrics::zeroed()
            };
            let record = PushRecord::status(id, status).with_metrics(entry.metrics);
            let snapshot = (entry.status, entry.metrics);
            sim.last_published.insert(id.to_string(), snapshot);
            auto_confirm.then_some(record)
        };
        if let Some(record) = record {
            self.emit(vec![record]);
        }
        Ok(())
    }
}

fn running_metrics() -> Metrics {
    let mut rng = rand::thread_rng();
    Metrics {
        pid: rng.gen_range(1_000..60_000),
        create_time: chrono::Utc::now().timestamp_millis(),
        cpu: 2.5,
        mem: 104_857_600,
        total_size: None,
        last_modified: None,
    }
}

fn directory_metrics() -> Metrics {
    Metrics {
        total_size: Some(DIRECTORY_TOTAL_SIZE),
        last_modified: Some(DIRECTORY_LAST_MODIFIED),
        ..Metrics::zeroed()
    }
}

fn significant(prev: &(Status, Metrics), next: &(Status, Metrics)) -> bool {
    let (prev_status, prev) = prev;
    let (next_status, next) = next;
    prev_status != next_status
        || prev.pid != next.pid
        || (prev.cpu - next.cpu).abs() >= CPU_THRESHOLD
        || prev.mem.abs_diff(next.mem) >= MEM_THRESHOLD
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_services(&self) -> anyhow::Result<Vec<ResourceConfig>> {
        self.enter(Command::FetchServices).await?;
        Ok(self.sim().of_kind(ResourceKind::Service))
    }

    async fn fetch_directories(&self) -> anyhow::Result<Vec<ResourceConfig>> {
        self.enter(Command::FetchDirectories).await?;
        Ok(self.sim().of_kind(ResourceKind::Directory))
    }

    async fn start_service(&self, id: &str) -> anyhow::Result<()> {
        self.enter(Command::Start).await?;
        self.transition(id, Status::Running)
    }

    async fn stop_service(&self, id: &str) -> anyhow::Result<()> {
        self.enter(Command::Stop).await?;
        self.transition(id, Status::Stopped)
    }

    async fn install(&self, id: &str, files: &[InstallFile]) -> anyhow::Result<()> {
        self.enter(Command::Install).await?;
        self.sim().entry(id)?;
        debug!(resource_id = id, files = files.len(), "simulated install");
        Ok(())
    }

    async fn save_resource(&self, config: &ResourceConfig) -> anyhow::Result<ResourceConfig> {
        self.enter(Command::Save).await?;
        let mut stored = config.clone();
        if stored.id.is_empty() {
            stored.id = uuid::Uuid::new_v4().to_string();
        }
        let known = {
            let mut sim = self.sim();
            match sim.entries.get_mut(&stored.id) {
                Some(entry) => {
                    if entry.config.kind != stored.kind {
                        entry.status = match stored.kind {
                            ResourceKind::Service => Status::Stopped,
                            ResourceKind::Directory => Status::NotApplicable,
                        };
                        entry.metrics = Metrics::zeroed();
                    }
                    entry.config = stored.clone();
                    true
                }
                None => false,
            }
        };
        if !known {
            self.add_resource(stored.clone());
        }
        Ok(stored)
    }

    async fn delete_resource(&self, id: &str) -> anyhow::Result<()> {
        self.enter(Command::Delete).await?;
        let mut sim = self.sim();
        sim.entry(id)?;
        sim.entries.remove(id);
        sim.order.retain(|k| k != id);
        sim.last_published.remove(id);
        Ok(())
    }

    async fn fetch_metrics(&self, id: &str) -> anyhow::Result<Metrics> {
        self.enter(Command::FetchMetrics).await?;
        let mut sim = self.sim();
        let entry = sim.entry(id)?;
        if entry.config.is_directory() {
            entry.metrics = directory_metrics();
        }
        Ok(entry.metrics)
    }

    async fn open_explorer(&self, id: &str) -> anyhow::Result<()> {
        self.enter(Command::OpenExplorer).await?;
        let mut sim = self.sim();
        let entry = sim.entry(id)?;
        debug!(resource_id = id, path = %entry.config.path, "simulated explorer open");
        Ok(())
    }
}

/// 轮询等待条件成立，超时返回 false。
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
