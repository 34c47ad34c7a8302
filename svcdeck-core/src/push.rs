//! 推送通道：按主题分发批量的状态/指标更新，与客户端发出的命令相互独立。

use crate::models::PushRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// 后端推送服务状态的默认主题
pub const SERVICES_UPDATE: &str = "services-update";

const DEFAULT_CAPACITY: usize = 64;

pub type Batch = Arc<Vec<PushRecord>>;

/// 进程内主题总线。传输桥接或模拟后端调用 `publish`，注册表通过 `subscribe` 接收。
#[derive(Debug, Clone)]
pub struct PushChannel {
    topics: Arc<StdMutex<HashMap<String, broadcast::Sender<Batch>>>>,
    capacity: usize,
}

impl Default for PushChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PushChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(StdMutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Batch> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// 发布一批记录，返回收到该批次的订阅者数量。
    pub fn publish(&self, topic: &str, batch: Vec<PushRecord>) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let sender = {
            let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
            topics.get(topic).cloned()
        };
        match sender.map(|tx| tx.send(Arc::new(batch))) {
            Some(Ok(receivers)) => receivers,
            _ => {
                debug!(topic, "push batch has no subscribers");
                0
            }
        }
    }

    /// 注册处理函数。接收端在返回前创建，之后发布的批次都不会丢失。
    /// 需要在 tokio 运行时内调用。
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: FnMut(&[PushRecord]) + Send + 'static,
    {
        self.subscribe_with_lag(topic, handler, |_| {})
    }

    /// 同 `subscribe`，另外在接收端落后、批次被丢弃时调用 `on_lagged(丢弃数)`。
    /// 推送只在变化时发送，丢批后本地镜像可能一直过期，调用方应借此重新同步。
    pub fn subscribe_with_lag<F, L>(
        &self,
        topic: &str,
        mut handler: F,
        mut on_lagged: L,
    ) -> Subscription
    where
        F: FnMut(&[PushRecord]) + Send + 'static,
        L: FnMut(u64) + Send + 'static,
    {
        let mut stream = BroadcastStream::new(self.sender(topic).subscribe());
        let name = topic.to_string();
        let handle = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(batch) => handler(&batch),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(topic = %name, skipped, "push subscriber lagged");
                        on_lagged(skipped);
                    }
                }
            }
        });
        Subscription {
            topic: topic.to_string(),
            handle: Some(handle),
        }
    }
}

/// 订阅句柄；显式 `unsubscribe` 或 drop 时结束投递。
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(topic = %self.topic, "push subscription closed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
