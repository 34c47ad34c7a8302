//! 命令通道：把后端的每个操作包装成统一的异步结果，任何失败（含 panic）都不越过边界。

use crate::error::{CommandError, CommandResult};
use crate::models::{InstallFile, Metrics, ResourceConfig};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// 后端协作方：进程监管权威。实现者可以是 HTTP 客户端、IPC 或内存模拟。
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_services(&self) -> anyhow::Result<Vec<ResourceConfig>>;

    async fn fetch_directories(&self) -> anyhow::Result<Vec<ResourceConfig>>;

    async fn start_service(&self, id: &str) -> anyhow::Result<()>;

    async fn stop_service(&self, id: &str) -> anyhow::Result<()>;

    async fn install(&self, id: &str, files: &[InstallFile]) -> anyhow::Result<()>;

    /// 保存配置；id 为空表示新建，返回后端确认后的完整配置
    async fn save_resource(&self, config: &ResourceConfig) -> anyhow::Result<ResourceConfig>;

    async fn delete_resource(&self, id: &str) -> anyhow::Result<()>;

    async fn fetch_metrics(&self, id: &str) -> anyhow::Result<Metrics>;

    async fn open_explorer(&self, id: &str) -> anyhow::Result<()>;
}

/// 命令标签，用于日志与错误归类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    FetchServices,
    FetchDirectories,
    Start,
    Stop,
    Install,
    Save,
    Delete,
    FetchMetrics,
    OpenExplorer,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::FetchServices => "fetch_services",
            Command::FetchDirectories => "fetch_directories",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Install => "install",
            Command::Save => "save",
            Command::Delete => "delete",
            Command::FetchMetrics => "fetch_metrics",
            Command::OpenExplorer => "open_explorer",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct CommandFacade {
    backend: Arc<dyn Backend>,
}

impl fmt::Debug for CommandFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFacade").finish_non_exhaustive()
    }
}

impl CommandFacade {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub async fn fetch_services(&self) -> CommandResult<Vec<ResourceConfig>> {
        self.call(Command::FetchServices, "*", self.backend.fetch_services())
            .await
    }

    pub async fn fetch_directories(&self) -> CommandResult<Vec<ResourceConfig>> {
        self.call(Command::FetchDirectories, "*", self.backend.fetch_directories())
            .await
    }

    pub async fn start(&self, id: &str) -> CommandResult<()> {
        self.call(Command::Start, id, self.backend.start_service(id))
            .await
    }

    pub async fn stop(&self, id: &str) -> CommandResult<()> {
        self.call(Command::Stop, id, self.backend.stop_service(id))
            .await
    }

    pub async fn install(&self, id: &str, files: &[InstallFile]) -> CommandResult<()> {
        self.call(Command::Install, id, self.backend.install(id, files))
            .await
    }

    pub async fn save(&self, config: &ResourceConfig) -> CommandResult<ResourceConfig> {
        self.call(Command::Save, &config.id, self.backend.save_resource(config))
            .await
    }

    pub async fn delete(&self, id: &str) -> CommandResult<()> {
        self.call(Command::Delete, id, self.backend.delete_resource(id))
            .await
    }

    pub async fn fetch_metrics(&self, id: &str) -> CommandResult<Metrics> {
        self.call(Command::FetchMetrics, id, self.backend.fetch_metrics(id))
            .await
    }

    pub async fn open_explorer(&self, id: &str) -> CommandResult<()> {
        self.call(Command::OpenExplorer, id, self.backend.open_explorer(id))
            .await
    }

    /// 执行一次后端调用，把错误和 panic 归一为 `CommandError`。
    async fn call<T, F>(&self, command: Command, target: &str, fut: F) -> CommandResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        debug!(%command, target, "issuing command");
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                let message = format!("{err:#}");
                warn!(%command, target, error = %message, "command failed");
                Err(CommandError::new(command, message))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%command, target, error = %message, "backend panicked");
                Err(CommandError::new(command, message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "backend panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct Flaky;

    #[async_trait]
    impl Backend for Flaky {
        async fn fetch_services(&self) -> anyhow::Result<Vec<ResourceConfig>> {
            Ok(vec![ResourceConfig::service("svc1", "One")])
        }

        async fn fetch_directories(&self) -> anyhow::Result<Vec<ResourceConfig>> {
            bail!("directory scan unavailable")
        }

        async fn start_service(&self, _id: &str) -> anyhow::Result<()> {
            bail!("port in use")
        }

        async fn stop_service(&self, _id: &str) -> anyhow::Result<()> {
            panic!("supervisor crashed")
        }

        async fn install(&self, _id: &str, _files: &[InstallFile]) -> anyhow::Result<()> {
            std::panic::panic_any(42_u32)
        }

        async fn save_resource(&self, config: &ResourceConfig) -> anyhow::Result<ResourceConfig> {
            Ok(config.clone())
        }

        async fn delete_resource(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn fetch_metrics(&self, _id: &str) -> anyhow::Result<Metrics> {
            Ok(Metrics::zeroed())
        }

        async fn open_explorer(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn facade() -> CommandFacade {
        CommandFacade::new(Arc::new(Flaky))
    }

    #[tokio::test]
    async fn success_passes_value_through() {
        let services = facade().fetch_services().await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].id, "svc1");
    }

    #[tokio::test]
    async fn backend_error_keeps_message_verbatim() {
        let err = facade().start("svc1").await.unwrap_err();
        assert_eq!(err.command(), Command::Start);
        assert_eq!(err.message(), "port in use");
        assert_eq!(err.to_string(), "start failed: port in use");
    }

    #[tokio::test]
    async fn panic_becomes_command_error() {
        let err = facade().stop("svc1").await.unwrap_err();
        assert_eq!(err.command(), Command::Stop);
        assert_eq!(err.message(), "supervisor crashed");

        let err = facade().install("svc1", &[]).await.unwrap_err();
        assert_eq!(err.message(), "backend panicked");
    }
}
