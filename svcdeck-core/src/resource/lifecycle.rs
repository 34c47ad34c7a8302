//! 启停：立即乐观进入中间态，命令结算后确认或回滚。

use super::*;
use crate::command::Command;
use crate::error::{Result, SyncError};
use tracing::{debug, info, instrument};

/// 发起命令时记下的现场，用于失败回滚
struct Pending {
    status: Status,
    metrics: Metrics,
    push_seq: u64,
    token: u64,
}

impl Resource {
    /// 启动服务：`StartPending` → `Running`，失败时恢复原状态与指标。
    #[instrument(skip(self), fields(resource_id = %self.id()))]
    pub async fn start(&self) -> Result<()> {
        self.transition(Command::Start, Status::StartPending, Status::Running)
            .await
    }

    /// 停止服务：`StopPending` → `Stopped`，指标乐观清零。
    #[instrument(skip(self), fields(resource_id = %self.id()))]
    pub async fn stop(&self) -> Result<()> {
        self.transition(Command::Stop, Status::StopPending, Status::Stopped)
            .await
    }

    async fn transition(&self, command: Command, pending: Status, target: Status) -> Result<()> {
        if !self.is_service() {
            return Err(SyncError::NotAService(self.id()));
        }

        let mut begun: Option<Pending> = None;
        self.modify(|s| {
            if s.loading || s.status == target {
                return;
            }
            begun = Some(Pending {
                status: s.status,
                metrics: s.metrics,
                push_seq: self.push_seq(),
                token: self.next_command(),
            });
            s.loading = true;
            s.status = pending;
            if target == Status::Stopped {
                s.metrics = Metrics::zeroed();
            }
        });
        let Some(before) = begun else {
            debug!(%command, "already in target state or busy; skipping");
            return Ok(());
        };

        let id = self.id();
        let result = match command {
            Command::Start => self.facade().start(&id).await,
            _ => self.facade().stop(&id).await,
        };

        self.modify(|s| {
            if !self.is_current_command(before.token) {
                // 推送清除 loading 后已有新命令接管
                return;
            }
            s.loading = false;
            if self.push_seq() != before.push_seq {
                // 期间已有推送，以推送结果为准
                return;
            }
            match &result {
                Ok(()) => s.status = target,
                Err(_) => {
                    s.status = before.status;
                    s.metrics = before.metrics;
                }
            }
        });

        match result {
            Ok(()) => {
                info!(%command, status = %self.status(), "command confirmed");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
