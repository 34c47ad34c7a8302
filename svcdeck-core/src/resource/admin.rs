//! 安装、保存、删除：只在后端确认后修改本地状态。

use super::*;
use crate::error::{Result, SyncError};
use crate::models::{InstallFile, ResourcePatch};
use tracing::{info, instrument, warn};

impl Resource {
    /// 占用 `loading` 并返回命令代号；已在执行中时返回 `Busy`。
    fn begin(&self) -> Result<u64> {
        let mut token = None;
        self.modify(|s| {
            if !s.loading {
                s.loading = true;
                token = Some(self.next_command());
            }
        });
        token.ok_or_else(|| SyncError::Busy(self.id()))
    }

    fn finish(&self, token: u64) {
        self.modify(|s| {
            if self.is_current_command(token) {
                s.loading = false;
            }
        });
    }

    #[instrument(skip(self, files), fields(resource_id = %self.id(), file_count = files.len()))]
    pub async fn install(&self, files: &[InstallFile]) -> Result<()> {
        if !self.config().installable {
            return Err(SyncError::NotInstallable(self.id()));
        }
        let token = self.begin()?;
        let result = self.facade().install(&self.id(), files).await;
        self.finish(token);
        result?;
        info!("install confirmed");

        if let Err(err) = self.refresh_metrics().await {
            warn!(error = %err, "metrics refresh after install failed");
        }
        Ok(())
    }

    /// 保存补丁；成功后以后端返回的配置整体替换，失败时配置不变。
    #[instrument(skip(self, patch), fields(resource_id = %self.id()))]
    pub async fn save(&self, patch: &ResourcePatch) -> Result<ResourceConfig> {
        let token = self.begin()?;
        let draft = patch.apply(&self.config());
        match self.facade().save(&draft).await {
            Ok(confirmed) => {
                self.replace_config(confirmed.clone());
                self.finish(token);
                info!(name = %confirmed.name, "config saved");
                Ok(confirmed)
            }
            Err(err) => {
                self.finish(token);
                Err(err.into())
            }
        }
    }

    /// 删除成功后由注册表移除实体。
    #[instrument(skip(self), fields(resource_id = %self.id()))]
    pub async fn delete(&self) -> Result<()> {
        let token = self.begin()?;
        let result = self.facade().delete(&self.id()).await;
        self.finish(token);
        result?;
        info!("resource deleted");
        Ok(())
    }

    pub async fn open_explorer(&self) -> Result<()> {
        self.facade().open_explorer(&self.id()).await?;
        Ok(())
    }

    /// 替换配置；类型变化时状态与指标回到该类型的初始值。
    pub(crate) fn replace_config(&self, config: ResourceConfig) {
        self.modify(|s| {
            if s.config.kind != config.kind {
                s.status = initial_status(config.kind);
                s.metrics = Metrics::zeroed();
            }
            s.config = config;
        });
    }
}
