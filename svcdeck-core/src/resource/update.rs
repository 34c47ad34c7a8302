//! 推送应用与指标刷新。

use super::*;
use crate::error::Result;
use crate::models::PushRecord;
use tracing::{debug, instrument};

/// 按实体类型把状态/指标写入快照。目录只接收指标；服务收到状态时指标先清零，
/// 仅当该状态为 `Running` 时才采用附带的指标。
fn apply(state: &mut ResourceState, status: Option<Status>, metrics: Option<Metrics>) {
    if state.config.is_directory() {
        if let Some(metrics) = metrics {
            state.metrics = metrics;
        }
        return;
    }
    match status {
        Some(status) => {
            state.status = status;
            state.metrics = match metrics {
                Some(metrics) if status == Status::Running => metrics,
                _ => Metrics::zeroed(),
            };
        }
        None if state.status == Status::Running => {
            if let Some(metrics) = metrics {
                state.metrics = metrics;
            }
        }
        None => state.metrics = Metrics::zeroed(),
    }
}

impl Resource {
    /// 应用一条推送记录。从不失败，重复应用结果相同；总会清除 `loading`。
    pub fn update(&self, record: &PushRecord) {
        self.modify(|s| {
            self.inner.push_seq.fetch_add(1, Ordering::SeqCst);
            s.loading = false;
            apply(s, record.status, record.metrics);
        });
    }

    /// 主动拉取指标并按推送规则应用，不影响 `loading`。
    #[instrument(skip(self), fields(resource_id = %self.id()))]
    pub async fn refresh_metrics(&self) -> Result<Metrics> {
        let metrics = self.facade().fetch_metrics(&self.id()).await?;
        self.modify(|s| apply(s, None, Some(metrics)));
        debug!(pid = metrics.pid, "metrics refreshed");
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryBackend;

    fn running_metrics() -> Metrics {
        Metrics {
            pid: 4242,
            create_time: 1_700_000_000_000,
            cpu: 12.5,
            mem: 128 * 1024 * 1024,
            ..Metrics::zeroed()
        }
    }

    fn resource(config: ResourceConfig) -> Resource {
        Resource::new(config, CommandFacade::new(Arc::new(MemoryBackend::new())))
    }

    #[test]
    fn update_is_idempotent() {
        let svc = resource(ResourceConfig::service("svc1", "One"));
        let record = PushRecord::status("svc1", Status::Running).with_metrics(running_metrics());
        svc.update(&record);
        let first = svc.snapshot();
        svc.update(&record);
        assert_eq!(svc.snapshot(), first);
        assert_eq!(first.metrics, running_metrics());
    }

    #[test]
    fn non_running_status_zeroes_metrics() {
        let svc = resource(ResourceConfig::service("svc1", "One"));
        svc.update(&PushRecord::status("svc1", Status::Running).with_metrics(running_metrics()));
        svc.update(&PushRecord::status("svc1", Status::Paused).with_metrics(running_metrics()));
        assert_eq!(svc.status(), Status::Paused);
        assert!(svc.metrics().is_zeroed());
    }

    #[test]
    fn running_status_without_metrics_resets_them() {
        let svc = resource(ResourceConfig::service("svc1", "One"));
        svc.update(&PushRecord::status("svc1", Status::Running).with_metrics(running_metrics()));
        svc.update(&PushRecord::status("svc1", Status::Running));
        assert!(svc.is_running());
        assert!(svc.metrics().is_zeroed());
    }

    #[test]
    fn metrics_only_record_keeps_status() {
        let svc = resource(ResourceConfig::service("svc1", "One"));
        svc.update(&PushRecord::status("svc1", Status::Running));
        svc.update(&PushRecord::new("svc1").with_metrics(running_metrics()));
        assert!(svc.is_running());
        assert_eq!(svc.metrics(), running_metrics());
    }

    #[test]
    fn directory_ignores_status() {
        let dir = resource(ResourceConfig::directory("d1", "Web", "/srv/web"));
        let metrics = Metrics {
            total_size: Some(2048),
            last_modified: Some(1_625_158_800_000),
            ..Metrics::zeroed()
        };
        dir.update(&PushRecord::status("d1", Status::Running).with_metrics(metrics));
        assert_eq!(dir.status(), Status::NotApplicable);
        assert_eq!(dir.metrics(), metrics);
    }

    #[test]
    fn update_clears_loading() {
        let svc = resource(ResourceConfig::service("svc1", "One"));
        svc.modify(|s| s.loading = true);
        svc.update(&PushRecord::new("svc1"));
        assert!(!svc.is_loading());
    }

    #[tokio::test]
    async fn refresh_metrics_for_directory() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_resource(ResourceConfig::directory("d1", "Web", "/srv/web"));
        let dir = Resource::new(
            ResourceConfig::directory("d1", "Web", "/srv/web"),
            CommandFacade::new(backend.clone()),
        );
        let metrics = dir.refresh_metrics().await.unwrap();
        assert!(metrics.total_size.is_some());
        assert_eq!(dir.metrics(), metrics);
    }
}
