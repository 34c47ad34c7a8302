use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;

/// 资源类型：托管服务或被监控的目录。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Service,
    Directory,
}

/// 资源描述，由后端创建；客户端只在保存成功后整体替换。
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// 唯一且稳定的标识；新建时为空，由后端分配
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub installable: bool,
    /// 宿主服务管理器中的服务名（仅服务类型）
    #[serde(default)]
    pub service_name: Option<String>,
}

impl ResourceConfig {
    pub fn service(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind: ResourceKind::Service,
            path: String::new(),
            installable: false,
            service_name: None,
        }
    }

    pub fn directory(
        id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind: ResourceKind::Directory,
            path: path.into(),
            installable: false,
            service_name: None,
        }
    }

    pub fn is_service(&self) -> bool {
        self.kind == ResourceKind::Service
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }
}

/// 局部配置更新：`None` 表示保留原值。`id` 不可修改。
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub path: Option<String>,
    pub installable: Option<bool>,
    pub service_name: Option<String>,
}

impl ResourcePatch {
    pub fn is_empty(&self) -> bool {
        self == &ResourcePatch::default()
    }

    /// 把补丁叠加到 `base` 上，得到待提交的完整配置。
    pub fn apply(&self, base: &ResourceConfig) -> ResourceConfig {
        let mut next = base.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(path) = &self.path {
            next.path = path.clone();
        }
        if let Some(installable) = self.installable {
            next.installable = installable;
        }
        if let Some(service_name) = &self.service_name {
            next.service_name = Some(service_name.clone());
        }
        next
    }
}

/// 运行指标快照。未运行或尚未采集时为全零；每次更新整体覆盖。
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    #[serde(default)]
    pub pid: u32,
    /// 进程创建时间（毫秒时间戳）
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub cpu: f64,
    /// 内存占用 (bytes)
    #[serde(default)]
    pub mem: u64,
    /// 目录总大小 (bytes)，仅目录
    #[serde(default)]
    pub total_size: Option<i64>,
    /// 目录最后修改时间（毫秒时间戳），仅目录
    #[serde(default)]
    pub last_modified: Option<i64>,
}

impl Metrics {
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn is_zeroed(&self) -> bool {
        self == &Self::zeroed()
    }
}

/// 资源状态。服务使用宿主服务管理器的状态集合；目录恒为 `NotApplicable`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Error,
    Stopped,
    StartPending,
    StopPending,
    Running,
    ContinuePending,
    PausePending,
    Paused,
    NotApplicable,
}

impl Status {
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            Status::StartPending
                | Status::StopPending
                | Status::ContinuePending
                | Status::PausePending
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Error => "error",
            Status::Stopped => "stopped",
            Status::StartPending => "start_pending",
            Status::StopPending => "stop_pending",
            Status::Running => "running",
            Status::ContinuePending => "continue_pending",
            Status::PausePending => "pause_pending",
            Status::Paused => "paused",
            Status::NotApplicable => "n/a",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 安装文件：文件名 + 原始字节。
#[derive(Clone, PartialEq, Eq)]
pub struct InstallFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl InstallFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl fmt::Debug for InstallFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallFile")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// 推送记录：后端对某个资源的状态/指标通知，字段均可缺省。
#[derive(Debug, Clone, PartialEq)]
pub struct PushRecord {
    pub id: String,
    pub status: Option<Status>,
    pub metrics: Option<Metrics>,
}

impl PushRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: None,
            metrics: None,
        }
    }

    pub fn status(id: impl Into<String>, status: Status) -> Self {
        Self::new(id).with_status(status)
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_json_matches_backend_names() {
        let mut cfg = ResourceConfig::service("svc1", "Report Service");
        cfg.service_name = Some("ReportSvc".into());
        cfg.installable = true;
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["type"], "service");
        assert_eq!(json["serviceName"], "ReportSvc");
        assert_eq!(json["installable"], true);

        let dir = ResourceConfig::directory("d1", "Kiosk", "/srv/kiosk");
        let json = serde_json::to_value(&dir).unwrap();
        assert_eq!(json["type"], "directory");
        assert!(json.get("serviceName").is_none());
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let base = ResourceConfig::directory("d1", "Kiosk", "/srv/kiosk");
        let patch = ResourcePatch {
            name: Some("Kiosk Web".into()),
            ..Default::default()
        };
        let next = patch.apply(&base);
        assert_eq!(next.name, "Kiosk Web");
        assert_eq!(next.path, "/srv/kiosk");
        assert_eq!(next.id, "d1");
        assert!(!patch.is_empty());
        assert!(ResourcePatch::default().is_empty());
    }

    #[test]
    fn metrics_parse_directory_fields() {
        let m: Metrics =
            serde_json::from_str(r#"{"pid":0,"createTime":0,"cpu":0,"mem":0,"totalSize":2048}"#)
                .unwrap();
        assert_eq!(m.total_size, Some(2048));
        assert_eq!(m.last_modified, None);
        assert!(!m.is_zeroed());
        assert!(Metrics::zeroed().is_zeroed());
    }
}
