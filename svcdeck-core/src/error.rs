use crate::command::Command;
use thiserror::Error;

/// Common result type for sync engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// 命令通道返回值：成功携带数据，失败统一为 [`CommandError`]。
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// 后端命令失败（传输错误、后端拒绝、超时或 panic），消息原样保留。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{command} failed: {message}")]
pub struct CommandError {
    command: Command,
    message: String,
}

impl CommandError {
    pub fn new(command: Command, message: impl Into<String>) -> Self {
        Self {
            command,
            message: message.into(),
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// 后端给出的原始错误信息
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("resource is not a service: {0}")]
    NotAService(String),
    #[error("resource is not installable: {0}")]
    NotInstallable(String),
    #[error("resource busy: {0}")]
    Busy(String),
    #[error("resource not found: {0}")]
    NotFound(String),
}

impl SyncError {
    /// 若错误来自后端，返回原始消息
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            SyncError::Command(err) => Some(err.message()),
            _ => None,
        }
    }
}

/// 边界编解码错误（数字状态码、推送报文）。
#[derive(Debug, Error)]
pub enum WireError {
    #[error("unknown status code: {0}")]
    UnknownStatus(i8),
    #[error("status has no wire code: {0}")]
    Unencodable(String),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
