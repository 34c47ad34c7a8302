//! 边界编解码：数字状态码与推送报文。数字码只出现在这里和传输层。

use crate::error::WireError;
use crate::models::{Metrics, PushRecord, Status};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::warn;

impl Status {
    /// 宿主服务管理器的数字码；`NotApplicable` 没有对应值。
    pub fn code(self) -> Option<i8> {
        match self {
            Status::Error => Some(0),
            Status::Stopped => Some(1),
            Status::StartPending => Some(2),
            Status::StopPending => Some(3),
            Status::Running => Some(4),
            Status::ContinuePending => Some(5),
            Status::PausePending => Some(6),
            Status::Paused => Some(7),
            Status::NotApplicable => None,
        }
    }

    pub fn from_code(code: i8) -> Result<Self, WireError> {
        match code {
            0 => Ok(Status::Error),
            1 => Ok(Status::Stopped),
            2 => Ok(Status::StartPending),
            3 => Ok(Status::StopPending),
            4 => Ok(Status::Running),
            5 => Ok(Status::ContinuePending),
            6 => Ok(Status::PausePending),
            7 => Ok(Status::Paused),
            other => Err(WireError::UnknownStatus(other)),
        }
    }
}

/// 推送记录的线上形态，status 为数字码。
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireRecord {
    pub id: String,
    #[serde(default)]
    pub status: Option<i8>,
    #[serde(default)]
    pub metrics: Option<Metrics>,
}

impl WireRecord {
    /// 转为领域记录；未知状态码记日志后丢弃该字段，其余字段保留。
    pub fn into_record(self) -> PushRecord {
        let status = match self.status.map(Status::from_code).transpose() {
            Ok(status) => status,
            Err(err) => {
                warn!(resource_id = %self.id, error = %err, "dropping undecodable status");
                None
            }
        };
        PushRecord {
            id: self.id,
            status,
            metrics: self.metrics,
        }
    }

    pub fn from_record(record: &PushRecord) -> Result<Self, WireError> {
        let status = match record.status {
            Some(status) => Some(
                status
                    .code()
                    .ok_or_else(|| WireError::Unencodable(status.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            id: record.id.clone(),
            status,
            metrics: record.metrics,
        })
    }
}

/// 一帧推送：主题 + 批量记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireEnvelope {
    pub topic: String,
    #[serde(default)]
    pub data: Vec<WireRecord>,
}

pub fn decode_envelope(text: &str) -> Result<(String, Vec<PushRecord>), WireError> {
    let envelope: WireEnvelope = serde_json::from_str(text)?;
    let records = envelope
        .data
        .into_iter()
        .map(WireRecord::into_record)
        .collect();
    Ok((envelope.topic, records))
}

pub fn encode_envelope(topic: &str, batch: &[PushRecord]) -> Result<String, WireError> {
    let data = batch
        .iter()
        .map(WireRecord::from_record)
        .collect::<Result<Vec<_>, _>>()?;
    let envelope = WireEnvelope {
        topic: topic.to_string(),
        data,
    };
    Ok(serde_json::to_string(&envelope)?)
}
