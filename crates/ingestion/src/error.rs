//! Ingestion 错误类型

use std::path::PathBuf;

use contracts::SensorFault;
use sync_engine::BarrierError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 标定阶段未捕获到有效手势
    #[error("calibration stage '{stage}' found no hand after {attempts} attempts")]
    Calibration {
        /// 阶段 ("surface" / "raised")
        stage: &'static str,
        /// 已尝试次数
        attempts: u32,
    },

    /// 同步屏障错误
    #[error("barrier error: {0}")]
    Barrier(#[from] BarrierError),

    /// 不可恢复的传感器故障
    #[error("sensor fault: {0}")]
    Fault(#[from] SensorFault),

    /// 回放文件无法加载
    #[error("cannot load recording {path}: {message}")]
    Replay {
        /// 文件路径
        path: PathBuf,
        /// 错误消息
        message: String,
    },

    /// 采集线程无法启动
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestionError {
    pub fn replay(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Replay {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
