//! # Dispatcher
//!
//! 报告分发模块。
//!
//! 负责：
//! - `TickConsumer`: 消费同步 tick，融合并提交报告
//! - `SessionManager`: 发现、连接、重连执行器链路
//! - `SessionHandle`: 有界队列隔离慢链路，不阻塞 tick 循环

pub mod consumer;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod session;

pub use consumer::{ConsumerExit, ConsumerReport, TickConsumer};
pub use error::SessionError;
pub use handle::SessionHandle;
pub use metrics::{SessionMetrics, SessionMetricsSnapshot};
pub use session::{SendOutcome, SessionManager, SessionPhase, SessionPolicy};
