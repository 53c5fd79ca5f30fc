//! # Sync Engine
//!
//! 双握手同步屏障：两个采集线程 + 一个融合消费者。
//!
//! 负责：
//! - 每个 tick 两路观测配对
//! - 生产者等待消费者释放 tick
//! - 传感器退役 (retire) 后屏障不死锁
//! - 协作式关闭
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::SyncBarrier;
//!
//! let (barrier, visual_port, thermal_port) = SyncBarrier::with_ports();
//!
//! // capture threads
//! visual_port.publish(hand_observation.into())?;
//!
//! // consumer
//! let snapshot = barrier.wait_for_tick()?;
//! barrier.release_tick(snapshot.tick)?;
//! ```

mod barrier;
mod buffer;
mod error;

pub use barrier::{SourcePort, SyncBarrier};
pub use buffer::TickBuffer;
pub use error::BarrierError;

pub use contracts::{Observation, SourceId, Stamped, TickSnapshot};
