//! # Link
//!
//! `LinkTransport` 实现：
//! - `LogTransport`: 帧写入日志，链路常连
//! - `TcpBridgeTransport`: 帧转发到 TCP 桥接端（外部 BLE 网关）
//! - `MockTransport`: 测试用，可注入失败

mod factory;
mod log;
mod mock;
mod tcp;

pub use factory::ConfiguredTransport;
pub use log::LogTransport;
pub use mock::{MockProbe, MockTransport, MockTransportConfig};
pub use tcp::TcpBridgeTransport;
