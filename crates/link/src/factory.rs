//! 按配置构建链路

use std::time::Duration;

use contracts::{LinkConfig, LinkTransport, PeerAddress, TransportError, TransportKind};

use crate::{LogTransport, MockTransport, TcpBridgeTransport};

/// Transport selected at runtime
///
/// `LinkTransport` is not object safe, so dispatch goes through this enum.
pub enum ConfiguredTransport {
    Log(LogTransport),
    TcpBridge(TcpBridgeTransport),
    Mock(MockTransport),
}

impl ConfiguredTransport {
    /// 根据 LinkConfig 创建链路
    pub fn from_config(config: &LinkConfig) -> Self {
        match config.transport {
            TransportKind::Log => Self::Log(LogTransport::default()),
            TransportKind::TcpBridge => {
                Self::TcpBridge(TcpBridgeTransport::new(config.peers.clone()))
            }
        }
    }
}

impl From<MockTransport> for ConfiguredTransport {
    fn from(transport: MockTransport) -> Self {
        Self::Mock(transport)
    }
}

macro_rules! delegate {
    ($self:ident, $t:ident => $body:expr) => {
        match $self {
            ConfiguredTransport::Log($t) => $body,
            ConfiguredTransport::TcpBridge($t) => $body,
            ConfiguredTransport::Mock($t) => $body,
        }
    };
}

impl LinkTransport for ConfiguredTransport {
    fn name(&self) -> &str {
        delegate!(self, t => t.name())
    }

    async fn discover(
        &mut self,
        name_filter: &str,
        scan_window: Duration,
    ) -> Result<Option<PeerAddress>, TransportError> {
        delegate!(self, t => t.discover(name_filter, scan_window).await)
    }

    async fn connect(
        &mut self,
        address: &PeerAddress,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        delegate!(self, t => t.connect(address, timeout).await)
    }

    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        delegate!(self, t => t.write(frame).await)
    }

    fn is_connected(&self) -> bool {
        delegate!(self, t => t.is_connected())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        delegate!(self, t => t.disconnect().await)
    }
}
