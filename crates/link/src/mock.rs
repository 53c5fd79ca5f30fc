//! Mock 链路
//!
//! 用于单元测试的 mock 实现，支持注入失败场景。
//! 状态通过 [`MockProbe`] 共享，测试可在 session 运行期间观察和断链。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use contracts::{LinkTransport, PeerAddress, TransportError};
use tracing::instrument;

/// Mock 链路配置
#[derive(Debug, Clone)]
pub struct MockTransportConfig {
    /// 前 N 次扫描找不到 peer
    pub discovery_misses: u32,
    /// 前 N 次连接直接失败
    pub connect_failures: u32,
    /// 前 N 次连接永不返回（由调用方超时）
    pub connect_hangs: u32,
    /// 每次连接后写入 N 帧即断链
    pub drop_after_writes: Option<u64>,
    /// 前 N 次写入永不返回
    pub write_hangs: u32,
    /// 挂起之后的 N 次写入失败
    pub write_failures: u32,
    /// 每次写入的耗时（慢链路）
    pub write_delay: Option<Duration>,
    /// discovery 返回的地址
    pub peer_address: String,
}

impl Default for MockTransportConfig {
    fn default() -> Self {
        Self {
            discovery_misses: 0,
            connect_failures: 0,
            connect_hangs: 0,
            drop_after_writes: None,
            write_hangs: 0,
            write_failures: 0,
            write_delay: None,
            peer_address: "AA:BB:CC:DD:EE:FF".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    frames: Vec<Bytes>,
    discover_calls: u32,
    connect_attempts: u32,
    connects: u32,
    disconnects: u32,
    writes_since_connect: u64,
    write_attempts: u32,
}

/// Mock 链路
pub struct MockTransport {
    config: MockTransportConfig,
    state: Arc<Mutex<MockState>>,
}

/// Shared view of a [`MockTransport`]
#[derive(Clone)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_config(MockTransportConfig::default())
    }

    pub fn with_config(config: MockTransportConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// 获取共享的观察句柄
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProbe {
    /// 已写入的帧
    pub fn frames(&self) -> Vec<Bytes> {
        lock(&self.state).frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        lock(&self.state).frames.len()
    }

    pub fn discover_calls(&self) -> u32 {
        lock(&self.state).discover_calls
    }

    /// 连接尝试次数（含失败和挂起）
    pub fn connect_attempts(&self) -> u32 {
        lock(&self.state).connect_attempts
    }

    /// 成功连接次数
    pub fn connects(&self) -> u32 {
        lock(&self.state).connects
    }

    pub fn disconnects(&self) -> u32 {
        lock(&self.state).disconnects
    }

    /// 写入尝试次数（含失败和挂起）
    pub fn write_attempts(&self) -> u32 {
        lock(&self.state).write_attempts
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// 模拟对端断链
    pub fn drop_link(&self) {
        lock(&self.state).connected = false;
    }
}

impl LinkTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    #[instrument(name = "mock_link_discover", skip(self, _scan_window))]
    async fn discover(
        &mut self,
        name_filter: &str,
        _scan_window: Duration,
    ) -> Result<Option<PeerAddress>, TransportError> {
        let mut state = lock(&self.state);
        state.discover_calls += 1;
        if state.discover_calls <= self.config.discovery_misses {
            return Ok(None);
        }
        Ok(Some(PeerAddress::new(self.config.peer_address.clone())))
    }

    #[instrument(name = "mock_link_connect", skip(self, _timeout), fields(address = %address))]
    async fn connect(
        &mut self,
        address: &PeerAddress,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        let attempt = {
            let mut state = lock(&self.state);
            state.connect_attempts += 1;
            state.connect_attempts
        };

        if attempt <= self.config.connect_hangs {
            std::future::pending::<()>().await;
        }
        if attempt <= self.config.connect_hangs + self.config.connect_failures {
            return Err(TransportError::connect_failed(
                address.as_str(),
                format!("injected failure on attempt {attempt}"),
            ));
        }

        let mut state = lock(&self.state);
        state.connected = true;
        state.connects += 1;
        state.writes_since_connect = 0;
        Ok(())
    }

    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let attempt = {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(TransportError::Disconnected);
            }
            state.write_attempts += 1;
            state.write_attempts
        };

        if attempt <= self.config.write_hangs {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.config.write_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if attempt <= self.config.write_hangs.saturating_add(self.config.write_failures) {
            state.connected = false;
            return Err(TransportError::write_failed("injected write failure"));
        }
        // dropped while the write was in flight
        if !state.connected {
            return Err(TransportError::Disconnected);
        }

        state.frames.push(Bytes::copy_from_slice(frame));
        state.writes_since_connect += 1;
        if self
            .config
            .drop_after_writes
            .is_some_and(|limit| state.writes_since_connect >= limit)
        {
            state.connected = false;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.disconnects += 1;
        Ok(())
    }
}
