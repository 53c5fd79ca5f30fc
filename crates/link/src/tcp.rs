//! TcpBridgeTransport - TCP 桥接链路
//!
//! 每个 bridge 在 accept 后先发送一行广播名（`<name>\n`），之后透传
//! 收到的帧。discovery 依次探测 `peers`，返回第一个广播名包含过滤串的地址。

use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::time::Duration;

use contracts::{LinkTransport, PeerAddress, TransportError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, instrument, warn};

/// Longest accepted greeting line
const MAX_GREETING: usize = 256;

/// TCP 桥接链路
pub struct TcpBridgeTransport {
    peers: Vec<String>,
    stream: Option<BufReader<TcpStream>>,
}

impl TcpBridgeTransport {
    pub fn new(peers: Vec<String>) -> Self {
        Self {
            peers,
            stream: None,
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }
}

struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

/// Non-blocking peek: `false` once the peer closed or reset the socket
fn peer_alive(stream: &TcpStream) -> bool {
    let waker = Waker::from(Arc::new(NoopWake));
    let mut cx = Context::from_waker(&waker);
    let mut byte = [0u8; 1];
    let mut buf = ReadBuf::new(&mut byte);
    match stream.poll_peek(&mut cx, &mut buf) {
        // orderly close
        Poll::Ready(Ok(0)) => false,
        Poll::Ready(Ok(_)) | Poll::Pending => true,
        Poll::Ready(Err(_)) => false,
    }
}

async fn read_greeting(stream: &mut BufReader<TcpStream>) -> Result<String, TransportError> {
    let mut line = String::new();
    let n = (&mut *stream)
        .take(MAX_GREETING as u64)
        .read_line(&mut line)
        .await?;
    if n == 0 {
        return Err(TransportError::Disconnected);
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn probe(peer: &str) -> Result<String, TransportError> {
    let stream = TcpStream::connect(peer).await?;
    let mut reader = BufReader::new(stream);
    read_greeting(&mut reader).await
}

impl LinkTransport for TcpBridgeTransport {
    fn name(&self) -> &str {
        "tcp_bridge"
    }

    #[instrument(name = "tcp_bridge_discover", skip(self), fields(peers = self.peers.len()))]
    async fn discover(
        &mut self,
        name_filter: &str,
        scan_window: Duration,
    ) -> Result<Option<PeerAddress>, TransportError> {
        let deadline = Instant::now() + scan_window;

        for peer in &self.peers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, probe(peer)).await {
                Ok(Ok(advertised)) if advertised.contains(name_filter) => {
                    info!(peer = %peer, advertised = %advertised, "bridge peer matched");
                    return Ok(Some(PeerAddress::new(peer.clone())));
                }
                Ok(Ok(advertised)) => {
                    debug!(peer = %peer, advertised = %advertised, "bridge peer name mismatch");
                }
                Ok(Err(e)) => debug!(peer = %peer, error = %e, "bridge peer unreachable"),
                Err(_) => break,
            }
        }
        Ok(None)
    }

    #[instrument(name = "tcp_bridge_connect", skip(self), fields(address = %address))]
    async fn connect(
        &mut self,
        address: &PeerAddress,
        timeout_after: Duration,
    ) -> Result<(), TransportError> {
        self.stream = None;

        let attempt = async {
            let stream = TcpStream::connect(address.as_str()).await?;
            stream.set_nodelay(true)?;
            let mut reader = BufReader::new(stream);
            let advertised = read_greeting(&mut reader).await?;
            Ok::<_, TransportError>((reader, advertised))
        };

        match timeout(timeout_after, attempt).await {
            Ok(Ok((reader, advertised))) => {
                info!(advertised = %advertised, "bridge link open");
                self.stream = Some(reader);
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::connect_failed(address.as_str(), e.to_string())),
            Err(_) => Err(TransportError::Timeout {
                waited_ms: timeout_after.as_millis() as u64,
            }),
        }
    }

    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::Disconnected);
        };

        let result = async {
            let inner = stream.get_mut();
            inner.write_all(frame).await?;
            inner.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(error = %e, "bridge write failed, dropping link");
            self.stream = None;
            return Err(TransportError::write_failed(e.to_string()));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| peer_alive(stream.get_ref()))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream.get_mut().shutdown().await?;
        }
        Ok(())
    }
}
