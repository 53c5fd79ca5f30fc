//! LogTransport - frames go to the tracing log

use std::time::Duration;

use contracts::{wire, LinkTransport, PeerAddress, TransportError};
use tracing::{info, instrument};

/// Always-connected transport that logs every frame
pub struct LogTransport {
    name: String,
    connected: bool,
    frames_written: u64,
}

impl LogTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        Self::new("log")
    }
}

impl LinkTransport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn discover(
        &mut self,
        name_filter: &str,
        _scan_window: Duration,
    ) -> Result<Option<PeerAddress>, TransportError> {
        info!(transport = %self.name, name_filter, "log peer discovered");
        Ok(Some(PeerAddress::new(format!("log:{name_filter}"))))
    }

    async fn connect(
        &mut self,
        address: &PeerAddress,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        info!(transport = %self.name, %address, "log link open");
        self.connected = true;
        Ok(())
    }

    #[instrument(name = "log_transport_write", skip(self, frame), fields(transport = %self.name))]
    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.frames_written += 1;
        match wire::parse_bytes(frame) {
            Ok(report) => info!(
                frame = self.frames_written,
                signal = report.signal.code(),
                distance_cm = report.distance_cm,
                outer_cm = report.outer_threshold_cm,
                inner_cm = report.inner_threshold_cm,
                "proximity frame"
            ),
            Err(_) => info!(
                frame = self.frames_written,
                raw = %String::from_utf8_lossy(frame).escape_debug(),
                "raw frame"
            ),
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        info!(transport = %self.name, frames = self.frames_written, "log link closed");
        self.connected = false;
        Ok(())
    }
}
