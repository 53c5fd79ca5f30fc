//! LinkTransport trait - wireless link abstraction
//!
//! The link layer (scanning, pairing, GATT) is an external collaborator. The
//! session manager drives it only through this interface.

use std::time::Duration;

use crate::{PeerAddress, TransportError};

/// Wireless link to the actuator peer
///
/// A transport owns at most one open link at a time.
#[trait_variant::make(LinkTransport: Send)]
pub trait LocalLinkTransport {
    /// Transport name (used for logging)
    fn name(&self) -> &str;

    /// Scan for up to `scan_window` and return the first peer whose
    /// advertised name contains `name_filter` (case-sensitive).
    ///
    /// `Ok(None)` means the scan completed without a match.
    async fn discover(
        &mut self,
        name_filter: &str,
        scan_window: Duration,
    ) -> Result<Option<PeerAddress>, TransportError>;

    /// Open a link to `address`
    ///
    /// Implementations should give up after `timeout`; callers bound the
    /// attempt independently.
    async fn connect(
        &mut self,
        address: &PeerAddress,
        timeout: Duration,
    ) -> Result<(), TransportError>;

    /// Write one frame without waiting for a peer acknowledgment
    async fn write(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Link state query, called before each write
    fn is_connected(&self) -> bool;

    /// Close the link
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
