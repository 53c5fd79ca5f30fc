//! Session - wireless link bookkeeping
//!
//! Created once after discovery, destroyed at process shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Peer device identifier (BLE MAC, socket address, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Peer found by discovery, never connected yet
    #[default]
    Discovered,
    /// Connect attempt in progress
    Connecting,
    /// Link open, frames may be written
    Connected,
    /// Link lost or closed
    Disconnected,
}

/// Logical connection to the haptic actuator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub address: PeerAddress,
    pub state: SessionState,
    /// Failed connect attempts since the last successful connect
    pub retry_count: u32,
}

impl Session {
    /// New session for a freshly discovered peer
    pub fn discovered(address: PeerAddress) -> Self {
        Self {
            address,
            state: SessionState::Discovered,
            retry_count: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }
}
