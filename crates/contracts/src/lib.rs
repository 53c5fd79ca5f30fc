//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Tick Model
//! - One tick = both sources publish, the consumer fuses and releases
//! - Tick numbers are assigned by the sync barrier, monotonically increasing
//! - All coordinates are pixels of the thermal (hazard) frame

mod blueprint;
mod calibration;
mod error;
mod observation;
mod report;
mod sensor_source;
mod session;
mod transport;
pub mod wire;

pub use blueprint::*;
pub use calibration::*;
pub use error::*;
pub use observation::*;
pub use report::*;
pub use sensor_source::*;
pub use session::*;
pub use transport::{LinkTransport, LocalLinkTransport};
