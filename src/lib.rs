//! Host-side streaming engine for Ether Dream laser DACs.
//!
//! This crate keeps a single Ether Dream DAC's playback FIFO continuously
//! refilled over TCP within a caller-chosen latency budget. Points are
//! pulled on demand from a user-supplied generator callback; a dedicated
//! worker thread per device drives the protocol state machine (idle →
//! prepared → playing), recovers from e-stop and underflow conditions,
//! and schedules refills from an estimate of the remaining FIFO depth.
//!
//! # Getting started
//!
//! ```no_run
//! use etherdream_stream::{EtherDreamDevice, LaserPoint, NetService};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One I/O service for the lifetime of the process.
//!     let service = NetService::new()?;
//!
//!     let mut device = EtherDreamDevice::new(&service);
//!     device.set_callback(Box::new(|request, points| {
//!         for _ in 0..request.minimum_points_required {
//!             points.push(LaserPoint::blanked(0.0, 0.0));
//!         }
//!     }))?;
//!
//!     device.connect("192.168.1.42", None)?;
//!     device.start()?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!
//!     device.stop();
//!     device.close();
//!     Ok(())
//! }
//! ```
//!
//! # Coordinate system
//!
//! - X: -1.0 (left) to 1.0 (right)
//! - Y: -1.0 (bottom) to 1.0 (top)
//! - Colours, intensity and user channels: 0.0 to 1.0
//!
//! Conversion to the DAC's native 16-bit format, including clamping of
//! out-of-range values, happens during frame encoding.

pub mod config;
mod device;
mod error;
pub mod ether_dream;
pub mod logging;
pub mod net;
pub mod protocol;
pub mod types;

// Error types
pub use error::{Error, Result};

// Networking
pub use net::{NetService, TcpClient};

// The device
pub use ether_dream::EtherDreamDevice;

// Core types
pub use types::{FillCallback, LaserPoint, PointFillRequest};
