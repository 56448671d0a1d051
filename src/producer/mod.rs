//! # Producer Module
//!
//! The two long-running sensor loops.
//!
//! - [`PointerProducer`]: reads mouse displacement records, updates the shared
//!   position and publishes position-only frames.
//! - [`RangingProducer`]: reads `range,angle_h,angle_v` lines from the serial
//!   sensor and publishes them fused with the current position.
//!
//! Each loop blocks only on its own device read. Both stop when the shutdown
//! signal flips to `true`. [`PointerDevice`] keeps the pointer read
//! cancellable so stopping never waits on the hardware.

pub mod device;
pub mod pointer;
pub mod ranging;

pub use device::PointerDevice;
pub use pointer::{PointerProducer, PointerRecord};
pub use ranging::{parse_ranging_line, RangingProducer};

use tokio::sync::watch;

/// Resolves once shutdown has been requested.
///
/// A dropped sender is not a shutdown request; the future then never resolves.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
