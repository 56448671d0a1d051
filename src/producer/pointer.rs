//! Pointer (mouse) telemetry producer.
//!
//! Reads the 3-byte PS/2-style records a Linux `mousedev` node emits
//! (`/dev/input/mice`, `/dev/input/by-id/*-mouse`):
//!
//! ```text
//! ┌─────────────┬──────────┬──────────┐
//! │ buttons: u8 │ dx: i8   │ dy: i8   │
//! └─────────────┴──────────┴──────────┘
//! ```
//!
//! A short read means the device went away; the loop stops with an error.

use bytes::Buf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tracing::{debug, error, info, trace};

use super::shutdown_requested;
use crate::calibration::CalibrationProfile;
use crate::error::{FusionError, Result};
use crate::position::PositionAccumulator;
use crate::telemetry::{TelemetryFrame, TelemetryPublisher};

/// Size of one pointer record in bytes
pub const POINTER_RECORD_LEN: usize = 3;

/// One decoded pointer record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerRecord {
    pub buttons: u8,
    pub dx: i8,
    pub dy: i8,
}

impl PointerRecord {
    pub fn decode(raw: [u8; POINTER_RECORD_LEN]) -> Self {
        let mut buf = &raw[..];
        Self {
            buttons: buf.get_u8(),
            dx: buf.get_i8(),
            dy: buf.get_i8(),
        }
    }
}

/// Reads pointer records, accumulates them and publishes position-only frames
pub struct PointerProducer<R> {
    reader: R,
    position: Arc<PositionAccumulator>,
    profile: CalibrationProfile,
    publisher: Arc<TelemetryPublisher>,
}

impl<R> PointerProducer<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(
        reader: R,
        position: Arc<PositionAccumulator>,
        profile: CalibrationProfile,
        publisher: Arc<TelemetryPublisher>,
    ) -> Self {
        Self {
            reader,
            position,
            profile,
            publisher,
        }
    }

    /// Reads exactly one record from the device.
    ///
    /// # Errors
    ///
    /// Returns `PointerRead` on I/O failure or end of stream.
    pub async fn read_record(&mut self) -> Result<PointerRecord> {
        let mut raw = [0u8; POINTER_RECORD_LEN];
        self.reader
            .read_exact(&mut raw)
            .await
            .map_err(FusionError::PointerRead)?;
        Ok(PointerRecord::decode(raw))
    }

    /// One read, accumulate, publish cycle.
    ///
    /// The frame is built even when the publisher has no peer.
    pub async fn step(&mut self) -> Result<TelemetryFrame> {
        let record = self.read_record().await?;
        trace!(?record, "Pointer record");

        self.position.add(i64::from(record.dx), i64::from(record.dy));

        let frame = TelemetryFrame::position_only(self.position.read_centimeters(&self.profile));
        self.publisher.publish(&frame).await;
        Ok(frame)
    }

    /// Runs until shutdown or a read failure.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Pointer telemetry started ({} at {} dpi)", self.profile.name(), self.profile.dpi());

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    debug!("Pointer telemetry stopping");
                    return Ok(());
                }
                result = self.step() => {
                    if let Err(e) = result {
                        error!("Pointer telemetry stopped: {}", e);
                        return Err(e);
                    }
                }
            }
        }
    }
}
