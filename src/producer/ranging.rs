//! Ranging telemetry producer.
//!
//! The ranging sensor prints one ASCII line per measurement:
//!
//! ```text
//! <range>,<angle_h>,<angle_v>\r\n
//! ```
//!
//! Lines missing any of the three fields are skipped, as are lines longer than
//! [`MAX_LINE_LEN`]. Field contents are not validated and are forwarded as
//! received.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::shutdown_requested;
use crate::calibration::CalibrationProfile;
use crate::error::{FusionError, Result};
use crate::position::PositionAccumulator;
use crate::telemetry::{RangingReading, TelemetryFrame, TelemetryPublisher};

/// Longest accepted sensor line, terminator included
pub const MAX_LINE_LEN: usize = 256;

/// Parses one sensor line.
///
/// Strips the line terminator and splits on commas. Returns `None` unless the
/// first three fields are present and non-empty; extra fields are ignored.
///
/// # Examples
///
/// ```
/// use range_fusion::producer::parse_ranging_line;
/// use range_fusion::telemetry::RangingReading;
///
/// assert_eq!(
///     parse_ranging_line("12.5,30,45\n"),
///     Some(RangingReading::new("12.5", "30", "45"))
/// );
/// assert_eq!(parse_ranging_line("12.5,30\n"), None);
/// ```
pub fn parse_ranging_line(line: &str) -> Option<RangingReading> {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    let mut fields = line.split(',').map(|field| Some(field).filter(|f| !f.is_empty()));

    let range = fields.next().flatten()?;
    let angle_h = fields.next().flatten()?;
    let angle_v = fields.next().flatten()?;
    Some(RangingReading::new(range, angle_h, angle_v))
}

/// Reads sensor lines and publishes them fused with the current position
pub struct RangingProducer<R> {
    reader: R,
    position: Arc<PositionAccumulator>,
    profile: CalibrationProfile,
    publisher: Arc<TelemetryPublisher>,
    line: Vec<u8>,
}

impl<R> RangingProducer<R>
where
    R: AsyncBufRead + Unpin,
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
            line: Vec::with_capacity(64),
        }
    }

    /// Reads the next line, including its terminator.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; sensors often emit
    /// garbage while resetting. A line that reaches [`MAX_LINE_LEN`] without
    /// a terminator is discarded up to the next newline and reported as
    /// `None`, so a sensor at the wrong baud rate cannot grow the buffer.
    ///
    /// # Errors
    ///
    /// Returns `SerialRead` on I/O failure, or with `UnexpectedEof` when the
    /// device closes.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        self.line.clear();
        let read = (&mut self.reader)
            .take(MAX_LINE_LEN as u64)
            .read_until(b'\n', &mut self.line)
            .await
            .map_err(FusionError::SerialRead)?;

        if read == 0 {
            return Err(FusionError::SerialRead(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "serial device closed",
            )));
        }

        if read == MAX_LINE_LEN && self.line.last() != Some(&b'\n') {
            warn!("Discarding ranging line longer than {} bytes", MAX_LINE_LEN);
            self.discard_rest_of_line().await?;
            return Ok(None);
        }

        Ok(Some(String::from_utf8_lossy(&self.line).into_owned()))
    }

    /// Consumes input up to and including the next newline, without buffering it.
    async fn discard_rest_of_line(&mut self) -> Result<()> {
        loop {
            let available = self.reader.fill_buf().await.map_err(FusionError::SerialRead)?;
            if available.is_empty() {
                // End of stream; the next read reports it
                return Ok(());
            }

            match available.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.reader.consume(end + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    self.reader.consume(len);
                }
            }
        }
    }

    /// One read, parse, publish cycle.
    ///
    /// # Returns
    ///
    /// The published frame, or `None` if the line was skipped.
    pub async fn step(&mut self) -> Result<Option<TelemetryFrame>> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };

        let Some(reading) = parse_ranging_line(&line) else {
            debug!("Skipping incomplete ranging line {:?}", line.trim_end());
            return Ok(None);
        };

        let frame = TelemetryFrame::ranging(reading, self.position.read_centimeters(&self.profile));
        self.publisher.publish(&frame).await;
        Ok(Some(frame))
    }

    /// Runs until shutdown or a read failure.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Ranging telemetry started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    debug!("Ranging telemetry stopping");
                    return Ok(());
                }
                result = self.step() => {
                    if let Err(e) = result {
                        error!("Ranging telemetry stopped: {}", e);
                        return Err(e);
                    }
                }
            }
        }
    }
}
