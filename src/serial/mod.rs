//! # Serial Communication Module
//!
//! Locates the ranging sensor's serial device.
//!
//! The sensor enumerates under a different `/dev/tty*` name depending on the
//! board and the order devices were plugged in, so a fixed list of candidate
//! paths is tried in order until one opens. Running without a sensor is not an
//! error: ranging telemetry is simply disabled.

pub mod port_trait;

pub use port_trait::{SerialOpener, TokioSerialOpener};

use tracing::{debug, info, warn};

/// An open serial device and the path it was found at
pub struct SerialHandle<P> {
    /// Serial port handle
    port: P,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
}

impl<P> std::fmt::Debug for SerialHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialHandle")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl<P> SerialHandle<P> {
    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Hand the port to its reader
    pub fn into_port(self) -> P {
        self.port
    }
}

/// Open the first candidate device that opens successfully
///
/// Candidates are tried strictly in order; the search stops at the first
/// success, so later candidates are never touched. Failures are logged and
/// skipped.
///
/// # Arguments
///
/// * `opener` - Opens one device path
/// * `candidates` - Device paths to try (e.g., &["/dev/ttyACM0"])
///
/// # Returns
///
/// * `Option<SerialHandle>` - The opened device, or `None` if every candidate failed
///
/// # Examples
///
/// ```no_run
/// use range_fusion::serial::{resolve_serial, TokioSerialOpener};
///
/// let handle = resolve_serial(&TokioSerialOpener::new(9600), &["/dev/ttyACM0", "/dev/ttyUSB0"]);
/// if let Some(handle) = handle {
///     println!("Ranging sensor at {}", handle.device_path());
/// }
/// ```
pub fn resolve_serial<O, S>(opener: &O, candidates: &[S]) -> Option<SerialHandle<O::Port>>
where
    O: SerialOpener,
    S: AsRef<str>,
{
    for path in candidates.iter().map(AsRef::as_ref) {
        debug!("Trying serial device {}", path);

        match opener.open(path) {
            Ok(port) => {
                info!("Serial device found at {}", path);
                return Some(SerialHandle {
                    port,
                    device_path: path.to_string(),
                });
            }
            Err(e) => {
                warn!("Could not open {}, trying the next one: {}", path, e);
            }
        }
    }

    info!(
        "Serial device not connected (tried {} candidates); ranging telemetry disabled",
        candidates.len()
    );
    None
}
