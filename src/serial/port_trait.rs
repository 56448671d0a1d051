//! Trait abstraction for opening serial devices to enable testing

use crate::error::Result;

/// Opens a serial device by path
pub trait SerialOpener {
    /// Open port type
    type Port;

    /// Open the device at `path`
    fn open(&self, path: &str) -> Result<Self::Port>;
}

/// Opens devices with `tokio-serial` at a fixed baud rate, 8N1, no flow control
#[derive(Debug, Clone, Copy)]
pub struct TokioSerialOpener {
    baud_rate: u32,
}

impl TokioSerialOpener {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

impl SerialOpener for TokioSerialOpener {
    type Port = tokio_serial::SerialStream;

    fn open(&self, path: &str) -> Result<Self::Port> {
        use tokio_serial::SerialPortBuilderExt;

        tokio_serial::new(path, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| crate::error::FusionError::Serial(format!("Failed to open {}: {}", path, e)))
    }
}
