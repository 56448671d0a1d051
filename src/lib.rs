//! # Range Fusion Library
//!
//! Fuse mouse odometry and serial ranging data into a UDP telemetry stream.
//!
//! At startup the library locates the ranging sensor's serial device and scans
//! the local subnet for the telemetry sink. Two producers then run side by
//! side: one accumulates pointer displacement, the other reads ranging lines,
//! and both publish comma-separated frames to the sink over UDP.

pub mod calibration;
pub mod config;
pub mod discovery;
pub mod error;
pub mod pipeline;
pub mod position;
pub mod producer;
pub mod serial;
pub mod telemetry;
