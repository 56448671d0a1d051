//! # Telemetry Module
//!
//! Outbound telemetry stream.
//!
//! This module handles:
//! - Formatting position-only and ranging frames as comma-separated text
//! - Sending each frame as one UDP datagram to the discovered peer
//! - Dropping frames when no peer was found

pub mod frame;
pub mod publisher;

pub use frame::{RangingReading, TelemetryFrame};
pub use publisher::{connect_udp, DatagramSink, PublisherStats, TelemetryPublisher};
