//! Best-effort UDP publisher shared by both producers.
//!
//! Without a discovered peer the publisher is disconnected and every frame is
//! dropped. Send failures are logged and counted; nothing is retried.

use async_trait::async_trait;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UdpSocket;
use tracing::{info, trace, warn};

use super::frame::TelemetryFrame;
use crate::discovery::PeerAddress;
use crate::error::Result;

/// Connected datagram endpoint
#[async_trait]
pub trait DatagramSink: Send + Sync {
    /// Send one datagram to the connected peer
    async fn send(&self, payload: &[u8]) -> io::Result<usize>;
}

#[async_trait]
impl DatagramSink for UdpSocket {
    async fn send(&self, payload: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, payload).await
    }
}

/// Binds an ephemeral UDP socket and connects it to the peer.
pub async fn connect_udp(peer: &PeerAddress) -> Result<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(peer.socket_addr()).await?;
    Ok(socket)
}

/// Frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Frames handed to the socket
    pub sent: u64,
    /// Frames discarded because no peer was discovered
    pub dropped: u64,
    /// Frames the socket refused
    pub failed: u64,
}

/// Formats frames and sends them as single datagrams
pub struct TelemetryPublisher {
    sink: Option<Box<dyn DatagramSink>>,
    sent: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl std::fmt::Debug for TelemetryPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPublisher")
            .field("connected", &self.is_connected())
            .field("stats", &self.stats())
            .finish()
    }
}

impl TelemetryPublisher {
    /// Publisher that sends through `sink`
    pub fn connected(sink: impl DatagramSink + 'static) -> Self {
        Self::with_sink(Some(Box::new(sink)))
    }

    /// Publisher that drops every frame
    pub fn disconnected() -> Self {
        Self::with_sink(None)
    }

    fn with_sink(sink: Option<Box<dyn DatagramSink>>) -> Self {
        Self {
            sink,
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_some()
    }

    /// Sends one frame.
    ///
    /// # Returns
    ///
    /// `true` if the datagram was handed to the socket. `false` if it was
    /// dropped (no peer) or the send failed; neither is an error for the caller.
    pub async fn publish(&self, frame: &TelemetryFrame) -> bool {
        let Some(sink) = &self.sink else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("No peer, dropping frame {}", frame);
            return false;
        };

        let payload = frame.to_string();
        match sink.send(payload.as_bytes()).await {
            Ok(_) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                info!("{}", payload);
                true
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to send telemetry frame {}: {}", payload, e);
                false
            }
        }
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock datagram sink for testing
    #[derive(Clone, Default)]
    pub struct MockSink {
        pub sent_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub send_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl MockSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_sent_data(&self) -> Vec<Vec<u8>> {
            self.sent_data.lock().unwrap().clone()
        }

        pub fn get_sent_strings(&self) -> Vec<String> {
            self.get_sent_data()
                .into_iter()
                .map(|data| String::from_utf8(data).unwrap())
                .collect()
        }

        pub fn set_send_error(&self, error: io::ErrorKind) {
            *self.send_error.lock().unwrap() = Some(error);
        }
    }

    #[async_trait]
    impl DatagramSink for MockSink {
        async fn send(&self, payload: &[u8]) -> io::Result<usize> {
            if let Some(error) = *self.send_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock send error"));
            }
            self.sent_data.lock().unwrap().push(payload.to_vec());
            Ok(payload.len())
        }
    }
}
