//! # Pipeline
//!
//! Runs the pointer and ranging producers side by side.
//!
//! Both producers share one [`PositionAccumulator`] and one
//! [`TelemetryPublisher`]. Each runs on its own task, so a stalled or failed
//! device never blocks the other. The ranging producer only starts when a
//! serial device was found *and* a peer was discovered.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncRead};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::calibration::CalibrationProfile;
use crate::error::Result;
use crate::position::PositionAccumulator;
use crate::producer::{PointerProducer, RangingProducer};
use crate::telemetry::{PublisherStats, TelemetryPublisher};

/// How a producer ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerOutcome {
    /// Never started
    Inactive,
    /// Stopped by the shutdown signal
    Stopped,
    /// Terminated by an error
    Failed(String),
}

/// Final state of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub pointer: ProducerOutcome,
    pub ranging: ProducerOutcome,
    pub stats: PublisherStats,
}

/// Shared state for both producers
#[derive(Debug)]
pub struct Pipeline {
    position: Arc<PositionAccumulator>,
    publisher: Arc<TelemetryPublisher>,
    profile: CalibrationProfile,
}

impl Pipeline {
    pub fn new(profile: CalibrationProfile, publisher: TelemetryPublisher) -> Self {
        Self {
            position: Arc::new(PositionAccumulator::new()),
            publisher: Arc::new(publisher),
            profile,
        }
    }

    pub fn position(&self) -> Arc<PositionAccumulator> {
        Arc::clone(&self.position)
    }

    pub fn publisher(&self) -> Arc<TelemetryPublisher> {
        Arc::clone(&self.publisher)
    }

    /// Spawns the active producers and waits for both to finish.
    ///
    /// # Arguments
    ///
    /// * `pointer` - Pointer device stream, if one was opened
    /// * `ranging` - Serial device stream, if one was found
    /// * `shutdown` - Flips to `true` to stop both loops
    pub async fn run<P, S>(
        self,
        pointer: Option<P>,
        ranging: Option<S>,
        shutdown: watch::Receiver<bool>,
    ) -> PipelineReport
    where
        P: AsyncRead + Unpin + Send + 'static,
        S: AsyncBufRead + Unpin + Send + 'static,
    {
        let pointer_task = match pointer {
            Some(reader) => {
                let producer = PointerProducer::new(
                    reader,
                    self.position(),
                    self.profile,
                    self.publisher(),
                );
                Some(tokio::spawn(producer.run(shutdown.clone())))
            }
            None => {
                info!("No pointer device; pointer telemetry disabled");
                None
            }
        };

        let ranging_task = match ranging {
            Some(reader) if self.publisher.is_connected() => {
                let producer = RangingProducer::new(
                    reader,
                    self.position(),
                    self.profile,
                    self.publisher(),
                );
                Some(tokio::spawn(producer.run(shutdown.clone())))
            }
            Some(_) => {
                info!("No telemetry sink; ranging telemetry disabled");
                None
            }
            None => None,
        };

        let pointer = outcome(pointer_task).await;
        let ranging = outcome(ranging_task).await;

        PipelineReport {
            pointer,
            ranging,
            stats: self.publisher.stats(),
        }
    }
}

async fn outcome(task: Option<JoinHandle<Result<()>>>) -> ProducerOutcome {
    match task {
        None => ProducerOutcome::Inactive,
        Some(handle) => match handle.await {
            Ok(Ok(())) => ProducerOutcome::Stopped,
            Ok(Err(e)) => ProducerOutcome::Failed(e.to_string()),
            Err(e) => ProducerOutcome::Failed(format!("task aborted: {}", e)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::device::test_support::make_fifo;
    use crate::producer::PointerDevice;
    use crate::telemetry::publisher::mocks::MockSink;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
    use tokio_test::io::{Builder, Mock};

    fn profile() -> CalibrationProfile {
        CalibrationProfile::new("test", "/dev/null", 1000.0)
    }

    #[tokio::test]
    async fn test_no_peer_sends_nothing_but_tracks_position() {
        let pipeline = Pipeline::new(profile(), TelemetryPublisher::disconnected());
        let position = pipeline.position();

        let pointer = Builder::new()
            .read(&[0x00, 10, 20])
            .read(&[0x01, 0xF6, 5])
            .read(&[0x00, 3, 3])
            .build();
        // Left unread: ranging must not start without a peer
        let ranging = BufReader::new(Builder::new().build());
        let (_tx, rx) = watch::channel(false);

        let report = pipeline.run(Some(pointer), Some(ranging), rx).await;

        assert_eq!(position.read(), (3, 28));
        assert_eq!(report.stats, PublisherStats { sent: 0, dropped: 3, failed: 0 });
        assert_eq!(report.ranging, ProducerOutcome::Inactive);
        assert!(matches!(report.pointer, ProducerOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_pointer_only_with_peer() {
        let sink = MockSink::new();
        let pipeline = Pipeline::new(profile(), TelemetryPublisher::connected(sink.clone()));

        let pointer = Builder::new().read(&[0x00, 100, 50]).read(&[0x00, 100, 0xCE]).build();
        let (_tx, rx) = watch::channel(false);

        let report = pipeline.run(Some(pointer), None::<BufReader<Mock>>, rx).await;

        assert_eq!(sink.get_sent_strings(), vec!["0,0,0,0.25,0.125", "0,0,0,0.5,0.0"]);
        assert_eq!(report.stats.sent, 2);
        assert_eq!(report.ranging, ProducerOutcome::Inactive);
    }

    #[tokio::test]
    async fn test_ranging_uses_shared_position() {
        let sink = MockSink::new();
        let pipeline = Pipeline::new(profile(), TelemetryPublisher::connected(sink.clone()));
        pipeline.position().add(400, 800);

        let ranging = BufReader::new(
            Builder::new()
                .read(b"12.5,30,45\n")
                .read(b"12.5,30\n")
                .build(),
        );
        let (_tx, rx) = watch::channel(false);

        let report = pipeline.run(None::<Mock>, Some(ranging), rx).await;

        assert_eq!(sink.get_sent_strings(), vec!["12.5,30,45,1.0,2.0"]);
        assert_eq!(report.pointer, ProducerOutcome::Inactive);
        assert!(matches!(report.ranging, ProducerOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_failed_pointer_does_not_stop_ranging() {
        let sink = MockSink::new();
        let pipeline = Pipeline::new(profile(), TelemetryPublisher::connected(sink.clone()));

        // Pointer fails immediately on a short read
        let pointer = Builder::new().read(&[0x00]).build();
        let (mut serial, serial_reader) = tokio::io::duplex(64);
        let (tx, rx) = watch::channel(false);

        let run = tokio::spawn(pipeline.run(Some(pointer), Some(BufReader::new(serial_reader)), rx));

        serial.write_all(b"1,2,3\n").await.unwrap();

        // Ranging is still alive after the pointer loop died
        let sent = async {
            while sink.get_sent_data().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(1), sent)
            .await
            .expect("ranging frame not published");

        tx.send(true).unwrap();
        let report = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("pipeline did not stop")
            .unwrap();

        assert!(matches!(report.pointer, ProducerOutcome::Failed(_)));
        assert_eq!(report.ranging, ProducerOutcome::Stopped);
        assert_eq!(sink.get_sent_strings(), vec!["1,2,3,0.0,0.0"]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_both_loops() {
        let sink = MockSink::new();
        let pipeline = Pipeline::new(profile(), TelemetryPublisher::connected(sink));

        let (_mouse, pointer) = tokio::io::duplex(64);
        let (_serial, serial_reader) = tokio::io::duplex(64);
        let (tx, rx) = watch::channel(false);

        let run = tokio::spawn(pipeline.run::<DuplexStream, BufReader<DuplexStream>>(
            Some(pointer),
            Some(BufReader::new(serial_reader)),
            rx,
        ));
        tx.send(true).unwrap();

        let report = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("pipeline did not stop")
            .unwrap();

        assert_eq!(report.pointer, ProducerOutcome::Stopped);
        assert_eq!(report.ranging, ProducerOutcome::Stopped);
        assert_eq!(report.stats, PublisherStats::default());
    }

    #[test]
    fn test_runtime_exits_with_idle_pointer_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mouse");
        make_fifo(&path);

        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();

        // The writer stays open and silent: no data, no end of stream
        let (report, _writer) = rt.block_on(async {
            let pointer = PointerDevice::open(&path).unwrap();
            let writer = std::fs::OpenOptions::new().write(true).open(&path).unwrap();

            let pipeline = Pipeline::new(profile(), TelemetryPublisher::disconnected());
            let (tx, rx) = watch::channel(false);
            let run = tokio::spawn(pipeline.run(Some(pointer), None::<BufReader<Mock>>, rx));

            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(true).unwrap();
            (run.await.unwrap(), writer)
        });
        assert_eq!(report.pointer, ProducerOutcome::Stopped);

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            drop(rt);
            let _ = done_tx.send(());
        });
        assert!(
            done_rx.recv_timeout(Duration::from_secs(2)).is_ok(),
            "runtime shutdown waited on the pointer read"
        );
    }
}
