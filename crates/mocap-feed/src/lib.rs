pub mod assembler;
pub mod protocol;
pub mod types;

use anyhow::Result;
use assembler::SampleAssembler;
use protocol::{FeedError, FeedParser};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
pub use types::{FeedEvent, FrameInfo, PoseSample};

/// Client for the pose feed.
///
/// Reads the line-framed feed from a TCP relay (or any async reader), stamps
/// each record with a local monotonic clock, and delivers frame and pose
/// events in arrival order.
///
/// Stamps are taken when a record is parsed, so records that arrive in one
/// read share nearly the same wall time. Replayed feeds should be timed by
/// the capture timecode instead.
pub struct FeedClient {
    event_rx: mpsc::UnboundedReceiver<FeedEvent>,
    _task: tokio::task::JoinHandle<()>,
}

impl FeedClient {
    /// Connect to a feed relay at `addr` (`host:port`) and start reading.
    pub async fn connect(addr: &str) -> Result<Self> {
        tracing::info!(%addr, "Connecting to pose feed");
        let stream = TcpStream::connect(addr).await?;
        tracing::info!("Connected to pose feed");
        Ok(Self::from_reader(stream))
    }

    /// Read the feed from standard input.
    pub fn stdin() -> Self {
        tracing::info!("Reading pose feed from stdin");
        Self::from_reader(tokio::io::stdin())
    }

    /// Start reading the feed from an arbitrary byte stream.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(feed_read_loop(reader, event_tx, Instant::now()));
        Self {
            event_rx,
            _task: task,
        }
    }

    /// Wait for the next event. Returns `None` once the feed has ended.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.event_rx.recv().await
    }
}

/// Background task: read bytes, parse records, assemble samples, publish events.
async fn feed_read_loop<R>(
    mut reader: R,
    event_tx: mpsc::UnboundedSender<FeedEvent>,
    clock: Instant,
) where
    R: AsyncRead + Unpin,
{
    let mut parser = FeedParser::new();
    let mut assembler = SampleAssembler::new();
    let mut buf = [0u8; 4096];
    let mut record_count: u64 = 0;

    loop {
        let eof = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::info!(record_count, "Pose feed closed");
                // Terminate a trailing record that lacks a line break.
                parser.push_data(b"\n");
                true
            }
            Ok(n) => {
                parser.push_data(&buf[..n]);
                false
            }
            Err(e) => {
                tracing::error!(?e, "Pose feed read error");
                break;
            }
        };

        // Drain all available records.
        while let Some(result) = parser.next_record() {
            match result {
                Ok(record) => {
                    record_count += 1;
                    let wall_time = clock.elapsed().as_secs_f64();
                    if let Some(event) = assembler.on_record(record, wall_time) {
                        if event_tx.send(event).is_err() {
                            tracing::debug!("Feed consumer dropped, stopping reader");
                            return;
                        }
                    }
                }
                Err(FeedError::MissingPosition(id)) => {
                    tracing::warn!(rigid_body_id = id, "Dropping pose without position");
                }
                Err(e) => {
                    tracing::trace!(?e, "Skipping malformed feed record");
                }
            }
        }

        if eof {
            break;
        }
    }
}
