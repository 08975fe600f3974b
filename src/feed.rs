//! Binding event feed.
//!
//! External watchers connect over TCP and stream newline-delimited JSON
//! [`BindingEvent`]s. Events are applied in arrival order per connection.
//! Undecodable or oversized lines are logged and skipped.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::binding::{BindingEvent, SharedBinder};
use crate::error::BalancerError;
use crate::metrics;

/// Longest accepted event line in bytes, newline included.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Per-connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Events decoded and applied.
    pub applied: usize,
    /// Lines that failed to decode.
    pub rejected: usize,
}

enum Frame {
    Line,
    Oversized,
    Eof,
}

/// Read one newline-terminated frame into `buf`, holding at most
/// `MAX_LINE_LENGTH` bytes. Longer lines are drained and reported as
/// oversized.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_LENGTH as u64;

    buf.clear();
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(Frame::Eof);
    }
    if buf.last() == Some(&b'\n') || (n as u64) < limit {
        return Ok(Frame::Line);
    }

    loop {
        buf.clear();
        let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if n == 0 || buf.last() == Some(&b'\n') {
            return Ok(Frame::Oversized);
        }
    }
}

/// Apply every event read from `reader` until EOF.
pub async fn handle_connection<R>(
    mut reader: R,
    binder: SharedBinder,
) -> Result<FeedStats, BalancerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut buf = Vec::new();

    loop {
        match read_frame(&mut reader, &mut buf).await? {
            Frame::Eof => break,
            Frame::Oversized => {
                warn!("Skipping binding event longer than {} bytes", MAX_LINE_LENGTH);
                metrics::record_feed_decode_error();
                stats.rejected += 1;
                continue;
            }
            Frame::Line => {}
        }

        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_slice::<BindingEvent>(line) {
            Ok(event) => {
                binder.lock().apply(&event);
                stats.applied += 1;
            }
            Err(e) => {
                warn!("Failed to decode binding event: {}", e);
                metrics::record_feed_decode_error();
                stats.rejected += 1;
            }
        }
    }

    Ok(stats)
}

/// Accept feed connections until `shutdown` is cancelled.
pub async fn serve(listener: TcpListener, binder: SharedBinder, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Binding feed shutting down");
                return;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "Binding feed connected");
                        metrics::record_feed_connection();

                        let binder = binder.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                _ = shutdown.cancelled() => {
                                    debug!(%peer, "Binding feed connection dropped on shutdown");
                                }
                                result = handle_connection(BufReader::new(stream), binder) => {
                                    match result {
                                        Ok(stats) => info!(
                                            %peer,
                                            applied = stats.applied,
                                            rejected = stats.rejected,
                                            "Binding feed disconnected"
                                        ),
                                        Err(e) => {
                                            warn!(%peer, "Binding feed connection error: {}", e)
                                        }
                                    }
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept binding feed connection: {}", e);
                    }
                }
            }
        }
    }
}
