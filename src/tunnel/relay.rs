//! TCP relay with a single NAT64 fallback.
//!
//! # States
//! ```text
//! Connecting ──ok──→ Relaying ──→ Closed
//!     │                  │ remote gave nothing back, not yet retried
//!     │ failed           ▼
//!     └──────────→ ResolvingFallback ──→ Connecting(retry) ──→ Relaying | Failed
//! ```
//!
//! The fallback runs at most once. The response header belongs to the
//! writer, so a retry never sends it twice.
//!
//! Only the first payload is replayed on the NAT64 socket. Client chunks
//! already written to the abandoned socket are lost.
//!
//! While relaying, each direction copies on its own, so a destination that
//! stops reading never stalls the replies it is still sending. The idle
//! deadline is measured from the last completed read or write in either
//! direction and also fires while a write is stuck.

use std::io;
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep_until, Instant};

use crate::observability::metrics;
use crate::protocol::ConnectionRequest;
use crate::tunnel::channel::{ChannelSink, CLOSE_INTERNAL_ERROR, CLOSE_NORMAL};
use crate::tunnel::connector::{connect, Dialer, OutboundHandle};
use crate::tunnel::fallback::resolve_fallback;
use crate::tunnel::session::{SessionEnd, TunnelContext};
use crate::tunnel::stream::ChunkStream;
use crate::tunnel::writer::ResponseWriter;

const RELAY_BUFFER_SIZE: usize = 16 * 1024;

pub const REASON_CONNECT_FAILED: &str = "connect failed";
pub const REASON_RESOLUTION_FAILED: &str = "resolution failed";
pub const REASON_SECONDARY_CONNECT_FAILED: &str = "secondary connect failed";
pub const REASON_IDLE_TIMEOUT: &str = "idle timeout";

#[derive(Debug, Clone, PartialEq, Eq)]
enum RelayState {
    Connecting { host: String },
    Relaying,
    ResolvingFallback,
    Closed,
    Failed(String),
}

/// Why a relaying pass stopped.
#[derive(Debug)]
enum PumpEnd {
    ChannelClosed,
    ChannelError(io::Error),
    RemoteClosed,
    RemoteError(io::Error),
    Idle,
}

/// One TCP session. Owns its outbound socket exclusively.
pub struct RelaySession<'a, S, C, D: Dialer> {
    request: &'a ConnectionRequest,
    first_payload: Bytes,
    chunks: &'a mut ChunkStream<S>,
    writer: &'a mut ResponseWriter<C>,
    ctx: &'a TunnelContext<D>,
    outbound: Option<OutboundHandle<D::Stream>>,
    retried: bool,
}

impl<'a, S, C, D> RelaySession<'a, S, C, D>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin + Send,
    C: ChannelSink,
    D: Dialer,
{
    pub fn new(
        request: &'a ConnectionRequest,
        first_payload: Bytes,
        chunks: &'a mut ChunkStream<S>,
        writer: &'a mut ResponseWriter<C>,
        ctx: &'a TunnelContext<D>,
    ) -> Self {
        Self {
            request,
            first_payload,
            chunks,
            writer,
            ctx,
            outbound: None,
            retried: false,
        }
    }

    /// Run the state machine to completion. The channel is closed on the way out.
    pub async fn run(mut self) -> SessionEnd {
        let mut state = RelayState::Connecting {
            host: self.request.address.host(),
        };

        let end = loop {
            tracing::trace!(state = ?state, retried = self.retried, "Relay state");
            state = match state {
                RelayState::Connecting { host } => self.connect(&host).await,
                RelayState::Relaying => self.relay().await,
                RelayState::ResolvingFallback => self.resolve().await,
                RelayState::Closed => {
                    self.writer.close(CLOSE_NORMAL, "").await;
                    break SessionEnd::Closed;
                }
                RelayState::Failed(reason) => {
                    self.writer.close(CLOSE_INTERNAL_ERROR, &reason).await;
                    break SessionEnd::Failed(reason);
                }
            };
        };

        if let Some(mut outbound) = self.outbound.take() {
            outbound.close().await;
        }
        end
    }

    async fn connect(&mut self, host: &str) -> RelayState {
        match connect(&self.ctx.dialer, host, self.request.port, &self.first_payload).await {
            Ok(handle) => {
                if self.retried {
                    metrics::record_fallback("connected");
                    tracing::info!(target = %handle.target(), "Connected through NAT64");
                }
                self.outbound = Some(handle);
                RelayState::Relaying
            }
            Err(e) if self.retried => {
                tracing::warn!(error = %e, "NAT64 connect failed");
                metrics::record_fallback("secondary_connect_failed");
                RelayState::Failed(REASON_SECONDARY_CONNECT_FAILED.to_string())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Direct connect failed");
                RelayState::ResolvingFallback
            }
        }
    }

    async fn relay(&mut self) -> RelayState {
        let end = self.pump().await;
        let nothing_relayed = !self.writer.header_sent();

        match end {
            PumpEnd::ChannelClosed => RelayState::Closed,
            PumpEnd::RemoteClosed | PumpEnd::RemoteError(_) if nothing_relayed && !self.retried => {
                tracing::debug!("Destination returned nothing, trying fallback");
                RelayState::ResolvingFallback
            }
            PumpEnd::RemoteClosed => RelayState::Closed,
            PumpEnd::RemoteError(e) => {
                tracing::warn!(error = %e, "Outbound socket failed");
                RelayState::Failed(format!("relay error: {}", e))
            }
            PumpEnd::ChannelError(e) => {
                tracing::debug!(error = %e, "Channel failed");
                RelayState::Failed(format!("channel error: {}", e))
            }
            PumpEnd::Idle => RelayState::Failed(REASON_IDLE_TIMEOUT.to_string()),
        }
    }

    async fn resolve(&mut self) -> RelayState {
        self.retried = true;
        if let Some(mut stale) = self.outbound.take() {
            stale.close().await;
        }

        let prefix: Ipv6Addr = self.ctx.config.nat64_prefix;
        match resolve_fallback(&self.ctx.doh, prefix, &self.request.address).await {
            None => {
                tracing::warn!(target = %self.request.address, "Literal destination unreachable, no fallback");
                metrics::record_fallback("skipped_literal");
                RelayState::Failed(REASON_CONNECT_FAILED.to_string())
            }
            Some(Ok(synthesized)) => {
                tracing::info!(
                    target = %self.request.address,
                    synthesized = %synthesized,
                    "Retrying through NAT64"
                );
                RelayState::Connecting {
                    host: synthesized.to_string(),
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Fallback resolution failed");
                metrics::record_fallback("resolution_failed");
                RelayState::Failed(REASON_RESOLUTION_FAILED.to_string())
            }
        }
    }

    /// Copy both directions until one side stops.
    async fn pump(&mut self) -> PumpEnd {
        let Some(outbound) = self.outbound.as_mut() else {
            return PumpEnd::RemoteClosed;
        };
        let idle = self.ctx.config.timeouts.idle;
        let started = Instant::now();
        let last_activity = AtomicU64::new(0);
        let touch = || last_activity.store(started.elapsed().as_millis() as u64, Ordering::Relaxed);

        let (mut remote_read, mut remote_write) = tokio::io::split(outbound.stream_mut());
        let chunks = &mut *self.chunks;
        let writer = &mut *self.writer;

        let upstream = async {
            loop {
                match chunks.next().await {
                    Some(Ok(chunk)) => {
                        if let Err(e) = remote_write.write_all(&chunk).await {
                            return PumpEnd::RemoteError(e);
                        }
                        touch();
                        metrics::record_bytes("upstream", chunk.len());
                    }
                    Some(Err(e)) => return PumpEnd::ChannelError(e),
                    None => return PumpEnd::ChannelClosed,
                }
            }
        };

        let downstream = async {
            let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
            loop {
                match remote_read.read(&mut buf).await {
                    Ok(0) => return PumpEnd::RemoteClosed,
                    Ok(n) => {
                        if let Err(e) = writer.send(&buf[..n]).await {
                            return PumpEnd::ChannelError(e);
                        }
                        touch();
                        metrics::record_bytes("downstream", n);
                    }
                    Err(e) => return PumpEnd::RemoteError(e),
                }
            }
        };

        let watchdog = async {
            loop {
                let deadline = started + Duration::from_millis(last_activity.load(Ordering::Relaxed)) + idle;
                if Instant::now() >= deadline {
                    return PumpEnd::Idle;
                }
                sleep_until(deadline).await;
            }
        };

        tokio::select! {
            end = upstream => end,
            end = downstream => end,
            end = watchdog => end,
        }
    }
}
