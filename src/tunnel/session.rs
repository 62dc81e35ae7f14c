//! Per-channel session driver.
//!
//! # Data Flow
//! ```text
//! ChunkStream ── first chunk ──→ decode_header
//!     ├── TCP      → relay.rs (connect, relay, NAT64 fallback)
//!     └── UDP / 53 → dns.rs   (datagrams over DoH)
//! ```

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::time::timeout;

use crate::config::EdgeConfig;
use crate::doh::DohClient;
use crate::observability::metrics;
use crate::protocol::{decode_header, Command};
use crate::tunnel::channel::{ChannelSink, CLOSE_INTERNAL_ERROR, CLOSE_NORMAL};
use crate::tunnel::connector::Dialer;
use crate::tunnel::dns::run_dns;
use crate::tunnel::error::TunnelError;
use crate::tunnel::relay::RelaySession;
use crate::tunnel::stream::ChunkStream;
use crate::tunnel::writer::ResponseWriter;

/// Everything a session needs besides its channel.
#[derive(Clone)]
pub struct TunnelContext<D> {
    pub config: Arc<EdgeConfig>,
    pub doh: DohClient,
    pub dialer: D,
}

impl<D: Dialer> TunnelContext<D> {
    pub fn new(config: Arc<EdgeConfig>, doh: DohClient, dialer: D) -> Self {
        Self { config, doh, dialer }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Either side closed normally.
    Closed,
    /// The channel was closed with this reason.
    Failed(String),
}

impl SessionEnd {
    fn outcome(&self) -> &'static str {
        match self {
            SessionEnd::Closed => "closed",
            SessionEnd::Failed(_) => "failed",
        }
    }
}

/// Drive one channel from its first chunk to teardown.
pub async fn run_session<S, C, D>(mut chunks: ChunkStream<S>, mut sink: C, ctx: TunnelContext<D>) -> SessionEnd
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin + Send,
    C: ChannelSink,
    D: Dialer,
{
    let first = match timeout(ctx.config.timeouts.first_chunk, chunks.next()).await {
        Ok(Some(Ok(chunk))) => chunk,
        Ok(Some(Err(e))) => {
            tracing::debug!(error = %e, "Channel failed before header");
            return SessionEnd::Failed(TunnelError::Channel(e).to_string());
        }
        Ok(None) => {
            tracing::debug!("Channel closed before header");
            return SessionEnd::Closed;
        }
        Err(_) => {
            let reason = TunnelError::Timeout("first chunk").to_string();
            tracing::debug!("No header before deadline");
            if let Err(e) = sink.close(CLOSE_INTERNAL_ERROR, &reason).await {
                tracing::debug!(error = %e, "Channel close failed");
            }
            return SessionEnd::Failed(reason);
        }
    };

    let request = match decode_header(&first, &ctx.config.identity) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting channel");
            metrics::record_session("unknown", "rejected");
            let reason = e.to_string();
            if let Err(e) = sink.close(CLOSE_INTERNAL_ERROR, &reason).await {
                tracing::debug!(error = %e, "Channel close failed");
            }
            return SessionEnd::Failed(reason);
        }
    };

    let payload = first.slice(request.payload_offset..);
    let command = request.command.as_str();
    tracing::info!(
        command,
        target = %request.address,
        port = request.port,
        payload = payload.len(),
        "Session accepted"
    );

    let mut writer = ResponseWriter::new(sink, request.version);
    let end = match request.command {
        Command::Tcp => {
            RelaySession::new(&request, payload, &mut chunks, &mut writer, &ctx)
                .run()
                .await
        }
        Command::Udp => match run_dns(payload, &mut chunks, &mut writer, &ctx.doh, ctx.config.timeouts.idle).await {
            Ok(()) => {
                writer.close(CLOSE_NORMAL, "").await;
                SessionEnd::Closed
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "DNS session failed");
                let reason = match e {
                    TunnelError::Exchange(_) => "dns exchange failed".to_string(),
                    other => other.to_string(),
                };
                writer.close(CLOSE_INTERNAL_ERROR, &reason).await;
                SessionEnd::Failed(reason)
            }
        },
    };

    metrics::record_session(command, end.outcome());
    tracing::info!(command, outcome = ?end, "Session ended");
    end
}
