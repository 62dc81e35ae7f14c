//! DNS queries over the tunnel's UDP command.
//!
//! Only port 53 is accepted. The client frames each datagram as
//! `[len(2, BE)][payload]`; frames may be split across channel chunks or
//! several may share one. Each datagram becomes one DoH POST and each answer
//! goes back framed the same way.

use std::io;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio::time::timeout;

use crate::doh::DohClient;
use crate::observability::metrics;
use crate::tunnel::channel::ChannelSink;
use crate::tunnel::error::TunnelError;
use crate::tunnel::stream::ChunkStream;
use crate::tunnel::writer::ResponseWriter;

const LENGTH_PREFIX: usize = 2;

/// Reassembles length-prefixed datagrams from arbitrary chunk boundaries.
#[derive(Debug, Default)]
pub struct DatagramFramer {
    buf: BytesMut,
}

impl DatagramFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Next complete datagram, if one is buffered.
    pub fn next_datagram(&mut self) -> Option<Bytes> {
        if self.buf.len() < LENGTH_PREFIX {
            return None;
        }
        let len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
        if self.buf.len() < LENGTH_PREFIX + len {
            return None;
        }
        self.buf.advance(LENGTH_PREFIX);
        Some(self.buf.split_to(len).freeze())
    }

    /// Bytes of an incomplete frame still waiting for more input.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Prefix `datagram` with its big-endian length.
pub fn frame_datagram(datagram: &[u8]) -> Result<Bytes, TunnelError> {
    let len = u16::try_from(datagram.len()).map_err(|_| TunnelError::OversizedDatagram(datagram.len()))?;
    let mut framed = BytesMut::with_capacity(LENGTH_PREFIX + datagram.len());
    framed.put_u16(len);
    framed.put_slice(datagram);
    Ok(framed.freeze())
}

/// Serve DNS datagrams until the channel closes.
///
/// Exchanges run one after another, so answers leave in query order.
pub async fn run_dns<S, C>(
    first_payload: Bytes,
    chunks: &mut ChunkStream<S>,
    writer: &mut ResponseWriter<C>,
    doh: &DohClient,
    idle: Duration,
) -> Result<(), TunnelError>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin + Send,
    C: ChannelSink,
{
    let mut framer = DatagramFramer::new();
    framer.push(&first_payload);

    loop {
        while let Some(query) = framer.next_datagram() {
            let query_len = query.len();
            let answer = match doh.exchange(query).await {
                Ok(answer) => {
                    metrics::record_dns_exchange(true);
                    answer
                }
                Err(e) => {
                    metrics::record_dns_exchange(false);
                    return Err(TunnelError::Exchange(e));
                }
            };
            if answer.is_empty() {
                tracing::debug!(query_len, "Empty DoH answer, dropping datagram");
                continue;
            }
            let framed = frame_datagram(&answer)?;
            writer.send(&framed).await.map_err(TunnelError::Channel)?;
            tracing::debug!(query_len, answer_len = answer.len(), "DNS datagram answered");
        }

        match timeout(idle, chunks.next()).await {
            Ok(Some(Ok(chunk))) => framer.push(&chunk),
            Ok(Some(Err(e))) => return Err(TunnelError::Channel(e)),
            Ok(None) => {
                if framer.pending() > 0 {
                    tracing::debug!(pending = framer.pending(), "Channel closed mid-datagram");
                }
                return Ok(());
            }
            Err(_) => return Err(TunnelError::Timeout("dns idle")),
        }
    }
}
