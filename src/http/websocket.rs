//! WebSocket channel adaptation.
//!
//! # Responsibilities
//! - Split the upgraded socket into a chunk stream and a `ChannelSink`
//! - Turn data frames into chunks; ping/pong never reach the session
//! - Send close frames carrying the session's failure reason
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Tunnel ←──── TCP / DoH ────→ Destination
//! ```

use std::io;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::Instrument;

use crate::net::ConnectionGuard;
use crate::tunnel::{run_session, ChannelSink, ChunkStream, Dialer, TunnelContext};

/// Close reasons must fit a control frame.
const MAX_CLOSE_REASON: usize = 123;

/// Run a tunnel session over an upgraded socket.
pub async fn serve_channel<D: Dialer>(
    socket: WebSocket,
    early: Option<Bytes>,
    ctx: TunnelContext<D>,
    guard: ConnectionGuard,
) {
    let span = tracing::info_span!("session", id = %guard.id());
    async move {
        let (sender, receiver) = socket.split();
        let chunks = ChunkStream::new(channel_chunks(receiver), early);
        run_session(chunks, sender, ctx).await;
        drop(guard);
    }
    .instrument(span)
    .await
}

/// Data frames as chunks, ending at the first close frame.
fn channel_chunks(receiver: SplitStream<WebSocket>) -> BoxStream<'static, io::Result<Bytes>> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.next().await? {
                Ok(Message::Binary(data)) => return Some((Ok(data), receiver)),
                Ok(Message::Text(text)) => {
                    let data = Bytes::copy_from_slice(text.as_str().as_bytes());
                    return Some((Ok(data), receiver));
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    tracing::debug!(frame = ?frame, "Client closed channel");
                    return None;
                }
                Err(e) => return Some((Err(io::Error::other(e)), receiver)),
            }
        }
    })
    .boxed()
}

impl ChannelSink for SplitSink<WebSocket, Message> {
    async fn send(&mut self, data: Bytes) -> io::Result<()> {
        SinkExt::send(self, Message::Binary(data))
            .await
            .map_err(io::Error::other)
    }

    async fn close(&mut self, code: u16, reason: &str) -> io::Result<()> {
        let frame = CloseFrame {
            code,
            reason: Utf8Bytes::from(truncate_reason(reason)),
        };
        SinkExt::send(self, Message::Close(Some(frame)))
            .await
            .map_err(io::Error::other)?;
        SinkExt::close(self).await.map_err(io::Error::other)
    }
}

fn truncate_reason(reason: &str) -> String {
    let mut end = reason.len().min(MAX_CLOSE_REASON);
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_string()
}
