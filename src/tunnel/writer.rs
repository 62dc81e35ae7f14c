//! Single writer for the channel of one session.
//!
//! Every path that answers the client (relay, fallback, DNS framer) goes
//! through one `ResponseWriter`, so the response header is attached to the
//! first outbound write and nothing can interleave with it.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::response_header;
use crate::tunnel::channel::ChannelSink;

pub struct ResponseWriter<C> {
    sink: C,
    header: Option<[u8; 2]>,
    closed: bool,
}

impl<C: ChannelSink> ResponseWriter<C> {
    pub fn new(sink: C, version: u8) -> Self {
        Self {
            sink,
            header: Some(response_header(version)),
            closed: false,
        }
    }

    /// Whether the one-time response header already went out.
    pub fn header_sent(&self) -> bool {
        self.header.is_none()
    }

    /// Write `data`, prefixed by the response header on the first call only.
    pub async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let message = match self.header {
            Some(header) => {
                let mut buf = BytesMut::with_capacity(header.len() + data.len());
                buf.put_slice(&header);
                buf.put_slice(data);
                buf.freeze()
            }
            None => Bytes::copy_from_slice(data),
        };
        self.sink.send(message).await?;
        self.header = None;
        Ok(())
    }

    /// Close the channel. Later calls are no-ops.
    pub async fn close(&mut self, code: u16, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.sink.close(code, reason).await {
            tracing::debug!(error = %e, "Channel close failed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
