//! Outbound TCP dialing.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::tunnel::error::TunnelError;

/// Opens outbound byte streams.
pub trait Dialer: Clone + Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn dial(&self, host: &str, port: u16) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP with a connect deadline.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connect_timeout: Duration,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Exclusively owned outbound socket with an idempotent close.
#[derive(Debug)]
pub struct OutboundHandle<T> {
    stream: T,
    target: String,
    closed: bool,
}

impl<T: AsyncRead + AsyncWrite + Unpin> OutboundHandle<T> {
    pub fn new(stream: T, target: String) -> Self {
        Self {
            stream,
            target,
            closed: false,
        }
    }

    pub fn stream_mut(&mut self) -> &mut T {
        &mut self.stream
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Shut the socket down. Returns `true` only for the call that actually closed it.
    pub async fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        if let Err(e) = self.stream.shutdown().await {
            tracing::trace!(target = %self.target, error = %e, "Outbound shutdown error");
        }
        tracing::debug!(target = %self.target, "Outbound socket closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Dial `host:port` and write the buffered first payload before returning.
pub async fn connect<D: Dialer>(
    dialer: &D,
    host: &str,
    port: u16,
    first_payload: &[u8],
) -> Result<OutboundHandle<D::Stream>, TunnelError> {
    let target = if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    };
    let dial_failed = |source: io::Error| TunnelError::DialFailed {
        target: target.clone(),
        source,
    };

    let mut stream = dialer.dial(host, port).await.map_err(dial_failed)?;
    if !first_payload.is_empty() {
        stream.write_all(first_payload).await.map_err(dial_failed)?;
        stream.flush().await.map_err(dial_failed)?;
    }

    tracing::debug!(target = %target, first_payload = first_payload.len(), "Outbound connected");
    Ok(OutboundHandle::new(stream, target))
}
