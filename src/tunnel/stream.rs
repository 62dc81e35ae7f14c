//! Channel-to-chunk adaptation.
//!
//! A channel becomes a single ordered sequence of byte chunks. Early data
//! from the upgrade request, when present, is spliced in front of the first
//! channel message and handed out exactly once.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// Decode an early-data header value.
///
/// Accepts both base64 alphabets, with or without padding. An empty value
/// means no early data.
pub fn decode_early_data(value: &str) -> Result<Option<Bytes>, base64::DecodeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let normalized: String = trimmed
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let decoded = URL_SAFE_NO_PAD.decode(normalized)?;
    Ok((!decoded.is_empty()).then(|| Bytes::from(decoded)))
}

/// Ordered, single-pass chunk source for one session.
pub struct ChunkStream<S> {
    early: Option<Bytes>,
    inner: S,
    done: bool,
}

impl<S> ChunkStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    pub fn new(inner: S, early: Option<Bytes>) -> Self {
        Self {
            early,
            inner,
            done: false,
        }
    }

    /// Whether the sequence has ended.
    pub fn is_terminated(&self) -> bool {
        self.done && self.early.is_none()
    }
}

impl<S> Stream for ChunkStream<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(early) = self.early.take() {
            return Poll::Ready(Some(Ok(early)));
        }
        if self.done {
            return Poll::Ready(None);
        }
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(e))) => {
                self.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
