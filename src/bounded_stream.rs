//! Byte-ceiling enforcement for streamed response bodies
//!
//! [`BoundedBody`] wraps any chunk stream and keeps a running byte total.
//! The moment the total crosses the ceiling it yields a terminal
//! [`GatewayError::TooLarge`] and drops the inner stream, which for an HTTP
//! body closes the upstream connection. [`collect_bounded`] drains such a
//! stream into one contiguous buffer under a deadline.

use crate::error::{GatewayError, Result};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Stream adapter that fails once more than `limit` bytes have passed through
pub struct BoundedBody<S> {
    inner: Option<S>,
    limit: u64,
    received: u64,
}

impl<S> BoundedBody<S> {
    pub fn new(inner: S, limit: u64) -> Self {
        Self {
            inner: Some(inner),
            limit,
            received: 0,
        }
    }

    /// Bytes accepted so far, including the chunk that breached the limit
    pub fn received(&self) -> u64 {
        self.received
    }

    /// True once the stream has ended, failed, or breached the limit
    pub fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}

impl<S, E> Stream for BoundedBody<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let inner = match this.inner.as_mut() {
            Some(inner) => inner,
            None => return Poll::Ready(None),
        };

        match Pin::new(inner).poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.received = this.received.saturating_add(chunk.len() as u64);
                if this.received > this.limit {
                    warn!(
                        "Body exceeded ceiling: received={} limit={}, aborting transfer",
                        this.received, this.limit
                    );
                    this.inner = None;
                    return Poll::Ready(Some(Err(GatewayError::TooLarge { limit: this.limit })));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.inner = None;
                Poll::Ready(Some(Err(GatewayError::InternalError(format!(
                    "Failed to read response body: {}",
                    e
                )))))
            }
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            }
        }
    }
}

/// Drain a chunk stream into one buffer, enforcing a ceiling and a deadline
///
/// On any failure the chunks read so far are dropped with the stream; only a
/// clean end-of-stream produces a buffer, which never exceeds `limit` bytes.
pub async fn collect_bounded<S, E>(
    stream: S,
    limit: u64,
    deadline: Instant,
    budget: Duration,
) -> Result<Bytes>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut body = BoundedBody::new(stream, limit);
    let mut chunks: Vec<Bytes> = Vec::new();

    loop {
        let next = tokio::time::timeout_at(deadline, body.next())
            .await
            .map_err(|_| GatewayError::Timeout(budget.as_millis() as u64))?;

        match next {
            Some(Ok(chunk)) => {
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }
            }
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }

    debug!("Collected {} bytes in {} chunks", body.received(), chunks.len());
    Ok(concat_chunks(chunks, body.received()))
}

fn concat_chunks(mut chunks: Vec<Bytes>, total: u64) -> Bytes {
    match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.pop().unwrap_or_default(),
        _ => {
            let mut combined = BytesMut::with_capacity(total as usize);
            for chunk in chunks {
                combined.extend_from_slice(&chunk);
            }
            combined.freeze()
        }
    }
}
