//! Transfer progress
//!
//! The request body is the file streamed in `buffer_size` chunks. Each chunk
//! handed to the transport advances a [`ProgressTracker`], which forwards the
//! cumulative byte count to the caller's [`ProgressObserver`].
//!
//! Guarantees:
//! - notifications are delivered in non-decreasing `bytes_sent` order
//! - once the whole body has been sent, exactly one `(total, total)`
//!   notification is delivered, even for empty files
//! - the executor finishes the tracker before the result is handed back, so
//!   the final notification always precedes completion

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Receives cumulative transfer progress
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, bytes_sent: u64, total_bytes: u64);
}

impl<F> ProgressObserver for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, bytes_sent: u64, total_bytes: u64) {
        self(bytes_sent, total_bytes)
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    sent: u64,
    completed: bool,
}

/// Counts bytes handed to the transport for one upload
pub struct ProgressTracker {
    total: u64,
    observer: Option<Arc<dyn ProgressObserver>>,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new(total: u64, observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        Self {
            total,
            observer,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn bytes_sent(&self) -> u64 {
        self.state.lock().sent
    }

    /// Record `n` more bytes sent
    pub fn advance(&self, n: u64) {
        // Observer runs under the lock so notifications cannot reorder
        let mut state = self.state.lock();
        if state.completed || n == 0 {
            return;
        }
        state.sent = (state.sent + n).min(self.total);
        if state.sent == self.total {
            state.completed = true;
        }
        self.notify(state.sent);
    }

    /// Deliver the final notification if the whole body went out but no
    /// chunk reported it (empty bodies)
    pub fn complete(&self) {
        let mut state = self.state.lock();
        if state.completed || state.sent != self.total {
            return;
        }
        state.completed = true;
        self.notify(self.total);
    }

    fn notify(&self, sent: u64) {
        if let Some(observer) = &self.observer {
            observer.on_progress(sent, self.total);
        }
    }
}

pin_project! {
    /// Stream adapter advancing a tracker for every chunk it yields
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        tracker: Arc<ProgressTracker>,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, tracker: Arc<ProgressTracker>) -> Self {
        Self { inner, tracker }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.tracker.advance(chunk.len() as u64);
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

/// Stream `reader` as chunks of exactly `buffer_size` bytes (the last may be
/// shorter). One chunk buffer is allocated per yielded chunk.
pub fn chunked<R>(reader: R, buffer_size: usize) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    R: AsyncRead + Unpin + Send,
{
    let buffer_size = buffer_size.max(1);
    futures::stream::try_unfold(reader, move |mut reader| async move {
        let mut buf = vec![0u8; buffer_size];
        let mut filled = 0;
        while filled < buffer_size {
            let n = reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok::<_, io::Error>(None);
        }
        buf.truncate(filled);
        Ok(Some((Bytes::from(buf), reader)))
    })
}
