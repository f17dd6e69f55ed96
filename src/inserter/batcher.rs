use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Result;

pub const DEFAULT_MAX_SIZE: usize = 1000;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// A flush callback: takes ownership of a drained batch, writes it
/// somewhere, and reports whether the write succeeded.
pub type FlushFn<T> = Arc<dyn Fn(Vec<T>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct Inner<T> {
    items: Vec<T>,
    stopped: bool,
    generation: u64,
}

/// Size/time-triggered batcher (spec.md §4.4 "generic batcher").
///
/// Grounded in the teacher's `event_processing::connectors::ConnectorConfig`
/// batch-size/flush-interval pair and its sink connector's
/// `write`/`write_batch`/`flush` shape. A single `tokio::sync::Mutex`
/// serializes every state mutation and the flush itself runs while the
/// lock is held, matching the "correct but conservative" concurrency note.
pub struct Batcher<T> {
    inner: Arc<Mutex<Inner<T>>>,
    max_size: usize,
    flush_interval: Duration,
    flush_fn: FlushFn<T>,
}

impl<T: Send + 'static> Batcher<T> {
    pub fn new(max_size: usize, flush_interval: Duration, flush_fn: FlushFn<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                items: Vec::new(),
                stopped: false,
                generation: 0,
            })),
            max_size,
            flush_interval,
            flush_fn,
        }
    }

    pub fn with_defaults(flush_fn: FlushFn<T>) -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_FLUSH_INTERVAL, flush_fn)
    }

    /// Appends `item`. If the batch reaches `max_size` this flushes
    /// synchronously, under the lock, and returns the flush error if one
    /// occurred. A stopped batcher silently drops `item`.
    pub async fn add(&self, item: T) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if guard.stopped {
            return Ok(());
        }

        let was_empty = guard.items.is_empty();
        guard.items.push(item);

        if guard.items.len() >= self.max_size {
            guard.generation += 1;
            let items = std::mem::take(&mut guard.items);
            drop(guard);
            return (self.flush_fn)(items).await;
        }

        if was_empty {
            guard.generation += 1;
            let generation = guard.generation;
            drop(guard);
            self.spawn_timer(generation);
        }
        Ok(())
    }

    /// Manual flush. Clears any pending timer. No-op if empty.
    pub async fn flush(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.generation += 1;
        if guard.items.is_empty() {
            return Ok(());
        }
        let items = std::mem::take(&mut guard.items);
        drop(guard);
        (self.flush_fn)(items).await
    }

    /// Marks the batcher stopped, stops the timer, and performs a final
    /// flush. Every `add` after this silently returns `Ok(())`.
    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.stopped = true;
        guard.generation += 1;
        if guard.items.is_empty() {
            return Ok(());
        }
        let items = std::mem::take(&mut guard.items);
        drop(guard);
        (self.flush_fn)(items).await
    }

    fn spawn_timer(&self, generation: u64) {
        let inner = Arc::clone(&self.inner);
        let flush_fn = Arc::clone(&self.flush_fn);
        let interval = self.flush_interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let mut guard = inner.lock().await;
            if guard.stopped || guard.generation != generation || guard.items.is_empty() {
                return;
            }
            guard.generation += 1;
            let items = std::mem::take(&mut guard.items);
            drop(guard);
            if let Err(err) = flush_fn(items).await {
                warn!(error = %err, "batcher timer flush failed");
            }
        });
    }
}
