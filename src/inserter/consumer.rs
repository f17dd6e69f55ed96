use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::BusConsumer;
use crate::error::Result;

/// Drives one topic consumer's fetch/parse/handle/commit cycle until
/// `shutdown` is cancelled (spec.md §4.4 "Consumer loop").
///
/// - A parse failure commits the offset to skip the poison message and
///   continues.
/// - A handler failure does **not** commit: the message is redelivered on
///   the next fetch.
/// - On shutdown, the loop simply stops fetching; callers are responsible
///   for stopping their batcher afterward so it performs its final flush.
pub async fn run_consumer_loop<S, T>(
    mut source: S,
    parse: impl Fn(S::Message) -> Result<T> + Send,
    handle: impl Fn(T) -> BoxFuture<'static, Result<()>> + Send,
    shutdown: CancellationToken,
) -> Result<()>
where
    S: BusConsumer,
{
    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("consumer loop cancelled");
                return Ok(());
            }
            fetched = source.fetch() => fetched?,
        };

        let Some(message) = message else {
            continue;
        };

        match parse(message) {
            Err(err) => {
                warn!(error = %err, "dropping unparseable message");
                source.commit().await?;
            }
            Ok(item) => match handle(item).await {
                Ok(()) => source.commit().await?,
                Err(err) => {
                    warn!(error = %err, "handler failed, message will be redelivered");
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct VecSource {
        items: std::collections::VecDeque<String>,
        committed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BusConsumer for VecSource {
        type Message = String;

        async fn fetch(&mut self) -> Result<Option<String>> {
            Ok(self.items.pop_front())
        }

        async fn commit(&mut self) -> Result<()> {
            self.committed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn poison_message_is_committed_and_skipped() {
        let committed = Arc::new(AtomicUsize::new(0));
        let source = VecSource {
            items: vec!["bad".to_string()].into(),
            committed: committed.clone(),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let handle = tokio::spawn(run_consumer_loop(
            source,
            |_: String| Err(crate::error::EngineError::Schema("bad parse".into())),
            move |item: String| {
                let tx = tx.clone();
                Box::pin(async move {
                    tx.send(item).ok();
                    Ok(())
                })
            },
            shutdown_clone,
        ));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(committed.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn handler_failure_does_not_commit() {
        let committed = Arc::new(AtomicUsize::new(0));
        let source = VecSource {
            items: vec!["ok".to_string()].into(),
            committed: committed.clone(),
        };

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let handle = tokio::spawn(run_consumer_loop(
            source,
            Ok,
            |_: String| Box::pin(async { Err(crate::error::EngineError::Schema("boom".into())) }),
            shutdown_clone,
        ));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(committed.load(Ordering::SeqCst), 0);
    }
}
