//! Transition broadcaster (spec.md §4.5): in-process fan-out of
//! transitions to filtered subscribers.
//!
//! Implemented as a single-task reactor over three channels
//! (register/unregister/broadcast), grounded in the teacher's actor
//! system (`src/orchestration/actor.rs`) rather than its locked-`HashMap`
//! `ConnectionPool` (`src/websocket/connection.rs`): spec.md §4.5 calls
//! for a lock-free single-owner subscriber map, which only the reactor
//! shape gives us. The bounded-channel-per-subscriber idea is carried
//! over from `ConnectionPool` regardless.

mod subscription;

pub use subscription::{SubscriberId, Subscription};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::model::Transition;

/// Bounded receive channel capacity per subscriber (spec.md §4.5).
pub const SUBSCRIBER_CAPACITY: usize = 100;

/// Log every Nth dropped transition rather than every one, to avoid
/// flooding logs under sustained backpressure from one slow subscriber.
const DROP_LOG_SAMPLE: u64 = 100;

type RegisterCmd = (SubscriberId, Subscription, oneshot::Sender<mpsc::Receiver<Transition>>);

/// A cloneable handle to the broadcaster reactor task.
#[derive(Clone)]
pub struct Broadcaster {
    register_tx: mpsc::UnboundedSender<RegisterCmd>,
    unregister_tx: mpsc::UnboundedSender<SubscriberId>,
    broadcast_tx: mpsc::UnboundedSender<Transition>,
    dropped: Arc<AtomicU64>,
}

impl Broadcaster {
    /// Spawns the reactor task and returns a handle to it.
    pub fn spawn() -> Self {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();
        let dropped = Arc::new(AtomicU64::new(0));

        tokio::spawn(run_reactor(register_rx, unregister_rx, broadcast_rx, dropped.clone()));

        Self {
            register_tx,
            unregister_tx,
            broadcast_tx,
            dropped,
        }
    }

    /// Registers a new subscriber and returns its bounded receive channel
    /// (spec.md §4.5 `Subscribe(id, subscription) -> channel<Transition>`).
    pub async fn subscribe(
        &self,
        id: SubscriberId,
        subscription: Subscription,
    ) -> mpsc::Receiver<Transition> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let _ = self.register_tx.send((id, subscription, resp_tx));
        resp_rx.await.expect("broadcaster reactor task is gone")
    }

    /// Removes `id`, closing its channel (spec.md §4.5 `Unsubscribe`).
    pub fn unsubscribe(&self, id: SubscriberId) {
        let _ = self.unregister_tx.send(id);
    }

    /// Fans `transition` out to every matching subscriber, non-blocking
    /// per subscriber (spec.md §4.5 `Broadcast`).
    pub fn broadcast(&self, transition: Transition) {
        let _ = self.broadcast_tx.send(transition);
    }

    /// Count of transitions dropped for full subscriber channels so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn run_reactor(
    mut register_rx: mpsc::UnboundedReceiver<RegisterCmd>,
    mut unregister_rx: mpsc::UnboundedReceiver<SubscriberId>,
    mut broadcast_rx: mpsc::UnboundedReceiver<Transition>,
    dropped: Arc<AtomicU64>,
) {
    let mut subscribers: HashMap<SubscriberId, (Subscription, mpsc::Sender<Transition>)> =
        HashMap::new();

    loop {
        tokio::select! {
            registered = register_rx.recv() => {
                let Some((id, subscription, resp)) = registered else { break };
                let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
                subscribers.insert(id, (subscription, tx));
                let _ = resp.send(rx);
            }
            unregistered = unregister_rx.recv() => {
                let Some(id) = unregistered else { break };
                subscribers.remove(&id);
                debug!(subscriber = %id, "unsubscribed");
            }
            transition = broadcast_rx.recv() => {
                let Some(transition) = transition else { break };
                for (subscription, tx) in subscribers.values() {
                    if !subscription.matches(&transition) {
                        continue;
                    }
                    if tx.try_send(transition.clone()).is_err() {
                        let n = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        if n % DROP_LOG_SAMPLE == 1 {
                            warn!(dropped = n, "dropping transition for full subscriber channel");
                        }
                    }
                }
            }
            else => break,
        }
    }
}
