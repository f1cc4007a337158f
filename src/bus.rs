use crate::protocol::{PayloadBuffer, TopicBuffer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub const MAX_SUBSCRIBERS_PER_TOPIC: usize = 8;

/// One inbound delivery: consumed exactly once by the matching handler.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: TopicBuffer,
    pub payload: PayloadBuffer,
    pub arrived_at: Instant,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("broker unreachable at {0}")]
    Connection(String),
    #[error("not connected to broker")]
    NotConnected,
    #[error("publish failed: {0}")]
    Publish(&'static str),
    #[error("subscriber limit reached for topic {0}")]
    SubscriptionLimit(String),
}

type Handler = Box<dyn Fn(&BusMessage) + Send + 'static>;

#[derive(Debug)]
struct Route {
    client_id: u64,
    queue: mpsc::UnboundedSender<BusMessage>,
}

#[derive(Debug, Default)]
struct RoutingTable {
    routes: HashMap<String, heapless::Vec<Route, MAX_SUBSCRIBERS_PER_TOPIC>>,
}

/// In-memory publish/subscribe broker.
///
/// Messages are routed to each subscribed client's delivery queue at publish
/// time; a single delivery task per client preserves per-topic order. No
/// ordering is guaranteed across topics for different clients.
pub struct Broker {
    address: String,
    table: Arc<Mutex<RoutingTable>>,
    next_client_id: AtomicU64,
}

impl Broker {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            table: Arc::new(Mutex::new(RoutingTable::default())),
            next_client_id: AtomicU64::new(1),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Connect a new client. An address mismatch models an unreachable
    /// broker and fails with [`BusError::Connection`].
    pub fn connect(&self, address: &str) -> Result<BusClient, BusError> {
        if address != self.address {
            return Err(BusError::Connection(address.to_string()));
        }

        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let handlers: Arc<Mutex<HashMap<String, Handler>>> = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let delivery_task = tokio::spawn(deliver(
            client_id,
            queue_rx,
            Arc::clone(&handlers),
            cancel.clone(),
        ));

        debug!(client_id, address, "bus client connected");

        Ok(BusClient {
            client_id,
            connected: Arc::new(AtomicBool::new(true)),
            table: Arc::clone(&self.table),
            handlers,
            queue_tx,
            cancel,
            delivery_task: Mutex::new(Some(delivery_task)),
        })
    }
}

/// Drain the client's queue on a dedicated task, invoking the registered
/// handler for each message sequentially. On shutdown the queue is closed
/// first so already-accepted messages still get delivered.
async fn deliver(
    client_id: u64,
    mut queue_rx: mpsc::UnboundedReceiver<BusMessage>,
    handlers: Arc<Mutex<HashMap<String, Handler>>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                queue_rx.close();
                while let Ok(message) = queue_rx.try_recv() {
                    dispatch(&handlers, &message);
                }
                break;
            }
            received = queue_rx.recv() => {
                match received {
                    Some(message) => dispatch(&handlers, &message),
                    None => break,
                }
            }
        }
    }
    debug!(client_id, "bus delivery task stopped");
}

fn dispatch(handlers: &Mutex<HashMap<String, Handler>>, message: &BusMessage) {
    let handlers = lock(handlers);
    match handlers.get(message.topic.as_str()) {
        Some(handler) => handler(message),
        None => trace!(topic = %message.topic, "delivery without handler, dropped"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the broker for one connected client.
///
/// `publish` and `subscribe` are fallible and non-fatal: callers in the
/// control loop log failures and carry on with local state.
pub struct BusClient {
    client_id: u64,
    connected: Arc<AtomicBool>,
    table: Arc<Mutex<RoutingTable>>,
    handlers: Arc<Mutex<HashMap<String, Handler>>>,
    queue_tx: mpsc::UnboundedSender<BusMessage>,
    cancel: CancellationToken,
    delivery_task: Mutex<Option<JoinHandle<()>>>,
}

impl BusClient {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Register `handler` for `topic`. Handlers run on the client's
    /// delivery task and must not block; re-subscribing a topic replaces
    /// its handler without duplicating delivery.
    pub fn subscribe(
        &self,
        topic: &str,
        handler: impl Fn(&BusMessage) + Send + 'static,
    ) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::NotConnected);
        }

        lock(&self.handlers).insert(topic.to_string(), Box::new(handler));

        let mut table = lock(&self.table);
        let routes = table.routes.entry(topic.to_string()).or_default();
        if routes.iter().any(|r| r.client_id == self.client_id) {
            return Ok(());
        }
        routes
            .push(Route {
                client_id: self.client_id,
                queue: self.queue_tx.clone(),
            })
            .map_err(|_| BusError::SubscriptionLimit(topic.to_string()))
    }

    /// Publish `payload` to every subscriber of `topic`. Fails when the
    /// client is disconnected or the message exceeds the wire buffers;
    /// a topic with no subscribers is not an error.
    pub fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::Publish("not connected"));
        }

        let message = BusMessage {
            topic: TopicBuffer::from(topic).map_err(|_| BusError::Publish("topic too long"))?,
            payload: PayloadBuffer::from(payload)
                .map_err(|_| BusError::Publish("payload too long"))?,
            arrived_at: Instant::now(),
        };

        let table = lock(&self.table);
        if let Some(routes) = table.routes.get(topic) {
            for route in routes {
                // A closed queue means the subscriber is tearing down.
                let _ = route.queue.send(message.clone());
            }
        }
        Ok(())
    }

    /// Detach from the broker and stop the delivery task, letting
    /// already-queued messages drain first.
    pub async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }

        {
            let mut table = lock(&self.table);
            for routes in table.routes.values_mut() {
                routes.retain(|r| r.client_id != self.client_id);
            }
        }

        self.cancel.cancel();
        let task = lock(&self.delivery_task).take();
        if let Some(task) = task {
            let _ = task.await;
        }
        debug!(client_id = self.client_id, "bus client disconnected");
    }
}
