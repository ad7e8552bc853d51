//! Realtime fan-out to websocket subscribers.
//!
//! Clients connect to `/ws` and manage their subscriptions with plain text frames:
//! * `subscribe:order:<order_id>`
//! * `subscribe:crop:<crop_id>`
//! * `subscribe:prices`
//! * `unsubscribe:<topic>` with the same topic grammar.
//!
//! Server frames are JSON objects of the form `{"topic": ..., "payload": ...}` carrying the changed
//! entity's public fields.
//!
//! Delivery is at-most-once. Events published while a client is disconnected are not replayed on
//! reconnect; the ledger remains the source of truth for catching up.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
};

use actix_web::{web, HttpRequest, HttpResponse};
use agrotoken_engine::{
    db_types::OrderId,
    events::{EventHandlers, EventHooks},
};
use futures::StreamExt;
use log::*;
use tokio::sync::mpsc;

use crate::errors::ServerError;

//--------------------------------------        Topic         --------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Order(OrderId),
    Crop(String),
    Prices,
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "prices" {
            return Ok(Topic::Prices);
        }
        match s.split_once(':') {
            Some(("order", id)) if !id.is_empty() => Ok(Topic::Order(OrderId(id.to_string()))),
            Some(("crop", id)) if !id.is_empty() => Ok(Topic::Crop(id.to_string())),
            _ => Err(format!("'{s}' is not a valid topic")),
        }
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Order(id) => write!(f, "order:{}", id.0),
            Topic::Crop(id) => write!(f, "crop:{id}"),
            Topic::Prices => write!(f, "prices"),
        }
    }
}

//--------------------------------------  SubscriptionRegistry  ------------------------------------------------------

struct Connection {
    sender: mpsc::UnboundedSender<String>,
    topics: HashSet<Topic>,
}

/// Tracks which websocket connections are subscribed to which topics. Shared between the websocket sessions
/// (which register and subscribe) and the event hooks (which broadcast).
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<HashMap<u64, Connection>>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sender: mpsc::UnboundedSender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut conns = self.inner.lock().unwrap();
        conns.insert(id, Connection { sender, topics: HashSet::new() });
        id
    }

    pub fn subscribe(&self, conn_id: u64, topic: Topic) {
        let mut conns = self.inner.lock().unwrap();
        if let Some(conn) = conns.get_mut(&conn_id) {
            conn.topics.insert(topic);
        }
    }

    pub fn unsubscribe(&self, conn_id: u64, topic: &Topic) {
        let mut conns = self.inner.lock().unwrap();
        if let Some(conn) = conns.get_mut(&conn_id) {
            conn.topics.remove(topic);
        }
    }

    pub fn remove(&self, conn_id: u64) {
        let mut conns = self.inner.lock().unwrap();
        conns.remove(&conn_id);
    }

    /// Sends `payload` to every connection subscribed to `topic`, returning the number of deliveries.
    /// Connections whose receiving task has gone away are dropped from the registry on the spot.
    pub fn broadcast(&self, topic: &Topic, payload: &str) -> usize {
        let mut conns = self.inner.lock().unwrap();
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, conn) in conns.iter() {
            if !conn.topics.contains(topic) {
                continue;
            }
            if conn.sender.send(payload.to_string()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            debug!("🔄️ Dropping dead websocket connection {id}");
            conns.remove(&id);
        }
        delivered
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

//--------------------------------------     Event broadcasting  -----------------------------------------------------

const BROADCAST_EVENT_BUFFER_SIZE: usize = 100;

/// Builds the event handlers that fan ledger and price events out to websocket subscribers.
///
/// 1. OrderStateChangedEvent - delivered to `order:<order_id>` and `crop:<crop_id>` subscribers.
/// 2. PricesUpdatedEvent - delivered to `prices` subscribers.
pub fn create_broadcast_event_handlers(registry: SubscriptionRegistry) -> EventHandlers {
    let mut hooks = EventHooks::default();
    let reg = registry.clone();
    hooks.on_order_state_changed(move |ev| {
        let reg = reg.clone();
        Box::pin(async move {
            let order = ev.order;
            let mut delivered = 0;
            for topic in [Topic::Order(order.order_id.clone()), Topic::Crop(order.crop_id.clone())] {
                let payload = serde_json::json!({ "topic": topic.to_string(), "payload": order }).to_string();
                delivered += reg.broadcast(&topic, &payload);
            }
            trace!("🔄️ Order state for {} delivered to {delivered} subscribers", order.order_id);
        })
    });
    hooks.on_prices_updated(move |ev| {
        let reg = registry.clone();
        Box::pin(async move {
            let payload = serde_json::json!({ "topic": "prices", "payload": ev.quotes }).to_string();
            let delivered = reg.broadcast(&Topic::Prices, &payload);
            trace!("🔄️ Price update delivered to {delivered} subscribers");
        })
    });
    EventHandlers::new(BROADCAST_EVENT_BUFFER_SIZE, hooks)
}

//--------------------------------------     Websocket route    ------------------------------------------------------

pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    registry: web::Data<SubscriptionRegistry>,
) -> Result<HttpResponse, ServerError> {
    let (response, session, msg_stream) =
        actix_ws::handle(&req, stream).map_err(|e| ServerError::Unspecified(e.to_string()))?;
    let registry = registry.get_ref().clone();
    actix_web::rt::spawn(run_session(registry, session, msg_stream));
    Ok(response)
}

async fn run_session(registry: SubscriptionRegistry, mut session: actix_ws::Session, mut msg_stream: actix_ws::MessageStream) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn_id = registry.register(tx);
    debug!("🔄️ Websocket connection {conn_id} established");
    loop {
        tokio::select! {
            Some(payload) = rx.recv() => {
                if session.text(payload).await.is_err() {
                    break;
                }
            },
            msg = msg_stream.next() => {
                match msg {
                    Some(Ok(actix_ws::Message::Text(text))) => handle_command(&registry, conn_id, text.trim()),
                    Some(Ok(actix_ws::Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    },
                    Some(Ok(actix_ws::Message::Close(_))) | None => break,
                    Some(Ok(_)) => {},
                    Some(Err(e)) => {
                        debug!("🔄️ Websocket protocol error on connection {conn_id}: {e}");
                        break;
                    },
                }
            },
            else => break,
        }
    }
    registry.remove(conn_id);
    let _ = session.close(None).await;
    debug!("🔄️ Websocket connection {conn_id} closed");
}

fn handle_command(registry: &SubscriptionRegistry, conn_id: u64, command: &str) {
    let action = command.split_once(':');
    match action {
        Some(("subscribe", topic)) => match topic.parse::<Topic>() {
            Ok(topic) => {
                trace!("🔄️ Connection {conn_id} subscribed to {topic}");
                registry.subscribe(conn_id, topic);
            },
            Err(e) => debug!("🔄️ Ignoring bad subscribe from connection {conn_id}: {e}"),
        },
        Some(("unsubscribe", topic)) => match topic.parse::<Topic>() {
            Ok(topic) => {
                trace!("🔄️ Connection {conn_id} unsubscribed from {topic}");
                registry.unsubscribe(conn_id, &topic);
            },
            Err(e) => debug!("🔄️ Ignoring bad unsubscribe from connection {conn_id}: {e}"),
        },
        _ => debug!("🔄️ Ignoring unknown websocket command from connection {conn_id}: {command}"),
    }
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc;

    use super::{SubscriptionRegistry, Topic};

    #[test]
    fn topic_grammar() {
        assert_eq!("prices".parse::<Topic>().unwrap(), Topic::Prices);
        assert!(matches!("order:ord-1".parse::<Topic>().unwrap(), Topic::Order(id) if id.0 == "ord-1"));
        assert!(matches!("crop:wheat-7".parse::<Topic>().unwrap(), Topic::Crop(id) if id == "wheat-7"));
        assert!("order:".parse::<Topic>().is_err());
        assert!("weather:nairobi".parse::<Topic>().is_err());
        let topic = "order:ord-1".parse::<Topic>().unwrap();
        assert_eq!(topic.to_string(), "order:ord-1");
    }

    #[test]
    fn broadcast_reaches_only_matching_subscribers() {
        let registry = SubscriptionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let c1 = registry.register(tx1);
        let c2 = registry.register(tx2);
        registry.subscribe(c1, Topic::Prices);
        registry.subscribe(c2, Topic::Crop("maize-1".into()));

        let delivered = registry.broadcast(&Topic::Prices, "price update");
        assert_eq!(delivered, 1);
        assert_eq!(rx1.try_recv().unwrap(), "price update");
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = SubscriptionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = registry.register(tx);
        registry.subscribe(conn, Topic::Prices);
        registry.broadcast(&Topic::Prices, "one");
        registry.unsubscribe(conn, &Topic::Prices);
        registry.broadcast(&Topic::Prices, "two");
        assert_eq!(rx.try_recv().unwrap(), "one");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dead_connections_are_pruned_on_broadcast() {
        let registry = SubscriptionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = registry.register(tx);
        registry.subscribe(conn, Topic::Prices);
        drop(rx);
        let delivered = registry.broadcast(&Topic::Prices, "ignored");
        assert_eq!(delivered, 0);
        assert_eq!(registry.connection_count(), 0);
    }
}
