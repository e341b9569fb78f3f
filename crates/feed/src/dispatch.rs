//! Topic registry and dispatcher.
//!
//! A registry is built once and never mutated; each feed gets its own
//! [`Dispatcher`] so topic names are scoped per channel.

use std::time::Instant;

use loxsi_core::{topics, Envelope, Feed, PayloadError};
use loxsi_store::reconcile;
use loxsi_store::View;
use metrics::{counter, histogram};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{error, trace, warn};

pub type Handler<V> = Box<dyn Fn(&Value, &mut V) -> Result<(), PayloadError> + Send + Sync>;

/// Immutable topic → handler mapping.
pub struct TopicRegistry<V: ?Sized> {
    handlers: FxHashMap<String, Handler<V>>,
}

pub struct RegistryBuilder<V: ?Sized> {
    handlers: FxHashMap<String, Handler<V>>,
}

impl<V: ?Sized> RegistryBuilder<V> {
    /// Register `handler` for `topic`; a later registration for the same topic replaces it.
    pub fn on<F>(mut self, topic: &str, handler: F) -> Self
    where
        F: Fn(&Value, &mut V) -> Result<(), PayloadError> + Send + Sync + 'static,
    {
        self.handlers.insert(topic.to_string(), Box::new(handler));
        self
    }

    pub fn build(self) -> TopicRegistry<V> {
        TopicRegistry { handlers: self.handlers }
    }
}

impl<V: ?Sized> TopicRegistry<V> {
    pub fn builder() -> RegistryBuilder<V> {
        RegistryBuilder { handlers: FxHashMap::default() }
    }

    pub fn get(&self, topic: &str) -> Option<&Handler<V>> {
        self.handlers.get(topic)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.handlers.contains_key(topic)
    }

    /// Registered topics, sorted.
    pub fn topics(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        out.sort_unstable();
        out
    }
}

/// Topics of the public dashboard feed.
pub fn public_registry<V: View + ?Sized + 'static>() -> TopicRegistry<V> {
    TopicRegistry::builder()
        .on(topics::COUNTS, reconcile::apply_counts::<V>)
        .on(topics::MESSAGE, reconcile::apply_message::<V>)
        .on(topics::FROZEN, reconcile::apply_frozen::<V>)
        .on(topics::REFRESH, reconcile::apply_refresh::<V>)
        .build()
}

/// Topics of the admin feed.
pub fn admin_registry<V: View + ?Sized + 'static>() -> TopicRegistry<V> {
    TopicRegistry::builder()
        .on(topics::HEALTH, reconcile::apply_health::<V>)
        .on(topics::ACTIVE_SOURCE, reconcile::apply_active_source::<V>)
        .on(topics::ACTIVE_LAP_SOURCE, reconcile::apply_active_lap_source::<V>)
        .on(topics::ACTIVE_POSITION_SOURCE, reconcile::apply_active_position_source::<V>)
        .on(topics::LAP_SOURCE, reconcile::apply_lap_sources::<V>)
        .on(topics::POSITION_SOURCE, reconcile::apply_position_sources::<V>)
        .on(topics::ACTIVE_CONNECTIONS, reconcile::apply_connections::<V>)
        .on(topics::FREEZE, reconcile::apply_freeze::<V>)
        .build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied,
    UnknownTopic,
    Rejected,
}

pub struct Dispatcher<V: ?Sized> {
    feed: Feed,
    registry: TopicRegistry<V>,
}

impl<V: ?Sized> Dispatcher<V> {
    pub fn new(feed: Feed, registry: TopicRegistry<V>) -> Self {
        Self { feed, registry }
    }

    /// Route one envelope to its handler. Failures are logged and isolated to this envelope.
    pub fn dispatch(&self, envelope: &Envelope, view: &mut V) -> DispatchOutcome {
        let Some(handler) = self.registry.get(&envelope.topic) else {
            counter!("dispatch_unknown_topic_total", "feed" => self.feed.to_string()).increment(1);
            error!(feed = %self.feed, topic = %envelope.topic, payload = %envelope.data, "unknown topic");
            return DispatchOutcome::UnknownTopic;
        };
        let t0 = Instant::now();
        match handler(&envelope.data, view) {
            Ok(()) => {
                histogram!("dispatch_apply_ms").record(t0.elapsed().as_secs_f64() * 1000.0);
                trace!(feed = %self.feed, topic = %envelope.topic, "envelope applied");
                DispatchOutcome::Applied
            }
            Err(e) => {
                counter!("dispatch_rejected_total", "feed" => self.feed.to_string()).increment(1);
                warn!(feed = %self.feed, topic = %envelope.topic, error = %e, "payload rejected; view left unchanged");
                DispatchOutcome::Rejected
            }
        }
    }
}

impl<V: View + ?Sized + 'static> Dispatcher<V> {
    /// Dispatcher with the standard topic set of `feed`.
    pub fn standard(feed: Feed) -> Self {
        let registry = match feed {
            Feed::Public => public_registry(),
            Feed::Admin => admin_registry(),
        };
        Self::new(feed, registry)
    }
}
