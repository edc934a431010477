//! Per-connection subscription bookkeeping.
//!
//! [`SubscriptionTracker`] is the dual `channel -> entry` / `pattern ->
//! entry` map described in the connection state machine. Entries are
//! inserted only once the server has confirmed a subscription via a push
//! frame, and removed only once the server has confirmed the matching
//! unsubscribe — never speculatively at request time.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Whether a [`SubscriptionEntry`] was created by `SUBSCRIBE` or
/// `PSUBSCRIBE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Channel,
    Pattern,
}

/// A message delivered on a subscribed channel or pattern.
#[derive(Clone, Debug)]
pub struct Message {
    /// The pattern a `pmessage` matched against, or `None` for a plain
    /// `message` delivered on an exact channel subscription.
    pub pattern: Option<Bytes>,
    /// The channel the message was actually published on.
    pub channel: Bytes,
    /// The message payload.
    pub payload: Bytes,
}

/// Called for every message delivered on a subscription, in arrival order,
/// never concurrently for the same connection (invariant I5).
///
/// Shared (`Arc`) rather than owned because a single `subscribe` call
/// registers the same callback against every name in its argument list, and
/// each name gets its own independent tracker entry.
pub type MessageCallback = Arc<dyn Fn(Message) + Send + Sync + 'static>;

/// Called once the server confirms a subscription, with the subscription
/// name and the connection's total subscription count across both kinds.
pub type SubscribeCallback = Arc<dyn Fn(Bytes, i64) + Send + Sync + 'static>;

/// Called once the server confirms an unsubscription, with the same
/// arguments as [`SubscribeCallback`].
pub type UnsubscribeCallback = Arc<dyn Fn(Bytes, i64) + Send + Sync + 'static>;

/// A single channel or pattern subscription and its callbacks.
#[derive(Clone)]
pub(crate) struct SubscriptionEntry {
    pub(crate) kind: Kind,
    pub(crate) on_message: MessageCallback,
    pub(crate) on_subscribe: Option<SubscribeCallback>,
    pub(crate) on_unsubscribe: Option<UnsubscribeCallback>,
}

impl fmt::Debug for SubscriptionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionEntry")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// The dual channel/pattern subscription map owned by a connection's actor.
#[derive(Default)]
pub(crate) struct SubscriptionTracker {
    channels: HashMap<Bytes, SubscriptionEntry>,
    patterns: HashMap<Bytes, SubscriptionEntry>,
}

impl SubscriptionTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `is_subscribed` is always derived from map contents, never cached
    /// independently, so it cannot drift from the tracker (spec §9).
    pub(crate) fn is_subscribed(&self) -> bool {
        !self.channels.is_empty() || !self.patterns.is_empty()
    }

    pub(crate) fn total_count(&self) -> i64 {
        (self.channels.len() + self.patterns.len()) as i64
    }

    fn map_mut(&mut self, kind: Kind) -> &mut HashMap<Bytes, SubscriptionEntry> {
        match kind {
            Kind::Channel => &mut self.channels,
            Kind::Pattern => &mut self.patterns,
        }
    }

    pub(crate) fn insert(&mut self, name: Bytes, entry: SubscriptionEntry) {
        let kind = entry.kind;
        self.map_mut(kind).insert(name, entry);
    }

    pub(crate) fn remove(&mut self, kind: Kind, name: &Bytes) -> Option<SubscriptionEntry> {
        self.map_mut(kind).remove(name)
    }

    pub(crate) fn get_mut(&mut self, kind: Kind, name: &Bytes) -> Option<&mut SubscriptionEntry> {
        self.map_mut(kind).get_mut(name)
    }

    pub(crate) fn channel_names(&self) -> Vec<Bytes> {
        self.channels.keys().cloned().collect()
    }

    pub(crate) fn pattern_names(&self) -> Vec<Bytes> {
        self.patterns.keys().cloned().collect()
    }
}
