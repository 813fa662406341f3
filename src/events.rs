//! In-process notification bus.
//!
//! Every mutable component (header stores, URLs, credentials, requests and
//! resources) owns an [`EventEmitter`]. Mutators diff the old and new value and
//! emit a named [`Event`] only when something actually changed.
//!
//! # Event names
//!
//! | Source | Names |
//! |--------|-------|
//! | `HeaderStore` | `header.create`, `header.update`, `header.delete` |
//! | `Address` | `update.<component>`, `query.update`, `query.delete`, `update.defaultport`, `delete.defaultport` |
//! | `Credential` | `update.username`, `update.password`, `update.accessToken`, `update.accessTokenType`, `update.header` |
//! | `Request` | `update.<field>`, `abort` |
//! | `Resource` | `token.update`, `token.expired`, `token.expiration.pending` |
//!
//! # Patterns
//!
//! Listeners subscribe with a pattern: an exact name, `*` for everything, or a
//! trailing wildcard such as `header.*`.

use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A named notification with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name, e.g. `update.port`
    pub name: String,
    /// Payload, usually `{ "old": .., "new": .. }`
    pub payload: Value,
}

/// Identifier returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Listener {
    id: ListenerId,
    pattern: String,
    handler: Handler,
}

struct EmitterInner {
    listeners: RwLock<Vec<Listener>>,
    next_id: AtomicU64,
}

/// Observer list shared by a component and its relays.
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

impl EventEmitter {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        EventEmitter {
            inner: Arc::new(EmitterInner {
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Another handle onto the same listener list.
    pub(crate) fn share(&self) -> EventEmitter {
        EventEmitter {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Subscribe a handler to every event matching `pattern`.
    pub fn on<F>(&self, pattern: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.write().push(Listener {
            id,
            pattern: pattern.into(),
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a previously registered handler.
    ///
    /// Returns `false` if the id was unknown.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Number of registered handlers
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Emit an event to every matching handler.
    ///
    /// Handlers run after the listener lock is released, so a handler may
    /// subscribe, unsubscribe or emit again.
    pub fn emit(&self, name: impl Into<String>, payload: Value) {
        let event = Event {
            name: name.into(),
            payload,
        };

        let handlers: Vec<Handler> = self
            .inner
            .listeners
            .read()
            .iter()
            .filter(|l| pattern_matches(&l.pattern, &event.name))
            .map(|l| Arc::clone(&l.handler))
            .collect();

        tracing::trace!(event = %event.name, listeners = handlers.len(), "emit");

        for handler in handlers {
            handler(&event);
        }
    }

    /// Forward every event of this emitter onto `target`.
    ///
    /// With a prefix, `update.port` is re-emitted as `<prefix>.update.port`.
    /// The relay is one-way and holds `target` weakly: once every handle of
    /// the target is gone, relayed events are dropped. Remove the relay with
    /// [`off`](EventEmitter::off) and the returned id.
    pub fn relay(&self, target: &EventEmitter, prefix: Option<&str>) -> ListenerId {
        let target = Arc::downgrade(&target.inner);
        let prefix = prefix
            .map(|p| p.trim().trim_end_matches('.').to_string())
            .filter(|p| !p.is_empty());

        self.on("*", move |event| {
            let name = match &prefix {
                Some(p) => format!("{}.{}", p, event.name),
                None => event.name.clone(),
            };
            if let Some(inner) = target.upgrade() {
                EventEmitter { inner }.emit(name, event.payload.clone());
            }
        })
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" || pattern == name {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => false,
    }
}
