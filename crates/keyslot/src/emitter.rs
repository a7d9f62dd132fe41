//! Topic-keyed listener registry.
//!
//! Topics are matched exactly. Handlers for one topic run in registration
//! order, synchronously, inside the dispatch that produced the event.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use uuid::Uuid;

use crate::event::StoreEvent;

/// Topic receiving every commit regardless of slot.
pub const POST_COMMIT_TOPIC: &str = "postCommit";

/// Separator between a slot id and a sub-key in a topic.
pub const TOPIC_SEPARATOR: char = '/';

/// Topic for events about `key` inside `slot_id`.
pub fn sub_event_topic(slot_id: &str, key: &str) -> String {
    format!("{slot_id}{TOPIC_SEPARATOR}{key}")
}

type Handler = Rc<dyn Fn(&StoreEvent)>;

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Listener {
    id: ListenerId,
    handler: Handler,
}

#[derive(Default)]
pub(crate) struct Emitter {
    topics: RefCell<HashMap<String, Vec<Listener>>>,
}

impl Emitter {
    pub(crate) fn listen(self: &Rc<Self>, topic: &str, handler: Handler) -> Subscription {
        let id = ListenerId::new();
        self.topics
            .borrow_mut()
            .entry(topic.to_owned())
            .or_default()
            .push(Listener { id, handler });

        Subscription {
            emitter: Rc::downgrade(self),
            topic: topic.to_owned(),
            id,
        }
    }

    fn remove(&self, topic: &str, id: ListenerId) -> bool {
        let mut topics = self.topics.borrow_mut();
        let Some(listeners) = topics.get_mut(topic) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            topics.remove(topic);
        }
        removed
    }

    /// Invoke every handler on `topic`; returns how many ran.
    ///
    /// Handlers are snapshotted first, so they may subscribe, unsubscribe or
    /// dispatch again without tripping over the registry borrow.
    pub(crate) fn emit(&self, topic: &str, event: &StoreEvent) -> usize {
        let handlers: SmallVec<[Handler; 4]> = match self.topics.borrow().get(topic) {
            Some(listeners) => listeners.iter().map(|l| Rc::clone(&l.handler)).collect(),
            None => return 0,
        };
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub(crate) fn listener_count(&self, topic: &str) -> usize {
        self.topics.borrow().get(topic).map_or(0, Vec::len)
    }
}

/// Handle returned by [`Store::listen_for`](crate::Store::listen_for).
///
/// Dropping it leaves the handler registered; only
/// [`unsubscribe`](Self::unsubscribe) removes it. Use [`guard`](Self::guard)
/// when the handler should live exactly as long as some owner.
#[must_use = "dropping a Subscription keeps the handler registered forever"]
pub struct Subscription {
    emitter: Weak<Emitter>,
    topic: String,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove exactly this registration. Returns false if it was already gone
    /// or the store no longer exists.
    pub fn unsubscribe(self) -> bool {
        self.remove()
    }

    /// Turn into a guard that unsubscribes on drop.
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard(Some(self))
    }

    fn remove(&self) -> bool {
        self.emitter
            .upgrade()
            .is_some_and(|emitter| emitter.remove(&self.topic, self.id))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}

/// Unsubscribes its registration when dropped.
#[derive(Debug)]
pub struct SubscriptionGuard(Option<Subscription>);

impl SubscriptionGuard {
    pub fn topic(&self) -> Option<&str> {
        self.0.as_ref().map(Subscription::topic)
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.0.take() {
            subscription.remove();
        }
    }
}
