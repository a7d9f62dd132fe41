//! Testing utilities for keyslot stores.
//!
//! [`EventRecorder`] subscribes to a set of topics and keeps every event it
//! receives, in delivery order, so tests can assert on emission order,
//! stamps and payloads without hand-rolling listeners.

use std::cell::RefCell;
use std::rc::Rc;

use keyslot_core::{EventStamp, Store, StoreEvent, SubscriptionGuard};
use serde_json::Value;

/// One delivered event and the topic it arrived on.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub topic: String,
    pub event: StoreEvent,
}

/// Records events on a fixed set of topics until dropped.
pub struct EventRecorder {
    log: Rc<RefCell<Vec<Recorded>>>,
    _guards: Vec<SubscriptionGuard>,
}

impl EventRecorder {
    pub fn new(store: &Store, topics: &[&str]) -> Self {
        let log = Rc::new(RefCell::new(Vec::new()));
        let guards = topics
            .iter()
            .map(|topic| {
                let sink = Rc::clone(&log);
                let name = (*topic).to_owned();
                store
                    .listen_for(topic, move |event| {
                        sink.borrow_mut().push(Recorded {
                            topic: name.clone(),
                            event: event.clone(),
                        });
                    })
                    .guard()
            })
            .collect();
        Self {
            log,
            _guards: guards,
        }
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.log.borrow().clone()
    }

    /// Topics in delivery order.
    pub fn topics(&self) -> Vec<String> {
        self.log.borrow().iter().map(|r| r.topic.clone()).collect()
    }

    pub fn events_on(&self, topic: &str) -> Vec<StoreEvent> {
        self.log
            .borrow()
            .iter()
            .filter(|r| r.topic == topic)
            .map(|r| r.event.clone())
            .collect()
    }

    /// Committed values seen on `topic`, in order.
    pub fn states_on(&self, topic: &str) -> Vec<Value> {
        self.events_on(topic)
            .iter()
            .map(|event| Value::clone(&event.state))
            .collect()
    }

    /// Stamps in delivery order, one per recorded event.
    pub fn stamps(&self) -> Vec<EventStamp> {
        self.log.borrow().iter().map(|r| r.event.stamp).collect()
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

/// Panics unless every stamp is strictly greater than the one before it.
pub fn assert_strictly_increasing(stamps: &[EventStamp]) {
    for pair in stamps.windows(2) {
        assert!(
            pair[0] < pair[1],
            "stamp {} is not after {}",
            pair[1],
            pair[0]
        );
    }
}
