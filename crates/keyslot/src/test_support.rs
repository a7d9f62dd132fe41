//! Shared helpers for the in-crate tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::emitter::Subscription;
use crate::event::StoreEvent;
use crate::store::Store;

pub(crate) type Log = Rc<RefCell<Vec<(String, StoreEvent)>>>;

/// Record every event on `topics` into one ordered log.
pub(crate) fn record(store: &Store, topics: &[&str]) -> (Log, Vec<Subscription>) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let subscriptions = topics
        .iter()
        .map(|topic| {
            let sink = Rc::clone(&log);
            let name = topic.to_string();
            store.listen_for(topic, move |event| {
                sink.borrow_mut().push((name.clone(), event.clone()));
            })
        })
        .collect();
    (log, subscriptions)
}

pub(crate) fn topics(log: &Log) -> Vec<String> {
    log.borrow().iter().map(|(topic, _)| topic.clone()).collect()
}
