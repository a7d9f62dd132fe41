//! Batch dispatch: fold semantics, shared stamps, sub-event merging.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::test_support::{record, topics};
use crate::{
    Action, ChangeKind, CollectionAction, CommitDecision, DispatchOutcome, ErrorCategory,
    KeyedCollectionReducer, PendingCommit, Reduction, StateSnapshot, Store, SubEvents,
    POST_COMMIT_TOPIC,
};

/// Replaces the slot with the action's `value` field.
fn replace_reducer(_: &str, action: &Action, _: &StateSnapshot) -> anyhow::Result<Reduction> {
    let value = action.get("value").cloned().unwrap_or(Value::Null);
    Ok(Reduction::new(Arc::new(value)))
}

fn set(value: impl Into<Value>) -> Action {
    Action::new("set").with("value", value)
}

fn replace_store() -> Store {
    Store::builder()
        .slot_with_reducer("s1", 0, replace_reducer)
        .slot_with_reducer("s2", 0, replace_reducer)
        .slot_with_reducer("s3", 0, replace_reducer)
        .build()
        .unwrap()
}

#[test]
fn one_event_per_slot_with_shared_stamp() {
    let store = replace_store();
    let prev = store.get_states();
    let (log, _subs) = record(&store, &["s1", "s2", "s3"]);

    let outcome = store
        .get_batch_dispatcher()
        .dispatch([("s1", set(1)), ("s1", set(2)), ("s2", set(3))])
        .unwrap();

    assert_eq!(topics(&log), vec!["s1", "s2"]);
    let log = log.borrow();
    let (_, s1) = &log[0];
    let (_, s2) = &log[1];

    assert_eq!(s1.stamp, s2.stamp);
    assert_eq!(Some(s1.stamp), outcome.stamp());
    assert!(s1.is_batch());
    assert_eq!(s1.actions(), &[set(1), set(2)]);
    assert_eq!(s2.actions(), &[set(3)]);
    assert_eq!(s1.slot_ids(), vec!["s1", "s2"]);
    assert_eq!(s2.slot_ids(), vec!["s1", "s2"]);

    assert_eq!(*s1.state, json!(2));
    assert!(Arc::ptr_eq(&s1.prev_state, prev.get("s1").unwrap()));
    let batch_prev = s1.batch_prev_states().unwrap();
    assert!(Arc::ptr_eq(batch_prev.get("s3").unwrap(), prev.get("s3").unwrap()));
    assert_eq!(*store.get_state("s2").unwrap(), json!(3));
}

#[test]
fn batch_payload_is_shared_across_events() {
    let store = Store::builder()
        .slot_with_reducer("todos", json!({}), KeyedCollectionReducer)
        .slot_with_reducer("s1", 0, replace_reducer)
        .build()
        .unwrap();
    let (log, _subs) = record(&store, &["todos/a", "todos/b", "todos", "s1"]);

    store
        .get_batch_dispatcher()
        .dispatch([
            ("todos", CollectionAction::add("a", 1).into()),
            ("todos", CollectionAction::add("b", 2).into()),
            ("s1", set(1)),
        ])
        .unwrap();

    assert_eq!(topics(&log), vec!["todos/a", "todos/b", "todos", "s1"]);
    let log = log.borrow();
    let events: Vec<_> = log.iter().map(|(_, event)| event).collect();
    let prev = events[0].batch_prev_states().unwrap();
    for event in &events[1..] {
        assert!(std::ptr::eq(event.batch_prev_states().unwrap(), prev));
    }
    // key events and the slot event of one slot share its action list
    assert!(std::ptr::eq(events[0].actions(), events[2].actions()));
    assert!(std::ptr::eq(events[1].actions(), events[2].actions()));
}

#[test]
fn later_entries_see_earlier_results() {
    let store = Store::builder()
        .slot_with_reducer("count", 0, replace_reducer)
        .slot_with_reducer(
            "double",
            0,
            |_: &str, _: &Action, states: &StateSnapshot| -> anyhow::Result<Reduction> {
                let count = states.require("count")?.as_i64().unwrap_or(0);
                Ok(Reduction::new(Arc::new(json!(count * 2))))
            },
        )
        .build()
        .unwrap();

    store
        .get_batch_dispatcher()
        .dispatch([("count", set(21)), ("double", Action::new("recompute"))])
        .unwrap();

    assert_eq!(*store.get_state("double").unwrap(), json!(42));
}

#[test]
fn emission_follows_first_appearance() {
    let store = replace_store();
    let (log, _subs) = record(&store, &["s1", "s2", "s3"]);

    store
        .get_batch_dispatcher()
        .dispatch([("s3", set(1)), ("s1", set(1)), ("s3", set(2)), ("s2", set(1))])
        .unwrap();

    assert_eq!(topics(&log), vec!["s3", "s1", "s2"]);
    assert_eq!(log.borrow()[0].1.slot_ids(), vec!["s3", "s1", "s2"]);
}

#[test]
fn sub_events_merge_across_entries() {
    let store = Store::builder()
        .slot_with_reducer(
            "items",
            json!({}),
            |_: &str, action: &Action, _: &StateSnapshot| -> anyhow::Result<Reduction> {
                let mut sub_events = SubEvents::new();
                if let Some(key) = action.get("key").and_then(Value::as_str) {
                    sub_events.mark(key, ChangeKind::Add);
                }
                if action.get("quiet").is_some() {
                    sub_events.set_suppress(true);
                }
                Ok(Reduction::new(Arc::new(json!({}))).with_sub_events(sub_events))
            },
        )
        .build()
        .unwrap();
    let (log, _subs) = record(
        &store,
        &["items/item1", "items/item2", "items", POST_COMMIT_TOPIC],
    );

    store
        .get_batch_dispatcher()
        .dispatch([
            ("items", Action::new("add").with("key", "item1")),
            ("items", Action::new("add").with("key", "item2").with("quiet", true)),
        ])
        .unwrap();

    assert_eq!(
        topics(&log),
        vec!["items/item1", "items/item2", POST_COMMIT_TOPIC]
    );
    let merged = &log.borrow()[0].1.sub_events;
    assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["item1", "item2"]);
    assert!(merged.suppresses_slot_event());
}

#[test]
fn keyed_collection_batch() {
    let store = Store::builder()
        .slot_with_reducer("todos", json!({}), KeyedCollectionReducer)
        .build()
        .unwrap();
    let (log, _subs) = record(&store, &["todos/k", "todos/k2", "todos"]);

    store
        .get_batch_dispatcher()
        .dispatch([
            ("todos", CollectionAction::add("k", json!({ "v": 1 })).into()),
            ("todos", CollectionAction::move_to("k", "k2").into()),
        ])
        .unwrap();

    // k was added then removed within the batch: the later marker wins
    assert_eq!(topics(&log), vec!["todos/k", "todos/k2", "todos"]);
    let log = log.borrow();
    assert_eq!(log[0].1.change, Some(ChangeKind::Remove));
    assert_eq!(log[1].1.change, Some(ChangeKind::Add));
    assert_eq!(*store.get_state("todos").unwrap(), json!({ "k2": { "v": 1 } }));
}

#[test]
fn unknown_slot_aborts_whole_batch() {
    let store = replace_store();
    let before = store.get_states();
    let (log, _subs) = record(&store, &["s1", POST_COMMIT_TOPIC]);

    let err = store
        .get_batch_dispatcher()
        .dispatch([("s1", set(9)), ("nope", set(1))])
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(Arc::ptr_eq(
        &store.get_state("s1").unwrap(),
        before.get("s1").unwrap()
    ));
    assert!(log.borrow().is_empty());
}

#[test]
fn reducer_error_aborts_whole_batch() {
    let store = Store::builder()
        .slot_with_reducer("todos", json!({}), KeyedCollectionReducer)
        .slot("user", json!({}))
        .build()
        .unwrap();

    let err = store
        .get_batch_dispatcher()
        .dispatch([
            ("user", Action::new("set").with("name", "ann")),
            ("todos", Action::new("bad").with("oldKey", "a")),
        ])
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Reducer);
    assert_eq!(*store.get_state("user").unwrap(), json!({}));
}

#[test]
fn unchanged_batches_emit_nothing() {
    let store = Store::builder()
        .slot_with_reducer("todos", json!({ "a": 1 }), KeyedCollectionReducer)
        .build()
        .unwrap();
    let (log, _subs) = record(&store, &["todos", POST_COMMIT_TOPIC]);
    let batch = store.get_batch_dispatcher();

    let outcome = batch
        .dispatch([("todos", CollectionAction::remove("missing").into())])
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Unchanged);

    let empty: Vec<(String, Action)> = Vec::new();
    assert_eq!(batch.dispatch(empty).unwrap(), DispatchOutcome::Unchanged);
    assert!(log.borrow().is_empty());
}

#[test]
fn slots_left_unchanged_are_not_listed() {
    let store = Store::builder()
        .slot_with_reducer("todos", json!({}), KeyedCollectionReducer)
        .slot_with_reducer("s1", 0, replace_reducer)
        .build()
        .unwrap();
    let (log, _subs) = record(&store, &["todos", "s1"]);

    store
        .get_batch_dispatcher()
        .dispatch([
            ("todos", CollectionAction::remove("missing").into()),
            ("s1", set(1)),
        ])
        .unwrap();

    assert_eq!(topics(&log), vec!["s1"]);
    assert_eq!(log.borrow()[0].1.slot_ids(), vec!["s1"]);
}

#[test]
fn hooks_see_the_whole_batch() {
    let store = replace_store();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    store.add_pre_commit_hook(move |pending: &PendingCommit<'_>| {
        assert!(pending.batch);
        sink.borrow_mut().extend(pending.slot_ids.iter().cloned());
        let next = pending.next_states.get("s2").map(|value| Value::clone(value));
        if next == Some(json!("forbidden")) {
            CommitDecision::Abort
        } else {
            CommitDecision::Proceed
        }
    });
    let batch = store.get_batch_dispatcher();

    let outcome = batch
        .dispatch([("s1", set(1)), ("s2", set("forbidden"))])
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Aborted);
    assert_eq!(*store.get_state("s1").unwrap(), json!(0));

    let outcome = batch.dispatch([("s2", set("fine"))]).unwrap();
    assert_eq!(*seen.borrow(), vec!["s1", "s2", "s2"]);
    // the aborted batch consumed no stamp
    assert_eq!(outcome.stamp().map(|stamp| stamp.seq), Some(1));
}

#[test]
fn nested_dispatch_during_batch_emission_runs_ahead_of_later_slots() {
    let store = replace_store();
    let nested = store.get_dispatcher("s2").unwrap();
    let _trigger = store.listen_for("s1", move |_| {
        nested.dispatch(set("nested")).unwrap();
    });
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _s2 = store.listen_for("s2", move |event| {
        sink.borrow_mut()
            .push((event.stamp.seq, Value::clone(&event.state)));
    });

    store
        .get_batch_dispatcher()
        .dispatch([("s1", set("batch")), ("s2", set("batch"))])
        .unwrap();

    // the batch committed first, so its s2 event arrives after the newer one
    assert_eq!(
        *seen.borrow(),
        vec![(2, json!("nested")), (1, json!("batch"))]
    );
    assert_eq!(*store.get_state("s2").unwrap(), json!("nested"));
}

#[test]
fn batch_pre_dispatch_callback_runs_first() {
    let store = replace_store();
    let steps = Rc::new(RefCell::new(Vec::new()));
    let listener_steps = Rc::clone(&steps);
    let _sub = store.listen_for("s1", move |_| listener_steps.borrow_mut().push("event"));

    let before_steps = Rc::clone(&steps);
    store
        .get_batch_dispatcher()
        .dispatch_with([("s1", set(1))], move || before_steps.borrow_mut().push("before"))
        .unwrap();

    assert_eq!(*steps.borrow(), vec!["before", "event"]);
}

#[test]
fn post_commit_fires_per_slot() {
    let store = replace_store();
    let (log, _subs) = record(&store, &[POST_COMMIT_TOPIC]);

    store
        .get_batch_dispatcher()
        .dispatch([("s1", set(1)), ("s2", set(1))])
        .unwrap();

    let log = log.borrow();
    let slots: Vec<&str> = log.iter().map(|(_, event)| event.slot_id.as_str()).collect();
    assert_eq!(slots, vec!["s1", "s2"]);
    assert_eq!(log[0].1.stamp, log[1].1.stamp);
}
