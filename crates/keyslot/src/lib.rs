//! # Keyslot
//!
//! A keyed multi-slot state store: reducers decide, the store commits, and
//! listeners hear about it, down to the individual key.
//!
//! ## Core Concepts
//!
//! - **Slot** = one named partition of state, with its own reducer and its own
//!   topic
//! - [`Action`] = what a caller asks for (`{ "type": ..., ...payload }`)
//! - [`Reducer`] = pure `(slot, action, all states) -> Reduction`
//! - [`SubEvents`] = the keys a reducer touched, announced on `slot/key`
//!
//! ## Architecture
//!
//! ```text
//! Dispatcher::dispatch(action)          BatchDispatcher::dispatch([(slot, action), ..])
//!     │                                     │
//!     ▼                                     ▼ fold over a working copy
//! Reducer.reduce(slot, action, states)  Reducer.reduce(..) per entry, sub-events merged
//!     │                                     │
//!     ├─► same Arc? ─► Unchanged            ├─► nothing changed? ─► Unchanged
//!     │                                     │
//!     ▼                                     ▼
//! PreCommitHook.before_commit() ─► Abort ─► Aborted (no state change, no events)
//!     │
//!     ▼ commit + one EventStamp
//! Emitter
//!     ├─► "slot/key"   once per sub-event key, in marking order
//!     ├─► "slot"       unless suppressed and at least one key event fired
//!     └─► "postCommit" always
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Identity is the dirty flag** - a reducer returning the same `Arc` is a
//!    no-op; any other `Arc` is committed, equal contents or not
//! 2. **Stamps only go up** - one per dispatch, one shared per batch
//! 3. **Batches are all or nothing** - any error discards every entry
//! 4. **Key events before slot events** - and slots in first-appearance order
//!    within a batch
//! 5. **Synchronous** - every reducer and listener has run when dispatch
//!    returns
//!
//! ## Example
//!
//! ```
//! use keyslot_core::{CollectionAction, KeyedCollectionReducer, Store};
//! use serde_json::json;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let store = Store::builder()
//!     .slot_with_reducer("todos", json!({}), KeyedCollectionReducer)
//!     .slot("user", json!({ "name": "ann" }))
//!     .build()?;
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let _sub = store.listen_for("todos/milk", move |event| {
//!     sink.borrow_mut().push(event.change.clone());
//! });
//!
//! store
//!     .get_dispatcher("todos")?
//!     .dispatch(CollectionAction::add("milk", json!({ "done": false })).into())?;
//!
//! assert_eq!(seen.borrow().len(), 1);
//! assert_eq!(*store.get_state("todos")?, json!({ "milk": { "done": false } }));
//! # Ok::<(), keyslot_core::StoreError>(())
//! ```
//!
//! ## What This Is Not
//!
//! No persistence, no cross-process sharing, no undo, and no structural
//! diffing. The store is `!Send`; hosts with several threads must serialize
//! access themselves.

// Core modules
mod action;
mod config;
mod dispatch;
mod emitter;
mod error;
mod event;
mod hook;
mod reducer;
mod registry;
mod stamp;
mod state;
mod store;
mod sub_events;

// Keyed collections
pub mod keyed;

#[cfg(test)]
mod test_support;


#[cfg(test)]
mod batch_tests;


// Re-export store types (primary entry point)
pub use crate::store::{create_store, Store, StoreBuilder};

// Re-export action and state types
pub use crate::action::Action;
pub use crate::state::{slot_value, SlotValue, StateSnapshot};

// Re-export reducer types
pub use crate::keyed::{CollectionAction, KeyedCollectionReducer};
pub use crate::reducer::{MergeReducer, Reducer, Reduction};
pub use crate::sub_events::{ChangeKind, SubEvents};

// Re-export dispatch types
pub use crate::dispatch::{BatchDispatcher, DispatchOutcome, Dispatcher};
pub use crate::hook::{CommitDecision, PendingCommit, PreCommitHook};

// Re-export event types
pub use crate::emitter::{
    sub_event_topic, ListenerId, Subscription, SubscriptionGuard, POST_COMMIT_TOPIC,
    TOPIC_SEPARATOR,
};
pub use crate::event::{StoreEvent, Trigger};
pub use crate::stamp::EventStamp;

// Re-export config, registry and error types
pub use crate::config::StoreConfig;
pub use crate::error::{ErrorCategory, Result, StoreError};
pub use crate::registry::{StoreRegistry, DEFAULT_STORE_ID};
