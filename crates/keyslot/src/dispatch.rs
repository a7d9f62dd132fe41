//! Dispatchers handed out by the store.

use crate::action::Action;
use crate::error::Result;
use crate::stamp::EventStamp;
use crate::store::Store;

/// Result of a dispatch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// New values were committed and announced under this stamp.
    Committed(EventStamp),
    /// Every reducer handed back the current value; nothing happened.
    Unchanged,
    /// A pre-commit hook vetoed the commit; nothing happened.
    Aborted,
}

impl DispatchOutcome {
    pub fn stamp(&self) -> Option<EventStamp> {
        match self {
            Self::Committed(stamp) => Some(*stamp),
            Self::Unchanged | Self::Aborted => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// Dispatches actions to one slot.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Store,
    slot_id: String,
}

impl Dispatcher {
    pub(crate) fn new(store: Store, slot_id: String) -> Self {
        Self { store, slot_id }
    }

    pub fn slot_id(&self) -> &str {
        &self.slot_id
    }

    /// Reduce `action` into the slot, committing and emitting if the reducer
    /// returned a new value.
    pub fn dispatch(&self, action: Action) -> Result<DispatchOutcome> {
        self.store.dispatch_single(&self.slot_id, action)
    }

    /// Like [`dispatch`](Self::dispatch), running `before` first.
    pub fn dispatch_with<F>(&self, action: Action, before: F) -> Result<DispatchOutcome>
    where
        F: FnOnce(),
    {
        before();
        self.dispatch(action)
    }
}

/// Applies `(slot, action)` entries as one batch.
///
/// Entries are folded in order against a working copy of every slot, so later
/// entries see what earlier ones did. Nothing is committed until every entry
/// has been reduced, and any error discards the whole batch. Each changed slot
/// then gets one event, all sharing one stamp, in the order the slots first
/// appeared in the input.
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    store: Store,
}

impl BatchDispatcher {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn dispatch<I, S>(&self, entries: I) -> Result<DispatchOutcome>
    where
        I: IntoIterator<Item = (S, Action)>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(slot_id, action)| (slot_id.into(), action))
            .collect();
        self.store.dispatch_batch(entries)
    }

    /// Like [`dispatch`](Self::dispatch), running `before` first.
    pub fn dispatch_with<I, S, F>(&self, entries: I, before: F) -> Result<DispatchOutcome>
    where
        I: IntoIterator<Item = (S, Action)>,
        S: Into<String>,
        F: FnOnce(),
    {
        before();
        self.dispatch(entries)
    }
}
