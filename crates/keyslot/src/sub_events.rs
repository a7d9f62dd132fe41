//! Per-key change markers produced by reducers.
//!
//! A reducer that manages a keyed collection reports which keys it touched.
//! The store emits one event on `slot/key` for each of them, before the
//! slot-wide event, and can drop the slot-wide event entirely when the reducer
//! asks for it and at least one key event went out.

use std::fmt;

use smallvec::SmallVec;

/// What happened to one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Update,
    Other(String),
}

impl ChangeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Update => "update",
            Self::Other(marker) => marker,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insertion-ordered `key -> ChangeKind` map plus the suppression flag.
///
/// Re-marking a key overwrites its marker in place, so emission order is
/// always the order in which keys were first marked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubEvents {
    entries: SmallVec<[(String, ChangeKind); 4]>,
    suppress: Option<bool>,
}

impl SubEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` with `change`.
    pub fn mark(&mut self, key: impl Into<String>, change: ChangeKind) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = change,
            None => self.entries.push((key, change)),
        }
    }

    /// Builder form of [`mark`](Self::mark).
    pub fn with(mut self, key: impl Into<String>, change: ChangeKind) -> Self {
        self.mark(key, change);
        self
    }

    /// Ask the store to skip the slot-wide event when key events fire.
    pub fn set_suppress(&mut self, suppress: bool) {
        self.suppress = Some(suppress);
    }

    pub fn suppressed(mut self) -> Self {
        self.set_suppress(true);
        self
    }

    pub fn suppresses_slot_event(&self) -> bool {
        self.suppress.unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<&ChangeKind> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, change)| change)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChangeKind)> {
        self.entries.iter().map(|(key, change)| (key.as_str(), change))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No keys marked. The suppression flag does not count.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold `later` into `self`: keys are unioned in first-seen order, later
    /// markers win, and an explicit later suppression flag replaces ours.
    pub fn merge(&mut self, later: SubEvents) {
        for (key, change) in later.entries {
            self.mark(key, change);
        }
        if later.suppress.is_some() {
            self.suppress = later.suppress;
        }
    }

    /// Whether the slot-wide event should go out after the key events.
    ///
    /// Suppression only takes effect when there is at least one key event to
    /// stand in for it.
    pub(crate) fn emits_slot_event(&self) -> bool {
        !(self.suppresses_slot_event() && !self.is_empty())
    }
}
