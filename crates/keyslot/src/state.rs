//! Slot values and read-only snapshots of every slot.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, StoreError};

/// The value held by one slot.
///
/// The `Arc` pointer is the slot's identity: a reducer signals "no change" by
/// handing back the very same `Arc`, and anything else is committed as new,
/// whatever its contents.
pub type SlotValue = Arc<Value>;

/// Wrap a plain value as a fresh slot value.
pub fn slot_value(value: impl Into<Value>) -> SlotValue {
    Arc::new(value.into())
}

/// A point-in-time view of every slot in a store.
///
/// Cloning is cheap: only the `Arc`s are copied, never the values.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    slots: HashMap<String, SlotValue>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot_id: &str) -> Option<&SlotValue> {
        self.slots.get(slot_id)
    }

    /// Like [`get`](Self::get) but fails with `SlotNotFound`.
    pub fn require(&self, slot_id: &str) -> Result<&SlotValue> {
        self.slots
            .get(slot_id)
            .ok_or_else(|| StoreError::slot_not_found(slot_id))
    }

    pub fn contains(&self, slot_id: &str) -> bool {
        self.slots.contains_key(slot_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotValue)> {
        self.slots.iter().map(|(id, value)| (id.as_str(), value))
    }

    pub(crate) fn insert(&mut self, slot_id: impl Into<String>, value: SlotValue) {
        self.slots.insert(slot_id.into(), value);
    }

    /// Render every slot as one JSON object, mostly for debugging.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.slots
                .iter()
                .map(|(id, value)| (id.clone(), Value::clone(value)))
                .collect(),
        )
    }
}

impl FromIterator<(String, SlotValue)> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, SlotValue)>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}
