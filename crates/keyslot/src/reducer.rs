//! Reducers: pure `(slot, action, all states) -> new slot value` functions.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::action::Action;
use crate::state::{SlotValue, StateSnapshot};
use crate::sub_events::SubEvents;

/// A reducer's output: the slot's next value and the keys it touched.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub value: SlotValue,
    pub sub_events: SubEvents,
}

impl Reduction {
    pub fn new(value: SlotValue) -> Self {
        Self {
            value,
            sub_events: SubEvents::new(),
        }
    }

    /// Hand back the current value untouched. The store sees the same `Arc`
    /// and skips the commit.
    pub fn unchanged(current: &SlotValue) -> Self {
        Self::new(Arc::clone(current))
    }

    pub fn with_sub_events(mut self, sub_events: SubEvents) -> Self {
        self.sub_events = sub_events;
        self
    }

    pub fn is_unchanged(&self, current: &SlotValue) -> bool {
        Arc::ptr_eq(&self.value, current)
    }
}

/// Computes the next value of one slot.
///
/// Must return [`Reduction::unchanged`] (the same `Arc`) when nothing should
/// change. Any other `Arc` is committed and announced, even if it is equal in
/// content to the current value.
pub trait Reducer {
    fn reduce(&self, slot_id: &str, action: &Action, states: &StateSnapshot) -> Result<Reduction>;
}

impl<F> Reducer for F
where
    F: Fn(&str, &Action, &StateSnapshot) -> Result<Reduction>,
{
    fn reduce(&self, slot_id: &str, action: &Action, states: &StateSnapshot) -> Result<Reduction> {
        self(slot_id, action, states)
    }
}

/// The reducer used for slots without one: shallow-merges the action's
/// payload fields into the slot's object value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeReducer;

impl Reducer for MergeReducer {
    fn reduce(&self, slot_id: &str, action: &Action, states: &StateSnapshot) -> Result<Reduction> {
        let current = states.require(slot_id)?;
        if action.payload.is_empty() {
            return Ok(Reduction::unchanged(current));
        }

        let mut merged = match &**current {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        for (field, value) in &action.payload {
            merged.insert(field.clone(), value.clone());
        }
        Ok(Reduction::new(Arc::new(Value::Object(merged))))
    }
}
