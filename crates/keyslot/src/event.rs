//! Commit events delivered to listeners.

use std::rc::Rc;

use crate::action::Action;
use crate::stamp::EventStamp;
use crate::state::{SlotValue, StateSnapshot};
use crate::sub_events::{ChangeKind, SubEvents};

/// What caused a commit.
///
/// Batch payloads sit behind `Rc`: the same commit is cloned into every
/// `slot/key` event and every slot of the batch.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// A single dispatch.
    Single { action: Action },
    /// A batch dispatch.
    Batch {
        /// Every slot the batch changed, in first-appearance order.
        slot_ids: Rc<[String]>,
        /// The actions that changed *this* slot, in input order.
        actions: Rc<[Action]>,
        /// Every slot as it was before the batch.
        prev_states: Rc<StateSnapshot>,
    },
}

/// One commit, as seen by a listener of one topic.
///
/// The same commit is delivered on `slot/key` topics (with `sub_key` and
/// `change` set), on the slot topic, and on `postCommit`.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub stamp: EventStamp,
    pub slot_id: String,
    pub sub_key: Option<String>,
    pub change: Option<ChangeKind>,
    pub prev_state: SlotValue,
    pub state: SlotValue,
    pub sub_events: SubEvents,
    pub trigger: Trigger,
}

impl StoreEvent {
    pub fn is_batch(&self) -> bool {
        matches!(self.trigger, Trigger::Batch { .. })
    }

    /// Actions applied to this slot by the commit.
    pub fn actions(&self) -> &[Action] {
        match &self.trigger {
            Trigger::Single { action } => std::slice::from_ref(action),
            Trigger::Batch { actions, .. } => &actions[..],
        }
    }

    /// Slots changed by the commit. A single dispatch only ever changes its
    /// own slot.
    pub fn slot_ids(&self) -> Vec<&str> {
        match &self.trigger {
            Trigger::Single { .. } => vec![self.slot_id.as_str()],
            Trigger::Batch { slot_ids, .. } => slot_ids.iter().map(String::as_str).collect(),
        }
    }

    pub fn batch_prev_states(&self) -> Option<&StateSnapshot> {
        match &self.trigger {
            Trigger::Single { .. } => None,
            Trigger::Batch { prev_states, .. } => Some(&**prev_states),
        }
    }

    pub(crate) fn for_sub_key(&self, key: &str, change: &ChangeKind) -> Self {
        Self {
            sub_key: Some(key.to_owned()),
            change: Some(change.clone()),
            ..self.clone()
        }
    }
}
