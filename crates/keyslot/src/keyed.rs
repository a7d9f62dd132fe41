//! Reducer for slots holding a keyed collection (`{ key: item, ... }`).
//!
//! Every change reports the keys it touched as sub-events, so listeners can
//! subscribe to `slot/key` and ignore the rest of the collection.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::{Map, Value};

use crate::action::Action;
use crate::reducer::{Reducer, Reduction};
use crate::state::{SlotValue, StateSnapshot};
use crate::sub_events::{ChangeKind, SubEvents};

pub const NEW_KEY_FIELD: &str = "newKey";
pub const OLD_KEY_FIELD: &str = "oldKey";
pub const DELETE_KEY_FIELD: &str = "deleteKey";
pub const ITEM_FIELD: &str = "item";
pub const MERGE_FIELD: &str = "merge";

/// The three collection operations.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionAction {
    /// Set `items[key] = item`.
    Add { key: String, item: Value },
    /// Move `items[from]` to `items[to]`, merging `merge` into it.
    Move {
        from: String,
        to: String,
        merge: Map<String, Value>,
    },
    /// Drop `items[key]`.
    Remove { key: String },
}

impl CollectionAction {
    pub fn add(key: impl Into<String>, item: impl Into<Value>) -> Self {
        Self::Add {
            key: key.into(),
            item: item.into(),
        }
    }

    pub fn move_to(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Move {
            from: from.into(),
            to: to.into(),
            merge: Map::new(),
        }
    }

    /// Fields merged into the moved item. No effect on other operations.
    pub fn merging(mut self, fields: Map<String, Value>) -> Self {
        if let Self::Move { merge, .. } = &mut self {
            *merge = fields;
        }
        self
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }

    /// Read the operation out of an open action.
    ///
    /// `Ok(None)` when the action carries no collection fields. An action
    /// carrying more than one operation shape is rejected.
    pub fn from_action(action: &Action) -> Result<Option<Self>> {
        let new_key = key_field(action, NEW_KEY_FIELD)?;
        let old_key = key_field(action, OLD_KEY_FIELD)?;
        let delete_key = key_field(action, DELETE_KEY_FIELD)?;

        match (new_key, old_key, delete_key) {
            (None, None, None) => Ok(None),
            (None, None, Some(key)) => Ok(Some(Self::Remove { key })),
            (Some(key), None, None) => Ok(Some(Self::Add {
                key,
                item: action.get(ITEM_FIELD).cloned().unwrap_or(Value::Null),
            })),
            (Some(to), Some(from), None) => {
                let merge = match action.get(MERGE_FIELD) {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(fields)) => fields.clone(),
                    Some(other) => bail!("`{MERGE_FIELD}` must be an object, got {other}"),
                };
                Ok(Some(Self::Move { from, to, merge }))
            }
            (None, Some(_), None) => bail!("`{OLD_KEY_FIELD}` without `{NEW_KEY_FIELD}`"),
            _ => bail!("action `{}` carries more than one collection operation", action.kind),
        }
    }
}

impl From<CollectionAction> for Action {
    fn from(op: CollectionAction) -> Self {
        match op {
            CollectionAction::Add { key, item } => Action::new("add")
                .with(NEW_KEY_FIELD, key)
                .with(ITEM_FIELD, item),
            CollectionAction::Move { from, to, merge } => Action::new("move")
                .with(OLD_KEY_FIELD, from)
                .with(NEW_KEY_FIELD, to)
                .with(MERGE_FIELD, Value::Object(merge)),
            CollectionAction::Remove { key } => Action::new("remove").with(DELETE_KEY_FIELD, key),
        }
    }
}

fn key_field(action: &Action, field: &str) -> Result<Option<String>> {
    match action.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(key)) => Ok(Some(key.clone())),
        Some(Value::Number(key)) => Ok(Some(key.to_string())),
        Some(other) => bail!("`{field}` must be a string or number, got {other}"),
    }
}

/// Reducer for keyed collections. Actions without collection fields leave
/// the slot unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyedCollectionReducer;

impl Reducer for KeyedCollectionReducer {
    fn reduce(&self, slot_id: &str, action: &Action, states: &StateSnapshot) -> Result<Reduction> {
        let current = states.require(slot_id)?;
        match CollectionAction::from_action(action)? {
            Some(op) => Ok(apply(current, op)),
            None => Ok(Reduction::unchanged(current)),
        }
    }
}

/// Apply one operation to a collection value.
pub fn apply(current: &SlotValue, op: CollectionAction) -> Reduction {
    let mut items = match &**current {
        Value::Object(items) => items.clone(),
        _ => Map::new(),
    };

    let sub_events = match op {
        CollectionAction::Add { key, item } => {
            items.insert(key.clone(), item);
            SubEvents::new().with(key, ChangeKind::Add)
        }
        CollectionAction::Move { from, to, merge } => {
            let moved = match items.remove(&from) {
                Some(Value::Object(mut fields)) => {
                    fields.extend(merge);
                    Value::Object(fields)
                }
                Some(other) if merge.is_empty() => other,
                _ => Value::Object(merge),
            };
            items.insert(to.clone(), moved);
            let sub_events = SubEvents::new().with(to.clone(), ChangeKind::Add);
            if from == to {
                sub_events
            } else {
                sub_events.with(from, ChangeKind::Remove)
            }
        }
        CollectionAction::Remove { key } => {
            if items.remove(&key).is_none() {
                return Reduction::unchanged(current);
            }
            SubEvents::new().with(key, ChangeKind::Remove)
        }
    };

    Reduction::new(Arc::new(Value::Object(items))).with_sub_events(sub_events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::slot_value;
    use serde_json::json;

    fn collect(events: &SubEvents) -> Vec<(String, ChangeKind)> {
        events
            .iter()
            .map(|(key, change)| (key.to_owned(), change.clone()))
            .collect()
    }

    #[test]
    fn add_move_remove_round_trip() {
        let empty = slot_value(json!({}));

        let added = apply(&empty, CollectionAction::add("k", json!({ "v": 1 })));
        assert_eq!(*added.value, json!({ "k": { "v": 1 } }));
        assert_eq!(collect(&added.sub_events), vec![("k".into(), ChangeKind::Add)]);

        let moved = apply(&added.value, CollectionAction::move_to("k", "k2"));
        assert_eq!(*moved.value, json!({ "k2": { "v": 1 } }));
        assert_eq!(
            collect(&moved.sub_events),
            vec![("k2".into(), ChangeKind::Add), ("k".into(), ChangeKind::Remove)]
        );

        let removed = apply(&moved.value, CollectionAction::remove("k2"));
        assert_eq!(*removed.value, json!({}));
        assert_eq!(
            collect(&removed.sub_events),
            vec![("k2".into(), ChangeKind::Remove)]
        );
    }

    #[test]
    fn move_merges_extra_fields() {
        let items = slot_value(json!({ "draft": { "title": "a", "n": 1 } }));
        let mut extra = Map::new();
        extra.insert("n".into(), json!(2));

        let moved = apply(&items, CollectionAction::move_to("draft", "final").merging(extra));
        assert_eq!(*moved.value, json!({ "final": { "title": "a", "n": 2 } }));
    }

    #[test]
    fn move_of_missing_item_uses_empty_base() {
        let items = slot_value(json!({}));
        let mut extra = Map::new();
        extra.insert("fresh".into(), json!(true));

        let moved = apply(&items, CollectionAction::move_to("ghost", "k").merging(extra));
        assert_eq!(*moved.value, json!({ "k": { "fresh": true } }));
    }

    #[test]
    fn move_onto_itself_reports_single_add() {
        let items = slot_value(json!({ "k": { "v": 1 } }));
        let moved = apply(&items, CollectionAction::move_to("k", "k"));
        assert_eq!(*moved.value, json!({ "k": { "v": 1 } }));
        assert_eq!(collect(&moved.sub_events), vec![("k".into(), ChangeKind::Add)]);
    }

    #[test]
    fn removing_absent_key_is_unchanged() {
        let items = slot_value(json!({ "a": 1 }));
        let reduction = apply(&items, CollectionAction::remove("b"));
        assert!(reduction.is_unchanged(&items));
        assert!(reduction.sub_events.is_empty());
    }

    #[test]
    fn parses_open_actions() {
        let add = Action::new("add").with(NEW_KEY_FIELD, 7).with(ITEM_FIELD, "x");
        assert_eq!(
            CollectionAction::from_action(&add).unwrap(),
            Some(CollectionAction::add("7", "x"))
        );

        let op = CollectionAction::move_to("a", "b");
        assert_eq!(
            CollectionAction::from_action(&Action::from(op.clone())).unwrap(),
            Some(op)
        );

        assert_eq!(
            CollectionAction::from_action(&Action::new("noop")).unwrap(),
            None
        );
    }

    #[test]
    fn rejects_mixed_operations() {
        let mixed = Action::new("both")
            .with(NEW_KEY_FIELD, "a")
            .with(DELETE_KEY_FIELD, "b");
        assert!(CollectionAction::from_action(&mixed).is_err());

        let dangling = Action::new("move").with(OLD_KEY_FIELD, "a");
        assert!(CollectionAction::from_action(&dangling).is_err());
    }

    #[test]
    fn reducer_ignores_unrelated_actions() {
        let states: StateSnapshot = [("todos".to_owned(), slot_value(json!({})))]
            .into_iter()
            .collect();
        let reduction = KeyedCollectionReducer
            .reduce("todos", &Action::new("refresh"), &states)
            .unwrap();
        assert!(reduction.is_unchanged(states.get("todos").unwrap()));
    }
}
