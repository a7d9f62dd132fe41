//! # Keyslot Form
//!
//! Form state kept in two keyed-collection slots of a keyslot store:
//!
//! - `<name>.values` holds `{ field: value }`
//! - `<name>.errors` holds `{ field: message }` for fields that failed
//!   validation
//!
//! Because both are keyed collections, a view can listen to
//! `<name>.values/<field>` and only hear about its own field.
//!
//! Validators run one after another in registration order. Several may flag
//! the same field; their messages are joined with [`ERROR_DELIMITER`] instead
//! of failing fast.

mod validator;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use keyslot_core::{
    sub_event_topic, Action, CollectionAction, DispatchOutcome, Dispatcher,
    KeyedCollectionReducer, SlotValue, Store, StoreBuilder, StoreEvent, Subscription,
};
use serde_json::{Map, Value};
use tracing::debug;

pub use validator::{FieldError, FnValidator, Required, Validator};

/// Joins several messages for one field.
pub const ERROR_DELIMITER: &str = "; ";

/// Declares a form: its fields, their initial values, and its validators.
#[derive(Clone)]
pub struct FormSpec {
    name: String,
    fields: Vec<(String, Value)>,
    validators: Vec<Arc<dyn Validator>>,
}

impl FormSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            validators: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.fields.push((name.into(), initial.into()));
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values_slot(&self) -> String {
        format!("{}.values", self.name)
    }

    pub fn errors_slot(&self) -> String {
        format!("{}.errors", self.name)
    }

    fn initial_values(&self) -> Map<String, Value> {
        self.fields.iter().cloned().collect()
    }

    /// Add this form's slots to a store being built.
    pub fn install(&self, builder: StoreBuilder) -> StoreBuilder {
        builder
            .slot_with_reducer(
                self.values_slot(),
                Value::Object(self.initial_values()),
                KeyedCollectionReducer,
            )
            .slot_with_reducer(self.errors_slot(), Value::Object(Map::new()), KeyedCollectionReducer)
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// One entry per flagged field, in the order fields were first flagged.
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    fn add(&mut self, error: FieldError) {
        match self.errors.iter_mut().find(|e| e.field == error.field) {
            Some(existing) => {
                existing.message.push_str(ERROR_DELIMITER);
                existing.message.push_str(&error.message);
            }
            None => self.errors.push(error),
        }
    }
}

/// A form bound to a store that has its slots installed.
pub struct Form {
    spec: FormSpec,
    store: Store,
    values: Dispatcher,
}

impl Form {
    /// Fails with `SlotNotFound` if `spec` was never installed into `store`.
    ///
    /// Both slots must run [`KeyedCollectionReducer`]. [`FormSpec::install`]
    /// sets that up; a host declaring the slots by hand must attach it too,
    /// otherwise writes fall through to whatever reducer the slot has (the
    /// shallow-merge default would store the raw collection fields).
    pub fn bind(store: &Store, spec: FormSpec) -> keyslot_core::Result<Self> {
        let values = store.get_dispatcher(&spec.values_slot())?;
        store.get_dispatcher(&spec.errors_slot())?;
        Ok(Self {
            spec,
            store: store.clone(),
            values,
        })
    }

    pub fn spec(&self) -> &FormSpec {
        &self.spec
    }

    pub fn set_value(
        &self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> keyslot_core::Result<DispatchOutcome> {
        self.values
            .dispatch(CollectionAction::add(field, value).into())
    }

    pub fn value(&self, field: &str) -> keyslot_core::Result<Option<Value>> {
        Ok(self.values()?.get(field).cloned())
    }

    pub fn values(&self) -> keyslot_core::Result<SlotValue> {
        self.store.get_state(&self.spec.values_slot())
    }

    pub fn errors(&self) -> keyslot_core::Result<SlotValue> {
        self.store.get_state(&self.spec.errors_slot())
    }

    pub fn field_error(&self, field: &str) -> keyslot_core::Result<Option<String>> {
        Ok(self
            .errors()?
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    /// Listen for changes to one field's value.
    pub fn listen_field<F>(&self, field: &str, handler: F) -> Subscription
    where
        F: Fn(&StoreEvent) + 'static,
    {
        self.store
            .listen_for(&sub_event_topic(&self.spec.values_slot(), field), handler)
    }

    /// Listen for changes to one field's error message.
    pub fn listen_field_error<F>(&self, field: &str, handler: F) -> Subscription
    where
        F: Fn(&StoreEvent) + 'static,
    {
        self.store
            .listen_for(&sub_event_topic(&self.spec.errors_slot(), field), handler)
    }

    /// Restore every initial value and clear every error, as one batch.
    pub fn reset(&self) -> keyslot_core::Result<DispatchOutcome> {
        let values_slot = self.spec.values_slot();
        let errors_slot = self.spec.errors_slot();

        let mut entries: Vec<(String, Action)> = self
            .spec
            .fields
            .iter()
            .map(|(field, initial)| {
                (
                    values_slot.clone(),
                    CollectionAction::add(field.clone(), initial.clone()).into(),
                )
            })
            .collect();
        if let Some(errors) = self.errors()?.as_object() {
            entries.extend(errors.keys().map(|field| {
                (
                    errors_slot.clone(),
                    CollectionAction::remove(field.clone()).into(),
                )
            }));
        }

        self.store.get_batch_dispatcher().dispatch(entries)
    }

    /// Run every validator in order and store the result in the errors slot.
    ///
    /// Messages from several validators for one field are joined with
    /// [`ERROR_DELIMITER`]. The errors slot is updated by a single batch:
    /// changed messages are written, fields that are now clean are removed,
    /// and untouched fields produce no events.
    pub async fn validate(&self) -> Result<ValidationReport> {
        let values = self.values()?;
        let values = values.as_object().cloned().unwrap_or_default();

        let mut report = ValidationReport::default();
        for validator in &self.spec.validators {
            for error in validator.validate(&values).await? {
                report.add(error);
            }
        }

        let errors_slot = self.spec.errors_slot();
        let current = self.errors()?;
        let current = current.as_object().cloned().unwrap_or_default();

        let mut entries: Vec<(String, Action)> = Vec::new();
        for error in &report.errors {
            if current.get(&error.field).and_then(Value::as_str) != Some(error.message.as_str()) {
                entries.push((
                    errors_slot.clone(),
                    CollectionAction::add(error.field.clone(), error.message.clone()).into(),
                ));
            }
        }
        let flagged: HashSet<&str> = report.errors.iter().map(|e| e.field.as_str()).collect();
        for field in current.keys().filter(|field| !flagged.contains(field.as_str())) {
            entries.push((
                errors_slot.clone(),
                CollectionAction::remove(field.clone()).into(),
            ));
        }

        debug!(
            form = %self.spec.name,
            flagged = report.errors.len(),
            updates = entries.len(),
            "validated form"
        );
        if !entries.is_empty() {
            self.store.get_batch_dispatcher().dispatch(entries)?;
        }
        Ok(report)
    }
}
