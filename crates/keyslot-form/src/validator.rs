//! Validators.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

/// A message about one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Checks the form's values and reports problems per field.
///
/// Returning messages is the normal way to flag a field; `Err` means the
/// validator itself could not run and aborts the whole validation pass.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, values: &Map<String, Value>) -> Result<Vec<FieldError>>;
}

type ValidateFn =
    dyn Fn(Map<String, Value>) -> BoxFuture<'static, Result<Vec<FieldError>>> + Send + Sync;

/// Validator backed by a closure returning a boxed future.
///
/// ```ignore
/// use futures::FutureExt;
///
/// let unique = FnValidator::new(|values| {
///     async move {
///         let taken = lookup(values.get("email")).await?;
///         Ok(if taken { vec![FieldError::new("email", "already registered")] } else { vec![] })
///     }
///     .boxed()
/// });
/// ```
pub struct FnValidator {
    validate: Box<ValidateFn>,
}

impl FnValidator {
    pub fn new<F>(validate: F) -> Self
    where
        F: Fn(Map<String, Value>) -> BoxFuture<'static, Result<Vec<FieldError>>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            validate: Box::new(validate),
        }
    }
}

#[async_trait]
impl Validator for FnValidator {
    async fn validate(&self, values: &Map<String, Value>) -> Result<Vec<FieldError>> {
        (self.validate)(values.clone()).await
    }
}

/// Flags a field that is missing, null, blank, or an empty list.
#[derive(Debug, Clone)]
pub struct Required {
    field: String,
    message: String,
}

impl Required {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: "required".to_owned(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

#[async_trait]
impl Validator for Required {
    async fn validate(&self, values: &Map<String, Value>) -> Result<Vec<FieldError>> {
        let missing = match values.get(&self.field) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        };
        Ok(if missing {
            vec![FieldError::new(&self.field, &self.message)]
        } else {
            Vec::new()
        })
    }
}
