//! Store configuration.

use serde::Deserialize;

/// Knobs for one store. Every field has a default, so a host can load this
/// from a partial JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Give slots without a reducer the shallow-merge reducer. When off,
    /// dispatching to such a slot fails with `MissingReducer`.
    pub implicit_merge_reducer: bool,
    /// Keep each slot's latest sub-events readable via
    /// [`Store::last_sub_events`](crate::Store::last_sub_events).
    pub retain_last_sub_events: bool,
    /// Attached to log output.
    pub label: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            implicit_merge_reducer: true,
            retain_last_sub_events: true,
            label: None,
        }
    }
}

impl StoreConfig {
    pub fn strict() -> Self {
        Self {
            implicit_merge_reducer: false,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
