//! Pre-commit hooks.
//!
//! Hooks run after every reducer of a dispatch or batch has produced its
//! candidate value and before anything is committed. An abort leaves the
//! store untouched: no state change, no events, no stamp consumed.

use crate::action::Action;
use crate::state::StateSnapshot;

/// A commit that has been computed but not yet applied.
#[derive(Debug)]
pub struct PendingCommit<'a> {
    /// Slots that would change, in first-appearance order.
    pub slot_ids: &'a [String],
    /// Actions that produced the changes, in input order.
    pub actions: &'a [Action],
    pub prev_states: &'a StateSnapshot,
    pub next_states: &'a StateSnapshot,
    pub batch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    Proceed,
    Abort,
}

pub trait PreCommitHook {
    fn before_commit(&self, pending: &PendingCommit<'_>) -> CommitDecision;
}

impl<F> PreCommitHook for F
where
    F: Fn(&PendingCommit<'_>) -> CommitDecision,
{
    fn before_commit(&self, pending: &PendingCommit<'_>) -> CommitDecision {
        self(pending)
    }
}
