//! The store engine: slot values, reducers, dispatch and commit.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::action::Action;
use crate::config::StoreConfig;
use crate::dispatch::{BatchDispatcher, DispatchOutcome, Dispatcher};
use crate::emitter::{sub_event_topic, Emitter, Subscription, POST_COMMIT_TOPIC, TOPIC_SEPARATOR};
use crate::error::{Result, StoreError};
use crate::event::{StoreEvent, Trigger};
use crate::hook::{CommitDecision, PendingCommit, PreCommitHook};
use crate::reducer::{MergeReducer, Reducer};
use crate::stamp::{EventStamp, StampClock};
use crate::state::{SlotValue, StateSnapshot};
use crate::sub_events::SubEvents;

/// Create a store from initial slot values and explicit reducers.
///
/// Slots missing from `reducers` get the shallow-merge reducer. Use
/// [`Store::builder`] for anything beyond the default config.
pub fn create_store<S, R>(initial_states: S, reducers: R) -> Result<Store>
where
    S: IntoIterator<Item = (String, Value)>,
    R: IntoIterator<Item = (String, Box<dyn Reducer>)>,
{
    let mut builder = Store::builder();
    for (slot_id, value) in initial_states {
        builder = builder.slot(slot_id, value);
    }
    for (slot_id, reducer) in reducers {
        builder = builder.boxed_reducer(slot_id, reducer);
    }
    builder.build()
}

/// Handle to a store. Clones share the same store.
///
/// The store is single-threaded: it is neither `Send` nor `Sync`, and every
/// reducer and listener runs to completion inside the dispatch call.
///
/// Listeners may read or dispatch again from inside their callback. A nested
/// dispatch commits and emits immediately, before the outer call finishes
/// emitting. During a batch this means slots later in the batch still
/// deliver their batch events afterwards, carrying the older stamp and a
/// `state` that may no longer be current. Listeners that need the latest
/// value should read it with [`Store::get_state`] rather than trust event
/// order across stamps.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

struct StoreInner {
    instance: Uuid,
    config: StoreConfig,
    states: RefCell<StateSnapshot>,
    reducers: RefCell<HashMap<String, Rc<dyn Reducer>>>,
    hooks: RefCell<Vec<Rc<dyn PreCommitHook>>>,
    last_sub_events: RefCell<HashMap<String, SubEvents>>,
    clock: StampClock,
    emitter: Rc<Emitter>,
}

/// One slot's share of a commit.
struct SlotCommit {
    slot_id: String,
    prev_state: SlotValue,
    state: SlotValue,
    sub_events: SubEvents,
}

/// Per-slot accumulator while a batch is folded.
#[derive(Default)]
struct Touched {
    actions: Vec<Action>,
    sub_events: SubEvents,
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Unique id of this store instance.
    pub fn instance_id(&self) -> Uuid {
        self.inner.instance
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Current value of a slot.
    ///
    /// Presence is checked by key, so `false`, `0` or `null` read back fine.
    pub fn get_state(&self, slot_id: &str) -> Result<SlotValue> {
        self.inner.states.borrow().require(slot_id).cloned()
    }

    /// Current value of a slot, decoded into `T`.
    pub fn get_state_as<T: DeserializeOwned>(&self, slot_id: &str) -> Result<T> {
        let value = self.get_state(slot_id)?;
        T::deserialize(&*value).map_err(|source| StoreError::Decode {
            slot_id: slot_id.to_owned(),
            source,
        })
    }

    /// Snapshot of every slot.
    pub fn get_states(&self) -> StateSnapshot {
        self.inner.states.borrow().clone()
    }

    pub fn has_slot(&self, slot_id: &str) -> bool {
        self.inner.states.borrow().contains(slot_id)
    }

    /// Replace the reducer of an existing slot.
    pub fn set_reducer(&self, slot_id: &str, reducer: impl Reducer + 'static) -> Result<()> {
        if !self.has_slot(slot_id) {
            return Err(StoreError::slot_not_found(slot_id));
        }
        self.inner
            .reducers
            .borrow_mut()
            .insert(slot_id.to_owned(), Rc::new(reducer));
        Ok(())
    }

    pub fn add_pre_commit_hook(&self, hook: impl PreCommitHook + 'static) {
        self.inner.hooks.borrow_mut().push(Rc::new(hook));
    }

    /// Dispatcher bound to one slot.
    pub fn get_dispatcher(&self, slot_id: &str) -> Result<Dispatcher> {
        if !self.has_slot(slot_id) {
            return Err(StoreError::slot_not_found(slot_id));
        }
        Ok(Dispatcher::new(self.clone(), slot_id.to_owned()))
    }

    pub fn get_batch_dispatcher(&self) -> BatchDispatcher {
        BatchDispatcher::new(self.clone())
    }

    /// Register `handler` on an exact topic: a slot id, `slot/key`, or
    /// [`POST_COMMIT_TOPIC`].
    pub fn listen_for<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn(&StoreEvent) + 'static,
    {
        self.inner.emitter.listen(topic, Rc::new(handler))
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.inner.emitter.listener_count(topic)
    }

    /// Sub-events of the slot's latest commit, when retained by config.
    pub fn last_sub_events(&self, slot_id: &str) -> Option<SubEvents> {
        self.inner.last_sub_events.borrow().get(slot_id).cloned()
    }

    fn reducer_for(&self, slot_id: &str) -> Result<Rc<dyn Reducer>> {
        if !self.has_slot(slot_id) {
            return Err(StoreError::slot_not_found(slot_id));
        }
        if let Some(reducer) = self.inner.reducers.borrow().get(slot_id) {
            return Ok(Rc::clone(reducer));
        }
        if self.inner.config.implicit_merge_reducer {
            return Ok(Rc::new(MergeReducer));
        }
        Err(StoreError::MissingReducer {
            slot_id: slot_id.to_owned(),
        })
    }

    fn label(&self) -> &str {
        self.inner.config.label.as_deref().unwrap_or("store")
    }

    pub(crate) fn dispatch_single(&self, slot_id: &str, action: Action) -> Result<DispatchOutcome> {
        let reducer = self.reducer_for(slot_id)?;
        let states = self.get_states();
        let prev_state = Arc::clone(states.require(slot_id)?);

        let reduction = reducer
            .reduce(slot_id, &action, &states)
            .map_err(|source| StoreError::Reducer {
                slot_id: slot_id.to_owned(),
                source,
            })?;

        if reduction.is_unchanged(&prev_state) {
            trace!(store = self.label(), slot_id, kind = %action.kind, "reducer returned the current value");
            return Ok(DispatchOutcome::Unchanged);
        }

        let mut next_states = states.clone();
        next_states.insert(slot_id, Arc::clone(&reduction.value));
        let slot_ids = [slot_id.to_owned()];
        let pending = PendingCommit {
            slot_ids: &slot_ids,
            actions: std::slice::from_ref(&action),
            prev_states: &states,
            next_states: &next_states,
            batch: false,
        };
        if !self.run_hooks(&pending) {
            return Ok(DispatchOutcome::Aborted);
        }

        let commit = SlotCommit {
            slot_id: slot_id.to_owned(),
            prev_state,
            state: reduction.value,
            sub_events: reduction.sub_events,
        };
        let stamp = self.commit(&[&commit]);
        debug!(
            store = self.label(),
            instance = %self.inner.instance,
            slot_id,
            kind = %action.kind,
            seq = stamp.seq,
            "committed dispatch"
        );

        self.emit_commit(stamp, commit, Trigger::Single { action });
        Ok(DispatchOutcome::Committed(stamp))
    }

    pub(crate) fn dispatch_batch(&self, entries: Vec<(String, Action)>) -> Result<DispatchOutcome> {
        let prev_states = self.get_states();
        let mut working = prev_states.clone();
        let mut first_seen: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut touched: HashMap<String, Touched> = HashMap::new();
        let mut applied: Vec<Action> = Vec::new();

        // A fold: each entry sees the working copy left by the ones before it.
        for (slot_id, action) in entries {
            let reducer = self.reducer_for(&slot_id)?;
            if seen.insert(slot_id.clone()) {
                first_seen.push(slot_id.clone());
            }

            let current = Arc::clone(working.require(&slot_id)?);
            let reduction = reducer
                .reduce(&slot_id, &action, &working)
                .map_err(|source| StoreError::Reducer {
                    slot_id: slot_id.clone(),
                    source,
                })?;
            if reduction.is_unchanged(&current) {
                trace!(store = self.label(), slot_id = %slot_id, kind = %action.kind, "batch entry left slot unchanged");
                continue;
            }

            working.insert(slot_id.clone(), reduction.value);
            applied.push(action.clone());
            let slot = touched.entry(slot_id).or_default();
            slot.actions.push(action);
            slot.sub_events.merge(reduction.sub_events);
        }

        let slot_ids: Vec<String> = first_seen
            .into_iter()
            .filter(|slot_id| touched.contains_key(slot_id))
            .collect();
        if slot_ids.is_empty() {
            return Ok(DispatchOutcome::Unchanged);
        }

        let pending = PendingCommit {
            slot_ids: &slot_ids,
            actions: &applied,
            prev_states: &prev_states,
            next_states: &working,
            batch: true,
        };
        if !self.run_hooks(&pending) {
            return Ok(DispatchOutcome::Aborted);
        }

        let mut commits = Vec::with_capacity(slot_ids.len());
        for slot_id in &slot_ids {
            let Some(slot) = touched.remove(slot_id) else {
                continue;
            };
            let commit = SlotCommit {
                slot_id: slot_id.clone(),
                prev_state: Arc::clone(prev_states.require(slot_id)?),
                state: Arc::clone(working.require(slot_id)?),
                sub_events: slot.sub_events,
            };
            commits.push((commit, slot.actions));
        }

        let stamp = {
            let views: Vec<&SlotCommit> = commits.iter().map(|(commit, _)| commit).collect();
            self.commit(&views)
        };
        debug!(
            store = self.label(),
            instance = %self.inner.instance,
            slots = ?slot_ids,
            actions = applied.len(),
            seq = stamp.seq,
            "committed batch"
        );

        let batch_slot_ids: Rc<[String]> = slot_ids.into();
        let prev_states = Rc::new(prev_states);
        for (commit, actions) in commits {
            let trigger = Trigger::Batch {
                slot_ids: Rc::clone(&batch_slot_ids),
                actions: actions.into(),
                prev_states: Rc::clone(&prev_states),
            };
            self.emit_commit(stamp, commit, trigger);
        }
        Ok(DispatchOutcome::Committed(stamp))
    }

    fn run_hooks(&self, pending: &PendingCommit<'_>) -> bool {
        let hooks: Vec<Rc<dyn PreCommitHook>> = self.inner.hooks.borrow().clone();
        for (index, hook) in hooks.iter().enumerate() {
            if hook.before_commit(pending) == CommitDecision::Abort {
                warn!(
                    store = self.label(),
                    slots = ?pending.slot_ids,
                    hook = index,
                    "pre-commit hook aborted commit"
                );
                return false;
            }
        }
        true
    }

    /// Apply the new values, remember sub-events, and take a stamp.
    fn commit(&self, commits: &[&SlotCommit]) -> EventStamp {
        {
            let mut states = self.inner.states.borrow_mut();
            for commit in commits {
                states.insert(commit.slot_id.clone(), Arc::clone(&commit.state));
            }
        }
        if self.inner.config.retain_last_sub_events {
            let mut last = self.inner.last_sub_events.borrow_mut();
            for commit in commits {
                last.insert(commit.slot_id.clone(), commit.sub_events.clone());
            }
        }
        self.inner.clock.next()
    }

    /// Key events first, then the slot event (unless suppressed), then
    /// `postCommit`.
    fn emit_commit(&self, stamp: EventStamp, commit: SlotCommit, trigger: Trigger) {
        let event = StoreEvent {
            stamp,
            slot_id: commit.slot_id,
            sub_key: None,
            change: None,
            prev_state: commit.prev_state,
            state: commit.state,
            sub_events: commit.sub_events,
            trigger,
        };
        let emitter = &self.inner.emitter;

        for (key, change) in event.sub_events.iter() {
            let topic = sub_event_topic(&event.slot_id, key);
            let delivered = emitter.emit(&topic, &event.for_sub_key(key, change));
            trace!(store = self.label(), topic = %topic, delivered, "emitted sub-event");
        }

        if event.sub_events.emits_slot_event() {
            let delivered = emitter.emit(&event.slot_id, &event);
            trace!(store = self.label(), topic = %event.slot_id, delivered, "emitted slot event");
        } else {
            trace!(store = self.label(), slot_id = %event.slot_id, "slot event suppressed by sub-events");
        }

        emitter.emit(POST_COMMIT_TOPIC, &event);
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states = self.inner.states.borrow();
        let mut slots: Vec<&str> = states.slot_ids().collect();
        slots.sort_unstable();
        f.debug_struct("Store")
            .field("instance", &self.inner.instance)
            .field("label", &self.inner.config.label)
            .field("slots", &slots)
            .finish()
    }
}

/// Assembles a [`Store`].
#[derive(Default)]
pub struct StoreBuilder {
    config: StoreConfig,
    slots: Vec<(String, Value)>,
    reducers: Vec<(String, Rc<dyn Reducer>)>,
    hooks: Vec<Rc<dyn PreCommitHook>>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare a slot with its initial value.
    pub fn slot(mut self, slot_id: impl Into<String>, initial: impl Into<Value>) -> Self {
        self.slots.push((slot_id.into(), initial.into()));
        self
    }

    /// Attach a reducer to a declared slot.
    pub fn reducer(mut self, slot_id: impl Into<String>, reducer: impl Reducer + 'static) -> Self {
        self.reducers.push((slot_id.into(), Rc::new(reducer)));
        self
    }

    pub fn boxed_reducer(mut self, slot_id: impl Into<String>, reducer: Box<dyn Reducer>) -> Self {
        self.reducers.push((slot_id.into(), Rc::from(reducer)));
        self
    }

    pub fn slot_with_reducer(
        self,
        slot_id: impl Into<String>,
        initial: impl Into<Value>,
        reducer: impl Reducer + 'static,
    ) -> Self {
        let slot_id = slot_id.into();
        self.slot(slot_id.clone(), initial).reducer(slot_id, reducer)
    }

    pub fn pre_commit_hook(mut self, hook: impl PreCommitHook + 'static) -> Self {
        self.hooks.push(Rc::new(hook));
        self
    }

    pub fn build(self) -> Result<Store> {
        let mut states = StateSnapshot::new();
        for (slot_id, initial) in self.slots {
            validate_slot_id(&slot_id)?;
            if states.contains(&slot_id) {
                return Err(StoreError::InvalidSlotId {
                    slot_id,
                    reason: "declared more than once",
                });
            }
            states.insert(slot_id, Arc::new(initial));
        }

        let mut reducers = HashMap::new();
        for (slot_id, reducer) in self.reducers {
            if !states.contains(&slot_id) {
                return Err(StoreError::slot_not_found(slot_id));
            }
            reducers.insert(slot_id, reducer);
        }

        let store = Store {
            inner: Rc::new(StoreInner {
                instance: Uuid::new_v4(),
                config: self.config,
                states: RefCell::new(states),
                reducers: RefCell::new(reducers),
                hooks: RefCell::new(self.hooks),
                last_sub_events: RefCell::new(HashMap::new()),
                clock: StampClock::default(),
                emitter: Rc::new(Emitter::default()),
            }),
        };
        debug!(store = store.label(), instance = %store.inner.instance, slots = store.inner.states.borrow().len(), "store created");
        Ok(store)
    }
}

fn validate_slot_id(slot_id: &str) -> Result<()> {
    let reason = if slot_id.is_empty() {
        "empty"
    } else if slot_id.contains(TOPIC_SEPARATOR) {
        "contains the topic separator"
    } else if slot_id == POST_COMMIT_TOPIC {
        "collides with the post-commit topic"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidSlotId {
        slot_id: slot_id.to_owned(),
        reason,
    })
}
