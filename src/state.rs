//! The handler's precheck state machine: a map of named steps plus the
//! synchronization events that gate retrieval, ranking, and fast-track.
//!
//! Python's `asyncio.Event` is one-shot (`set`/`wait`/`is_set`, no
//! `clear`) for three of these signals, and settable-then-clearable for
//! `connection_alive`. [`Event`] models the former; [`SettableEvent`]
//! the latter — both built on a small mutex + `Notify` pair since `tokio`
//! has no native event primitive.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::Notify;

/// A one-shot, fire-once-and-stay-fired signal.
#[derive(Debug, Default)]
pub struct Event {
    fired: Mutex<bool>,
    notify: Notify,
}

impl Event {
    /// A new, unset event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the event. Idempotent.
    pub fn set(&self) {
        let mut guard = self.fired.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = true;
        drop(guard);
        self.notify.notify_waiters();
    }

    /// Whether the event has fired.
    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.fired.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Waits until the event fires. Returns immediately if already fired.
    pub async fn wait(&self) {
        loop {
            if self.is_set() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

/// A settable, clearable signal — used for `connection_alive`, which starts
/// set and is cleared on the first I/O failure.
#[derive(Debug)]
pub struct SettableEvent {
    inner: Event,
}

impl SettableEvent {
    /// A new event, initially set or cleared per `initial`.
    #[must_use]
    pub fn new(initial: bool) -> Self {
        let event = Event::new();
        if initial {
            event.set();
        }
        Self { inner: event }
    }

    /// Sets (marks alive).
    pub fn set(&self) {
        self.inner.set();
    }

    /// Clears (marks dead). Once cleared, a fresh wait will block again
    /// until `set` is called.
    pub fn clear(&self) {
        let mut guard = self
            .inner
            .fired
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = false;
    }

    /// Whether currently set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.is_set()
    }
}

/// A precheck step's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Registered but not yet complete.
    Initial,
    /// Complete (success or swallowed failure — the step still ran).
    Done,
}

/// The name used for the decontextualization step everywhere it's checked
/// against specially (`wait_for_decontextualization`, the distinct
/// `decon_done` event).
pub const DECON_STEP: &str = "Decon";

/// Precheck step bookkeeping plus the cross-task synchronization events.
#[derive(Debug)]
pub struct HandlerState {
    precheck_step_state: Mutex<HashMap<String, StepState>>,
    /// Fires once every registered step is `Done`, or when force-completed.
    pub pre_checks_done: Event,
    /// Fires once retrieval has produced `final_retrieved_items`.
    pub retrieval_done: Event,
    /// Fires if a decontextualizer determines fast-track must be abandoned.
    pub abort_fast_track: Event,
    /// Settable/clearable: whether the client connection is still usable.
    pub connection_alive: SettableEvent,
    /// Fires specifically when the `"Decon"` step completes.
    pub decon_done: Event,
}

impl Default for HandlerState {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerState {
    /// A fresh state machine: no steps registered, connection alive.
    #[must_use]
    pub fn new() -> Self {
        Self {
            precheck_step_state: Mutex::new(HashMap::new()),
            pre_checks_done: Event::new(),
            retrieval_done: Event::new(),
            abort_fast_track: Event::new(),
            connection_alive: SettableEvent::new(true),
            decon_done: Event::new(),
        }
    }

    /// Registers a precheck step as pending. Synchronous — called from the
    /// step's constructor, before any `.await`.
    pub fn start_step(&self, name: &str) {
        let mut steps = self
            .precheck_step_state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        steps.insert(name.to_string(), StepState::Initial);
    }

    /// Marks a step done. If this was the `"Decon"` step, also fires
    /// `decon_done`. If every registered step is now `Done`, fires
    /// `pre_checks_done`.
    pub fn step_done(&self, name: &str) {
        let all_done = {
            let mut steps = self
                .precheck_step_state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            steps.insert(name.to_string(), StepState::Done);
            steps.values().all(|s| *s == StepState::Done)
        };
        if name == DECON_STEP {
            self.decon_done.set();
        }
        if all_done {
            self.pre_checks_done.set();
        }
    }

    /// Force-completes the precheck barrier regardless of individual step
    /// state — the `finally`-equivalent cleanup the orchestrator runs after
    /// its concurrent precheck fan-out, so a step that panicked or never
    /// ran can't deadlock the barrier.
    pub fn force_pre_checks_done(&self) {
        self.pre_checks_done.set();
    }

    /// Waits for `pre_checks_done`, then reports whether ranking should
    /// proceed: `false` if the query is already done or the connection
    /// has died.
    pub async fn pre_check_approval(&self, query_done: bool) -> bool {
        self.pre_checks_done.wait().await;
        if query_done {
            return false;
        }
        self.connection_alive.is_set()
    }

    /// Waits for the `"Decon"` step specifically, then reports whether it
    /// actually reached `Done` (as opposed to the wait being satisfied some
    /// other way).
    pub async fn wait_for_decontextualization(&self) -> bool {
        self.decon_done.wait().await;
        self.is_decontextualization_done()
    }

    /// Whether the `"Decon"` step has reached `Done`.
    #[must_use]
    pub fn is_decontextualization_done(&self) -> bool {
        let steps = self
            .precheck_step_state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        steps.get(DECON_STEP) == Some(&StepState::Done)
    }

    /// A snapshot of every registered step's name and whether it's `Done`,
    /// for diagnostics.
    #[must_use]
    pub fn step_states(&self) -> Vec<(String, bool)> {
        self.precheck_step_state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(name, state)| (name.clone(), matches!(state, StepState::Done)))
            .collect()
    }
}
