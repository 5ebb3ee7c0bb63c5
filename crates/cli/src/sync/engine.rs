// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync engine: a persistent FIFO of actions drained against the backend.
//!
//! One worker task per engine runs processing passes. A pass picks the first
//! queued action whose patient holds no lock, sends it, and either removes it
//! (success) or leaves it in place with its patient locked (failure). Actions
//! for different patients never block each other; actions for the same
//! patient are sent in queue order, one at a time.
//!
//! ```text
//!   enqueue ──► queue (Mutex) ──► store.save()
//!                  │
//!   wake ────► worker ──► process_next() ──► RemoteExecutor
//!                  ▲
//!   monitor ───────┘ (offline → online releases stalled locks)
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use cq_core::{
    Action, ActionId, ConnectivityMonitor, Listeners, PatientId, QueueStore, SubscriptionId,
    SyncStatus,
};
use futures_util::FutureExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::executor::{RemoteExecutor, RemoteRequest};
use crate::error::{Error, Result};

/// Tuning for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between consecutive passes while draining.
    pub throttle: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            throttle: Duration::from_secs(1),
        }
    }
}

/// Something observers may want to redraw for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Enqueued(ActionId),
    /// The backend applied the action and it left the queue.
    Completed(ActionId),
    /// The attempt failed; the action stays queued and its patient is stalled.
    Retained { id: ActionId, error: String },
    Discarded(ActionId),
    /// The whole queue was dropped; carries how many actions it held.
    Cleared(usize),
    /// Stalled patients that may be retried again.
    LocksReleased(Vec<PatientId>),
    /// The in-memory queue changed but could not be written to the store.
    PersistFailed,
    StatusChanged(SyncStatus),
}

/// Result of one processing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing attempted: a pass was already running, the backend is
    /// unreachable, or the queue is empty.
    Skipped,
    /// Every queued action belongs to a locked patient.
    NoEligible,
    Completed(ActionId),
    Retained(ActionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatientLock {
    /// A remote call for this action is running.
    InFlight(ActionId),
    /// This action failed and is the patient's unresolved head.
    Stalled(ActionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Syncing,
    /// A pass panicked. Cleared by the next pass.
    Failed,
}

struct EngineState {
    queue: Vec<Action>,
    locks: HashMap<PatientId, PatientLock>,
    phase: Phase,
    initialized: bool,
    /// Last connectivity value delivered by the monitor.
    online: Option<bool>,
    /// Last status sent to observers.
    reported: SyncStatus,
    /// A pass was turned away while another ran; the running pass wakes
    /// the worker when it ends.
    rerun: bool,
}

impl EngineState {
    fn first_eligible(&self) -> Option<&Action> {
        self.queue
            .iter()
            .find(|action| !self.locks.contains_key(&action.patient_id))
    }

    fn release_stalled(&mut self) -> Vec<PatientId> {
        let mut released: Vec<PatientId> = self
            .locks
            .iter()
            .filter(|(_, lock)| matches!(lock, PatientLock::Stalled(_)))
            .map(|(patient, _)| patient.clone())
            .collect();
        for patient in &released {
            self.locks.remove(patient);
        }
        released.sort();
        released
    }

    /// Removes the lock on `patient` only if it is still held for `id`.
    fn unlock_if_held_for(&mut self, patient: &PatientId, id: &ActionId) {
        let held = match self.locks.get(patient) {
            Some(PatientLock::InFlight(held) | PatientLock::Stalled(held)) => held == id,
            None => false,
        };
        if held {
            self.locks.remove(patient);
        }
    }
}

fn effective_status(phase: Phase, connected: bool) -> SyncStatus {
    if !connected {
        return SyncStatus::Offline;
    }
    match phase {
        Phase::Idle => SyncStatus::Idle,
        Phase::Syncing => SyncStatus::Syncing,
        Phase::Failed => SyncStatus::Error,
    }
}

struct Shared<E, S> {
    executor: E,
    store: S,
    monitor: Arc<ConnectivityMonitor>,
    config: EngineConfig,
    state: Mutex<EngineState>,
    listeners: Listeners<EngineEvent>,
    /// Held by the worker too, so it can wait without keeping the engine alive.
    wake: Arc<Notify>,
    /// Fired after every batch of events, for `settled()`.
    changed: Notify,
    cancel: CancellationToken,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl<E: RemoteExecutor, S: QueueStore> Shared<E, S> {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a status change event if what observers last saw is stale.
    fn refresh_status(&self, state: &mut EngineState, events: &mut Vec<EngineEvent>) {
        let status = effective_status(state.phase, self.monitor.is_connected());
        if status != state.reported {
            state.reported = status;
            events.push(EngineEvent::StatusChanged(status));
        }
    }

    fn emit(&self, events: Vec<EngineEvent>) {
        for event in &events {
            self.listeners.notify(event);
        }
        self.changed.notify_waiters();
    }

    fn wake_if_connected(&self) {
        if self.monitor.is_connected() {
            self.wake.notify_one();
        }
    }

    fn persist(&self, state: &EngineState, events: &mut Vec<EngineEvent>) -> bool {
        let durable = self.store.save(&state.queue);
        if !durable {
            events.push(EngineEvent::PersistFailed);
        }
        durable
    }

    async fn process_next(&self) -> PassOutcome {
        let action = {
            let mut events = Vec::new();
            let mut guard = self.lock_state();
            let state = &mut *guard;

            if state.phase == Phase::Syncing {
                debug!("pass skipped: another pass is running");
                state.rerun = true;
                return PassOutcome::Skipped;
            }
            if state.queue.is_empty() || !self.monitor.is_connected() {
                if state.queue.is_empty() {
                    state.phase = Phase::Idle;
                }
                self.refresh_status(state, &mut events);
                drop(guard);
                self.emit(events);
                return PassOutcome::Skipped;
            }

            state.phase = Phase::Syncing;
            self.refresh_status(state, &mut events);

            let Some(action) = state.first_eligible().cloned() else {
                debug!(
                    "pass found nothing eligible: {} queued, {} patients locked",
                    state.queue.len(),
                    state.locks.len()
                );
                state.phase = Phase::Idle;
                self.refresh_status(state, &mut events);
                drop(guard);
                self.emit(events);
                return PassOutcome::NoEligible;
            };

            state.locks.insert(
                action.patient_id.clone(),
                PatientLock::InFlight(action.id.clone()),
            );
            if let Some(dependency) = &action.depends_on {
                if state.queue.iter().any(|queued| &queued.id == dependency) {
                    debug!(
                        "sending {} before its dependency {}, which is still queued",
                        action.id, dependency
                    );
                }
            }
            drop(guard);
            self.emit(events);
            action
        };

        let result = match RemoteRequest::from_action(&action) {
            Ok(request) => self.executor.execute(request).await,
            Err(e) => Err(e),
        };

        let mut events = Vec::new();
        let mut guard = self.lock_state();
        let state = &mut *guard;
        let outcome = match result {
            Ok(()) => {
                if let Some(pos) = state.queue.iter().position(|queued| queued.id == action.id) {
                    state.queue.remove(pos);
                    self.persist(state, &mut events);
                }
                state.unlock_if_held_for(&action.patient_id, &action.id);
                info!(
                    "synced {} {} for patient {}",
                    action.kind(),
                    action.id,
                    action.patient_id
                );
                events.push(EngineEvent::Completed(action.id.clone()));
                PassOutcome::Completed(action.id)
            }
            Err(e) => {
                let attempts = match state.queue.iter_mut().find(|queued| queued.id == action.id) {
                    Some(queued) => {
                        queued.retry_count += 1;
                        Some(queued.retry_count)
                    }
                    None => None,
                };
                match attempts {
                    Some(attempts) => {
                        state.locks.insert(
                            action.patient_id.clone(),
                            PatientLock::Stalled(action.id.clone()),
                        );
                        warn!(
                            "failed to sync {} {} for patient {} (attempt {}): {}",
                            action.kind(),
                            action.id,
                            action.patient_id,
                            attempts,
                            e
                        );
                    }
                    None => {
                        state.unlock_if_held_for(&action.patient_id, &action.id);
                        debug!("{} failed after it left the queue: {}", action.id, e);
                    }
                }
                events.push(EngineEvent::Retained {
                    id: action.id.clone(),
                    error: e.to_string(),
                });
                PassOutcome::Retained(action.id)
            }
        };
        state.phase = Phase::Idle;
        self.refresh_status(state, &mut events);
        let rerun = std::mem::take(&mut state.rerun) && state.first_eligible().is_some();
        drop(guard);
        self.emit(events);
        if rerun {
            self.wake_if_connected();
        }
        outcome
    }

    fn has_more_work(&self) -> bool {
        !self.lock_state().queue.is_empty() && self.monitor.is_connected()
    }

    /// A pass panicked: whatever it had in flight is now stalled.
    fn recover_from_panic(&self) {
        let mut events = Vec::new();
        let mut guard = self.lock_state();
        let state = &mut *guard;
        for lock in state.locks.values_mut() {
            if let PatientLock::InFlight(id) = lock {
                *lock = PatientLock::Stalled(id.clone());
            }
        }
        state.phase = Phase::Failed;
        self.refresh_status(state, &mut events);
        drop(guard);
        self.emit(events);
    }

    fn on_connectivity(&self, online: bool) {
        let mut events = Vec::new();
        {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let previous = state.online.replace(online);
            if previous == Some(false) && online {
                let released = state.release_stalled();
                if !released.is_empty() {
                    info!("back online, retrying {} stalled patients", released.len());
                    events.push(EngineEvent::LocksReleased(released));
                }
            }
            self.refresh_status(state, &mut events);
        }
        self.emit(events);
        if online {
            self.wake.notify_one();
        }
    }

    /// Drains the queue until there is nothing left to try.
    async fn drain(&self, cancel: &CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match AssertUnwindSafe(self.process_next()).catch_unwind().await {
                Ok(PassOutcome::Skipped | PassOutcome::NoEligible) => break,
                Ok(_) => {}
                Err(panic) => {
                    error!("sync pass panicked: {}", panic_message(panic.as_ref()));
                    self.recover_from_panic();
                    break;
                }
            }
            if !self.has_more_work() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.throttle) => {}
            }
        }
    }

    fn is_settled(&self) -> bool {
        let state = self.lock_state();
        match state.phase {
            Phase::Syncing => false,
            Phase::Failed => true,
            Phase::Idle => {
                state.queue.is_empty()
                    || !self.monitor.is_connected()
                    || state.first_eligible().is_none()
            }
        }
    }

    fn detach(&self) {
        self.cancel.cancel();
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = subscription {
            self.monitor.unsubscribe(id);
        }
    }
}

impl<E, S> Drop for Shared<E, S> {
    fn drop(&mut self) {
        self.cancel.cancel();
        let subscription = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = subscription {
            self.monitor.unsubscribe(id);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_worker<E, S>(engine: Weak<Shared<E, S>>, wake: Arc<Notify>, cancel: CancellationToken)
where
    E: RemoteExecutor,
    S: QueueStore,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = wake.notified() => {}
        }
        let Some(shared) = engine.upgrade() else {
            break;
        };
        if cancel.is_cancelled() {
            break;
        }
        shared.drain(&cancel).await;
    }
    debug!("sync worker stopped");
}

/// Handle to a sync engine. Clones share the same queue and worker.
pub struct SyncEngine<E, S> {
    shared: Arc<Shared<E, S>>,
}

impl<E, S> Clone for SyncEngine<E, S> {
    fn clone(&self) -> Self {
        SyncEngine {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E, S> SyncEngine<E, S>
where
    E: RemoteExecutor + 'static,
    S: QueueStore + 'static,
{
    /// Creates an engine. Nothing is loaded or sent until [`initialize`](Self::initialize).
    pub fn new(
        executor: E,
        store: S,
        monitor: Arc<ConnectivityMonitor>,
        config: EngineConfig,
    ) -> Self {
        let reported = effective_status(Phase::Idle, monitor.is_connected());
        SyncEngine {
            shared: Arc::new(Shared {
                executor,
                store,
                monitor,
                config,
                state: Mutex::new(EngineState {
                    queue: Vec::new(),
                    locks: HashMap::new(),
                    phase: Phase::Idle,
                    initialized: false,
                    online: None,
                    reported,
                    rerun: false,
                }),
                listeners: Listeners::new(),
                wake: Arc::new(Notify::new()),
                changed: Notify::new(),
                cancel: CancellationToken::new(),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Loads the stored queue, starts the worker and starts following the
    /// connectivity monitor. Calling it again does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn initialize(&self) -> Result<()> {
        let shared = &self.shared;
        {
            let mut state = shared.lock_state();
            if state.initialized {
                return Ok(());
            }
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
            state.queue = shared.store.load();
            state.initialized = true;
            debug!("loaded {} queued actions", state.queue.len());
            runtime.spawn(run_worker(
                Arc::downgrade(shared),
                Arc::clone(&shared.wake),
                shared.cancel.clone(),
            ));
        }

        // The monitor reports the current state right away, which also
        // triggers the first pass when online.
        let engine = Arc::downgrade(shared);
        let id = shared.monitor.subscribe(move |online| {
            if let Some(shared) = engine.upgrade() {
                shared.on_connectivity(online);
            }
        });
        *shared
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);
        Ok(())
    }

    /// Appends an action and persists the queue before returning.
    ///
    /// Returns `Ok(false)` if the action is queued in memory but the store
    /// rejected the write; it will be written again with the next change.
    pub fn enqueue(&self, action: Action) -> Result<bool> {
        action.validate()?;
        let shared = &self.shared;
        let mut events = Vec::new();
        let durable = {
            let mut state = shared.lock_state();
            if !state.initialized {
                return Err(Error::EngineNotStarted);
            }
            if state.queue.iter().any(|queued| queued.id == action.id) {
                return Err(Error::DuplicateAction(action.id.to_string()));
            }
            debug!(
                "queued {} {} for patient {}",
                action.kind(),
                action.id,
                action.patient_id
            );
            events.push(EngineEvent::Enqueued(action.id.clone()));
            state.queue.push(action);
            shared.persist(&state, &mut events)
        };
        shared.emit(events);
        shared.wake_if_connected();
        Ok(durable)
    }

    pub fn queue_length(&self) -> usize {
        self.shared.lock_state().queue.len()
    }

    /// `Offline` whenever the monitor says so, otherwise what the worker is doing.
    pub fn status(&self) -> SyncStatus {
        let state = self.shared.lock_state();
        effective_status(state.phase, self.shared.monitor.is_connected())
    }

    /// Queued actions for one patient, in queue order.
    pub fn pending_actions_for(&self, patient: &PatientId) -> Vec<Action> {
        self.shared
            .lock_state()
            .queue
            .iter()
            .filter(|action| &action.patient_id == patient)
            .cloned()
            .collect()
    }

    /// The whole queue, in order.
    pub fn snapshot(&self) -> Vec<Action> {
        self.shared.lock_state().queue.clone()
    }

    pub fn stalled_patients(&self) -> Vec<PatientId> {
        let state = self.shared.lock_state();
        let mut stalled: Vec<PatientId> = state
            .locks
            .iter()
            .filter(|(_, lock)| matches!(lock, PatientLock::Stalled(_)))
            .map(|(patient, _)| patient.clone())
            .collect();
        stalled.sort();
        stalled
    }

    /// Registers an observer. Observers run outside the engine's lock and
    /// may call back into the engine.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.add(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.listeners.remove(id)
    }

    /// Releases every stalled patient so its head action is tried again.
    /// Returns how many patients were released.
    pub fn retry_stalled(&self) -> usize {
        let shared = &self.shared;
        let mut events = Vec::new();
        let released = {
            let mut state = shared.lock_state();
            let released = state.release_stalled();
            let count = released.len();
            if count > 0 {
                events.push(EngineEvent::LocksReleased(released));
            }
            count
        };
        shared.emit(events);
        if released > 0 {
            shared.wake_if_connected();
        }
        released
    }

    /// Removes one queued action that is not currently being sent.
    pub fn discard(&self, id: &ActionId) -> Result<Action> {
        let shared = &self.shared;
        let mut events = Vec::new();
        let removed = {
            let mut guard = shared.lock_state();
            let state = &mut *guard;
            let pos = state
                .queue
                .iter()
                .position(|queued| &queued.id == id)
                .ok_or_else(|| Error::ActionNotFound(id.to_string()))?;
            let patient = state.queue[pos].patient_id.clone();
            match state.locks.get(&patient) {
                Some(PatientLock::InFlight(held)) if held == id => {
                    return Err(Error::ActionInFlight(id.to_string()));
                }
                Some(PatientLock::Stalled(held)) if held == id => {
                    state.locks.remove(&patient);
                    events.push(EngineEvent::LocksReleased(vec![patient]));
                }
                _ => {}
            }
            let removed = state.queue.remove(pos);
            shared.persist(state, &mut events);
            info!("discarded {} {}", removed.kind(), removed.id);
            events.push(EngineEvent::Discarded(removed.id.clone()));
            removed
        };
        shared.emit(events);
        shared.wake_if_connected();
        Ok(removed)
    }

    /// Drops every queued action, in memory and in the store. A call already
    /// in flight finishes but finds nothing to remove.
    pub fn clear(&self) -> Result<usize> {
        let shared = &self.shared;
        let mut events = Vec::new();
        let count = {
            let mut state = shared.lock_state();
            if !shared.store.clear() {
                return Err(Error::ClearFailed);
            }
            let count = state.queue.len();
            state.queue.clear();
            let released = state.release_stalled();
            if !released.is_empty() {
                events.push(EngineEvent::LocksReleased(released));
            }
            info!("cleared {} queued actions", count);
            events.push(EngineEvent::Cleared(count));
            count
        };
        shared.emit(events);
        Ok(count)
    }

    /// Runs one processing pass. The worker calls this on its own; calling
    /// it concurrently is safe and returns [`PassOutcome::Skipped`].
    pub async fn process_next(&self) -> PassOutcome {
        self.shared.process_next().await
    }

    /// Resolves once the engine has nothing it can do right now: no pass is
    /// running and the queue is empty, the backend is unreachable, every
    /// queued patient is locked, or the last pass failed unexpectedly.
    pub async fn settled(&self) {
        loop {
            let changed = self.shared.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();
            if self.shared.is_settled() {
                return;
            }
            changed.await;
        }
    }

    /// Stops the worker and stops following the monitor. Queued actions stay
    /// in the store.
    pub fn shutdown(&self) {
        self.shared.detach();
        debug!("sync engine shut down");
    }
}

impl<E, S> std::fmt::Debug for SyncEngine<E, S>
where
    E: RemoteExecutor,
    S: QueueStore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("SyncEngine")
            .field("queued", &state.queue.len())
            .field("locked", &state.locks.len())
            .field("phase", &state.phase)
            .finish()
    }
}
