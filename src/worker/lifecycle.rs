use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use super::{WorkerContext, WorkerHandle, spawn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        };
        f.write_str(label)
    }
}

/// Hooks a host drives in order: install, activate, ready.
pub(crate) trait Lifecycle {
    fn on_install(&mut self) -> Result<()>;
    /// Runs the host-independent cleanup before the worker takes control.
    fn on_activate(&mut self) -> Result<Vec<String>>;
    fn on_ready(&mut self);
}

/// Worker state shared with every page holding a handle.
#[derive(Debug, Clone)]
pub(crate) struct StateCell {
    inner: Arc<(Mutex<WorkerState>, Condvar)>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(WorkerState::Installing), Condvar::new())),
        }
    }

    pub(crate) fn get(&self) -> WorkerState {
        let (lock, _) = &*self.inner;
        lock.lock().map(|state| *state).unwrap_or(WorkerState::Redundant)
    }

    pub(crate) fn set(&self, next: WorkerState) {
        let (lock, cvar) = &*self.inner;
        if let Ok(mut state) = lock.lock() {
            *state = next;
            cvar.notify_all();
        }
    }

    /// Blocks until the worker is activated; false on timeout or if it went redundant.
    pub(crate) fn wait_until_active(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let Ok(mut state) = lock.lock() else {
            return false;
        };
        loop {
            match *state {
                WorkerState::Activated => return true,
                WorkerState::Redundant => return false,
                _ => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match cvar.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(_) => return false,
            };
        }
    }
}

/// Drives the three lifecycle phases and publishes each state change.
pub(crate) fn run_lifecycle(worker: &mut impl Lifecycle, state: &StateCell) {
    state.set(WorkerState::Installing);
    if let Err(err) = worker.on_install() {
        log::error!("worker install failed: {err:#}");
        state.set(WorkerState::Redundant);
        return;
    }
    // Install never waits for older pages to close.
    state.set(WorkerState::Installed);

    state.set(WorkerState::Activating);
    match worker.on_activate() {
        Ok(removed) if !removed.is_empty() => {
            log::info!("activation removed stale stores: {}", removed.join(", "));
        }
        Ok(_) => {}
        Err(err) => log::warn!("stale store cleanup failed during activation: {err:#}"),
    }
    state.set(WorkerState::Activated);
    worker.on_ready();
}

/// Worker versions registered by the app, oldest first. Clones share the
/// same registration, the way every open page sees one worker.
#[derive(Clone)]
pub(crate) struct Registration {
    workers: Arc<Mutex<Vec<WorkerHandle>>>,
}

impl Registration {
    pub(crate) fn register(ctx: WorkerContext) -> Self {
        let registration = Self {
            workers: Arc::new(Mutex::new(Vec::new())),
        };
        registration.update(ctx);
        registration
    }

    /// Starts a newer worker version alongside the current one.
    pub(crate) fn update(&self, ctx: WorkerContext) -> WorkerHandle {
        let handle = spawn(ctx);
        if let Ok(mut workers) = self.workers.lock() {
            workers.push(handle.clone());
        }
        handle
    }

    /// Newest instance that exists at all: active, waiting or installing.
    pub(crate) fn current(&self) -> Option<WorkerHandle> {
        let workers = self.workers.lock().ok()?;
        workers
            .iter()
            .rev()
            .find(|worker| worker.state() != WorkerState::Redundant)
            .cloned()
    }

    /// Newest activated instance. Older instances it supersedes are retired.
    pub(crate) fn active(&self) -> Option<WorkerHandle> {
        let mut workers = self.workers.lock().ok()?;
        let newest_active = workers
            .iter()
            .rposition(|worker| worker.state() == WorkerState::Activated)?;

        for retired in workers.drain(..newest_active) {
            log::info!("retiring worker {} ({})", retired.id(), retired.version());
            retired.shutdown();
        }
        workers.first().cloned()
    }

    /// Resolves once some worker is active, waiting on the newest one if none is yet.
    pub(crate) fn ready(&self, timeout: Duration) -> Option<WorkerHandle> {
        if let Some(active) = self.active() {
            return Some(active);
        }
        let newest = self.workers.lock().ok()?.last()?.clone();
        if newest.wait_until_active(timeout) {
            self.active()
        } else {
            None
        }
    }

    pub(crate) fn shutdown(&self) {
        if let Ok(mut workers) = self.workers.lock() {
            for worker in workers.drain(..) {
                worker.shutdown();
            }
        }
    }
}
