mod download;
mod intercept;
mod lifecycle;
mod protocol;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::db::CacheStorage;
use crate::http::{Fetcher, Origin};

pub(crate) use download::{cache_pack, cached_packs};
pub(crate) use intercept::{Interception, intercept, unanswered};
pub(crate) use lifecycle::{Lifecycle, Registration, StateCell, WorkerState, run_lifecycle};
pub(crate) use protocol::{ClientMessage, ClientPort, WorkerMessage};

const STORE_BASE_PREFIX: &str = "audio-pack-";

/// `audio-pack-<version>-<pack>` store names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoreNaming {
    prefix: String,
}

impl StoreNaming {
    pub(crate) fn new(version: &str) -> Self {
        Self {
            prefix: format!("{STORE_BASE_PREFIX}{version}-"),
        }
    }

    pub(crate) fn store_name(&self, pack_name: &str) -> String {
        format!("{}{pack_name}", self.prefix)
    }

    pub(crate) fn pack_name<'a>(&self, store_name: &'a str) -> Option<&'a str> {
        store_name.strip_prefix(self.prefix.as_str())
    }

    /// A pack store written by another cache-format version.
    pub(crate) fn is_stale(&self, store_name: &str) -> bool {
        store_name.starts_with(STORE_BASE_PREFIX) && !store_name.starts_with(self.prefix.as_str())
    }
}

/// Everything a worker task needs; cheap to clone into each dispatched task.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) storage_path: PathBuf,
    pub(crate) origin: Origin,
    pub(crate) naming: StoreNaming,
    pub(crate) version: String,
    pub(crate) fetcher: Arc<dyn Fetcher>,
}

impl WorkerContext {
    pub(crate) fn new(
        storage_path: PathBuf,
        origin: Origin,
        version: &str,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            storage_path,
            origin,
            naming: StoreNaming::new(version),
            version: version.to_string(),
            fetcher,
        }
    }

    /// Each task opens its own connection so tasks never wait on each other.
    pub(crate) fn open_storage(&self) -> Result<CacheStorage> {
        let storage = CacheStorage::open(&self.storage_path)?;
        storage
            .migrate()
            .with_context(|| format!("failed to prepare {}", self.storage_path.display()))?;
        Ok(storage)
    }
}

enum WorkerEvent {
    Message {
        message: ClientMessage,
        source: ClientPort,
    },
    Fetch {
        url: String,
        respond_with: mpsc::Sender<Interception>,
    },
    Shutdown,
}

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// A page's reference to one running worker instance.
#[derive(Clone)]
pub(crate) struct WorkerHandle {
    id: u64,
    version: String,
    origin: Origin,
    events: mpsc::Sender<WorkerEvent>,
    state: StateCell,
}

impl WorkerHandle {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn version(&self) -> &str {
        &self.version
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state.get()
    }

    pub(crate) fn wait_until_active(&self, timeout: Duration) -> bool {
        self.state.wait_until_active(timeout)
    }

    pub(crate) fn post_message(&self, message: ClientMessage, source: &ClientPort) -> bool {
        self.events
            .send(WorkerEvent::Message {
                message,
                source: source.clone(),
            })
            .is_ok()
    }

    /// Routes a request through the worker. A dead worker leaves it to the
    /// network; a slow one still owns its audio requests.
    pub(crate) fn fetch(&self, url: &str, timeout: Duration) -> Interception {
        let (tx, rx) = mpsc::channel();
        let sent = self.events.send(WorkerEvent::Fetch {
            url: url.to_string(),
            respond_with: tx,
        });
        if sent.is_err() {
            return Interception::Passthrough;
        }
        match rx.recv_timeout(timeout) {
            Ok(interception) => interception,
            Err(RecvTimeoutError::Timeout) => unanswered(&self.origin, url),
            Err(RecvTimeoutError::Disconnected) => Interception::Passthrough,
        }
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.events.send(WorkerEvent::Shutdown);
    }
}

/// The background worker: owns the lifecycle hooks and dispatches events.
struct CacheWorker {
    id: u64,
    ctx: WorkerContext,
}

impl Lifecycle for CacheWorker {
    fn on_install(&mut self) -> Result<()> {
        log::info!(
            "installing worker {} (cache version {})",
            self.id,
            self.ctx.version
        );
        Ok(())
    }

    fn on_activate(&mut self) -> Result<Vec<String>> {
        let mut storage = self.ctx.open_storage()?;
        let stale: Vec<String> = storage
            .keys()?
            .into_iter()
            .filter(|name| self.ctx.naming.is_stale(name))
            .collect();
        for name in &stale {
            storage
                .delete(name)
                .with_context(|| format!("failed to delete stale store {name}"))?;
        }
        Ok(stale)
    }

    fn on_ready(&mut self) {
        log::info!("worker {} claimed open pages", self.id);
    }
}

impl CacheWorker {
    fn run(mut self, events: mpsc::Receiver<WorkerEvent>, state: StateCell) {
        run_lifecycle(&mut self, &state);
        if state.get() != WorkerState::Activated {
            return;
        }

        while let Ok(event) = events.recv() {
            match event {
                WorkerEvent::Message { message, source } => self.dispatch(message, source),
                WorkerEvent::Fetch { url, respond_with } => {
                    let ctx = self.ctx.clone();
                    self.spawn_task("fetch", move || {
                        let _ = respond_with.send(intercept(&ctx, &url));
                    });
                }
                WorkerEvent::Shutdown => break,
            }
        }

        state.set(WorkerState::Redundant);
        log::debug!("worker {} stopped", self.id);
    }

    fn dispatch(&self, message: ClientMessage, source: ClientPort) {
        let ctx = self.ctx.clone();
        match message {
            ClientMessage::CachePack { pack_name, urls } => {
                self.spawn_task(&format!("pack-{pack_name}"), move || {
                    cache_pack(&ctx, &pack_name, &urls, &source);
                });
            }
            ClientMessage::GetCachedPacks => {
                self.spawn_task("inventory", move || {
                    let packs = cached_packs(&ctx);
                    source.post_message(WorkerMessage::CachedPacks { packs });
                });
            }
        }
    }

    fn spawn_task<F>(&self, label: &str, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let name = format!("letras-worker-{}-{label}", self.id);
        if let Err(err) = thread::Builder::new().name(name).spawn(task) {
            log::error!("worker {} could not start {label}: {err}", self.id);
        }
    }
}

/// Starts a worker on its own thread and returns immediately.
pub(crate) fn spawn(ctx: WorkerContext) -> WorkerHandle {
    let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::channel();
    let state = StateCell::new();
    let handle = WorkerHandle {
        id,
        version: ctx.version.clone(),
        origin: ctx.origin.clone(),
        events: tx,
        state: state.clone(),
    };

    let worker = CacheWorker { id, ctx };
    let spawned = thread::Builder::new()
        .name(format!("letras-worker-{id}"))
        .spawn(move || worker.run(rx, state));
    if let Err(err) = spawned {
        log::error!("failed to start worker {id}: {err}");
        handle.state.set(WorkerState::Redundant);
    }
    handle
}
