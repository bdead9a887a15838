use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::Duration;

use crate::catalog::Tier;
use crate::kv::KeyValueStore;
use crate::packs::PackIndex;
use crate::worker::{ClientMessage, ClientPort, Registration, WorkerHandle, WorkerMessage};

/// Durable key holding the JSON list of fully cached tier ids.
pub(crate) const CACHED_PACKS_KEY: &str = "appLectura_cached_packs_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PackStatus {
    Idle,
    Downloading,
    Done,
    Error,
}

impl PackStatus {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PackInfo {
    pub(crate) status: PackStatus,
    pub(crate) progress: u8,
    pub(crate) audio_count: usize,
}

/// Page-side view of the pack cache: per-tier state, the tracked worker
/// and the channel its replies arrive on.
pub(crate) struct PackClient<'a, S: KeyValueStore> {
    index: &'a PackIndex,
    store: S,
    registration: Option<Registration>,
    worker: Option<WorkerHandle>,
    port: ClientPort,
    inbox: mpsc::Receiver<WorkerMessage>,
    packs: BTreeMap<Tier, PackInfo>,
    inventory: Option<Vec<String>>,
    ready_timeout: Duration,
}

impl<'a, S: KeyValueStore> PackClient<'a, S> {
    pub(crate) fn new(
        index: &'a PackIndex,
        store: S,
        registration: Option<Registration>,
        ready_timeout: Duration,
    ) -> Self {
        let done = read_done_list(&store);
        let packs = Tier::ALL
            .into_iter()
            .map(|tier| {
                let (status, progress) = if done.contains(&tier) {
                    (PackStatus::Done, 100)
                } else {
                    (PackStatus::Idle, 0)
                };
                let info = PackInfo {
                    status,
                    progress,
                    audio_count: index.audio_count(tier),
                };
                (tier, info)
            })
            .collect();

        let worker = registration.as_ref().and_then(Registration::current);
        if registration.is_none() {
            log::warn!("no worker registration; packs cannot be downloaded");
        }
        let (port, inbox) = ClientPort::channel();

        Self {
            index,
            store,
            registration,
            worker,
            port,
            inbox,
            packs,
            inventory: None,
            ready_timeout,
        }
    }

    pub(crate) fn pack(&self, tier: Tier) -> PackInfo {
        self.packs.get(&tier).copied().unwrap_or(PackInfo {
            status: PackStatus::Idle,
            progress: 0,
            audio_count: self.index.audio_count(tier),
        })
    }

    pub(crate) fn packs(&self) -> impl Iterator<Item = (Tier, PackInfo)> + '_ {
        self.packs.iter().map(|(tier, info)| (*tier, *info))
    }

    /// Last `CACHED_PACKS` reply, if any arrived.
    pub(crate) fn inventory(&self) -> Option<&[String]> {
        self.inventory.as_deref()
    }

    /// True once any installing, waiting or active worker has been seen.
    pub(crate) fn worker_ready(&self) -> bool {
        self.worker.is_some()
    }

    pub(crate) fn worker(&self) -> Option<&WorkerHandle> {
        self.worker.as_ref()
    }

    /// Starts downloading `tier`. Returns whether the request was posted.
    pub(crate) fn download_pack(&mut self, tier: Tier) -> bool {
        let current = self.pack(tier).status;
        if matches!(current, PackStatus::Downloading | PackStatus::Done) {
            log::debug!("pack {tier} is {}, not requeued", current.label());
            return false;
        }
        let Some(worker) = self.ready_worker() else {
            log::warn!("no active worker; download of {tier} skipped");
            return false;
        };

        self.set_pack(tier, PackStatus::Downloading, 0);
        let message = ClientMessage::CachePack {
            pack_name: tier.id().to_string(),
            urls: self.index.urls(tier).to_vec(),
        };
        if !worker.post_message(message, &self.port) {
            log::error!("worker {} stopped before accepting {tier}", worker.id());
            self.set_pack(tier, PackStatus::Error, 0);
            return false;
        }
        true
    }

    pub(crate) fn request_inventory(&mut self) -> bool {
        match self.ready_worker() {
            Some(worker) => worker.post_message(ClientMessage::GetCachedPacks, &self.port),
            None => false,
        }
    }

    /// Applies every reply that has already arrived; returns how many.
    pub(crate) fn pump(&mut self) -> usize {
        self.refresh_worker();
        let mut handled = 0;
        while let Ok(message) = self.inbox.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    /// Blocks for the next reply and applies it.
    pub(crate) fn wait_message(&mut self, timeout: Duration) -> Option<WorkerMessage> {
        let message = self.inbox.recv_timeout(timeout).ok()?;
        self.handle_message(message.clone());
        Some(message)
    }

    /// Follows a newer worker once it has finished activating.
    pub(crate) fn refresh_worker(&mut self) {
        let Some(registration) = self.registration.as_ref() else {
            return;
        };
        match registration.active() {
            Some(active) if self.worker.as_ref().map(WorkerHandle::id) != Some(active.id()) => {
                log::info!(
                    "tracking worker {} (cache version {})",
                    active.id(),
                    active.version()
                );
                self.worker = Some(active);
            }
            Some(_) => {}
            None => {
                if self.worker.is_none() {
                    self.worker = registration.current();
                }
            }
        }
    }

    fn ready_worker(&mut self) -> Option<WorkerHandle> {
        let registration = self.registration.as_ref()?;
        let active = registration.ready(self.ready_timeout)?;
        self.worker = Some(active.clone());
        Some(active)
    }

    fn handle_message(&mut self, message: WorkerMessage) {
        let message = match message {
            WorkerMessage::CachedPacks { packs } => {
                self.inventory = Some(packs);
                return;
            }
            other => other,
        };
        let Some(tier) = message.pack_name().and_then(Tier::from_id) else {
            log::debug!("ignoring message for unknown pack: {message:?}");
            return;
        };
        if self.pack(tier).status == PackStatus::Done {
            return;
        }

        match message {
            WorkerMessage::PackProgress { loaded, total, .. } => {
                self.set_pack(tier, PackStatus::Downloading, percent(loaded, total));
            }
            WorkerMessage::PackDone { .. } => {
                self.set_pack(tier, PackStatus::Done, 100);
                self.persist_done_list();
            }
            WorkerMessage::PackError { error, .. } => {
                log::warn!("pack {tier} failed: {error}");
                self.set_pack(tier, PackStatus::Error, 0);
            }
            WorkerMessage::CachedPacks { .. } => {}
        }
    }

    fn set_pack(&mut self, tier: Tier, status: PackStatus, progress: u8) {
        let audio_count = self.index.audio_count(tier);
        self.packs.insert(
            tier,
            PackInfo {
                status,
                progress,
                audio_count,
            },
        );
    }

    fn persist_done_list(&mut self) {
        let done: Vec<&str> = self
            .packs
            .iter()
            .filter(|(_, info)| info.status == PackStatus::Done)
            .map(|(tier, _)| tier.id())
            .collect();
        let result = serde_json::to_string(&done)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.store.set(CACHED_PACKS_KEY, &raw));
        if let Err(err) = result {
            log::warn!("could not persist cached pack list: {err:#}");
        }
    }
}

fn read_done_list(store: &impl KeyValueStore) -> Vec<Tier> {
    let Some(raw) = store.get(CACHED_PACKS_KEY) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(ids) => ids.iter().filter_map(|id| Tier::from_id(id)).collect(),
        Err(err) => {
            log::warn!("ignoring corrupt cached pack list: {err}");
            Vec::new()
        }
    }
}

/// `round(loaded / total * 100)`, with an empty pack counting as complete.
fn percent(loaded: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let rounded = (loaded.min(total) * 200 + total) / (2 * total);
    rounded as u8
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{Exercise, GameMode};
    use crate::http::HttpFetcher;
    use crate::kv::JsonFileStore;
    use crate::testutil::{Route, TestServer, temp_dir};
    use crate::worker::WorkerContext;

    #[derive(Default)]
    struct MemoryStore {
        values: BTreeMap<String, String>,
    }

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Option<String> {
            self.values.get(key).cloned()
        }

        fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
            self.values.insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn memory_with(raw: &str) -> MemoryStore {
        let mut store = MemoryStore::default();
        store.set(CACHED_PACKS_KEY, raw).expect("memory set");
        store
    }

    const MEDIO_LEVEL: [Exercise; 1] = [Exercise {
        id: "2-1",
        island: 2,
        mode: GameMode::Palabra,
        target: "casa",
        difficulty: Tier::Medio,
        required_audios: &[
            "/audio/a.mp3",
            "/audio/b.mp3",
            "/audio/c.mp3",
            "/audio/d.mp3",
        ],
    }];

    fn registration(server: &TestServer, dir: &std::path::Path) -> Registration {
        Registration::register(WorkerContext::new(
            dir.join("cache.db"),
            server.origin(),
            "v1",
            Arc::new(HttpFetcher::new(
                Duration::from_millis(300),
                Duration::from_millis(300),
            )),
        ))
    }

    fn wait_until_settled<S: KeyValueStore>(client: &mut PackClient<'_, S>, tier: Tier) {
        for _ in 0..50 {
            if !matches!(client.pack(tier).status, PackStatus::Downloading) {
                return;
            }
            client.wait_message(Duration::from_millis(200));
        }
        panic!("pack {tier} never settled");
    }

    #[test]
    fn percent_rounds_like_the_ui_expects() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(4, 4), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn seeds_done_tiers_from_durable_list() {
        let index = PackIndex::global();
        let client = PackClient::new(
            index,
            memory_with(r#"["medio","unknown"]"#),
            None,
            Duration::from_millis(10),
        );

        let medio = client.pack(Tier::Medio);
        assert_eq!(medio.status, PackStatus::Done);
        assert_eq!(medio.progress, 100);
        assert_eq!(medio.audio_count, index.audio_count(Tier::Medio));
        assert_eq!(client.pack(Tier::Facil).status, PackStatus::Idle);
        assert_eq!(client.pack(Tier::Dificil).progress, 0);
    }

    #[test]
    fn corrupt_durable_list_reads_as_nothing_cached() {
        let client = PackClient::new(
            PackIndex::global(),
            memory_with("{broken"),
            None,
            Duration::from_millis(10),
        );
        assert!(client.packs().all(|(_, info)| info.status == PackStatus::Idle));
    }

    #[test]
    fn download_without_worker_is_a_no_op() {
        let mut client = PackClient::new(
            PackIndex::global(),
            MemoryStore::default(),
            None,
            Duration::from_millis(10),
        );
        assert!(!client.worker_ready());
        assert!(!client.download_pack(Tier::Facil));
        assert_eq!(client.pack(Tier::Facil).status, PackStatus::Idle);
        assert!(!client.request_inventory());
    }

    #[test]
    fn messages_drive_the_pack_state_machine() {
        let mut client = PackClient::new(
            PackIndex::global(),
            MemoryStore::default(),
            None,
            Duration::from_millis(10),
        );

        client.handle_message(WorkerMessage::PackProgress {
            pack_name: "facil".to_string(),
            loaded: 1,
            total: 3,
            done: false,
        });
        assert_eq!(client.pack(Tier::Facil).status, PackStatus::Downloading);
        assert_eq!(client.pack(Tier::Facil).progress, 33);

        client.handle_message(WorkerMessage::PackError {
            pack_name: "dificil".to_string(),
            error: "quota".to_string(),
        });
        assert_eq!(client.pack(Tier::Dificil).status, PackStatus::Error);

        client.handle_message(WorkerMessage::PackDone {
            pack_name: "facil".to_string(),
        });
        client.handle_message(WorkerMessage::PackError {
            pack_name: "facil".to_string(),
            error: "late".to_string(),
        });
        client.handle_message(WorkerMessage::PackProgress {
            pack_name: "nivel-secreto".to_string(),
            loaded: 1,
            total: 1,
            done: true,
        });

        let facil = client.pack(Tier::Facil);
        assert_eq!((facil.status, facil.progress), (PackStatus::Done, 100));
        assert_eq!(
            client.store.get(CACHED_PACKS_KEY).as_deref(),
            Some(r#"["facil"]"#)
        );

        client.handle_message(WorkerMessage::CachedPacks {
            packs: vec!["facil".to_string()],
        });
        assert_eq!(client.inventory(), Some(&["facil".to_string()][..]));
        assert_eq!(client.pack(Tier::Medio).status, PackStatus::Idle);
    }

    #[test]
    fn done_list_is_recomputed_from_all_done_packs() {
        let mut client = PackClient::new(
            PackIndex::global(),
            memory_with(r#"["dificil"]"#),
            None,
            Duration::from_millis(10),
        );
        client.handle_message(WorkerMessage::PackDone {
            pack_name: "facil".to_string(),
        });
        assert_eq!(
            client.store.get(CACHED_PACKS_KEY).as_deref(),
            Some(r#"["facil","dificil"]"#)
        );
    }

    #[test]
    fn partial_pack_reaches_done_and_survives_restart() {
        let server = TestServer::spawn(vec![
            ("/audio/a.mp3", Route::audio("a")),
            ("/audio/b.mp3", Route::audio("b")),
            ("/audio/d.mp3", Route::audio("d")),
        ]);
        let dir = temp_dir("client_partial");
        let state_path = dir.join("state.json");
        let index = PackIndex::build(&MEDIO_LEVEL);

        let registration = registration(&server, &dir);
        let mut client = PackClient::new(
            &index,
            JsonFileStore::open(&state_path).expect("state"),
            Some(registration.clone()),
            Duration::from_secs(5),
        );
        assert!(client.worker_ready());
        assert!(client.download_pack(Tier::Medio));
        assert!(!client.download_pack(Tier::Medio), "already downloading");
        wait_until_settled(&mut client, Tier::Medio);

        assert_eq!(
            client.pack(Tier::Medio),
            PackInfo {
                status: PackStatus::Done,
                progress: 100,
                audio_count: 4,
            }
        );
        assert!(!client.download_pack(Tier::Medio), "done is final");
        drop(client);
        let requests = server.request_count();

        let reloaded = PackClient::new(
            &index,
            JsonFileStore::open(&state_path).expect("state"),
            Some(registration.clone()),
            Duration::from_secs(5),
        );
        assert_eq!(reloaded.pack(Tier::Medio).status, PackStatus::Done);
        assert_eq!(reloaded.pack(Tier::Medio).progress, 100);
        assert_eq!(server.request_count(), requests);
        registration.shutdown();
    }

    #[test]
    fn store_failure_surfaces_as_error_and_allows_retry() {
        let server = TestServer::spawn(vec![("/audio/a.mp3", Route::audio("a"))]);
        let dir = temp_dir("client_error");
        // The database path is a directory, so the store cannot open.
        let blocked = dir.join("cache.db");
        std::fs::create_dir_all(&blocked).expect("blocker dir");
        let index = PackIndex::build(&MEDIO_LEVEL);
        let registration = registration(&server, &dir);

        let mut client = PackClient::new(
            &index,
            MemoryStore::default(),
            Some(registration.clone()),
            Duration::from_secs(5),
        );
        assert!(client.download_pack(Tier::Medio));
        wait_until_settled(&mut client, Tier::Medio);
        assert_eq!(client.pack(Tier::Medio).status, PackStatus::Error);
        assert_eq!(client.pack(Tier::Medio).progress, 0);

        assert!(client.download_pack(Tier::Medio), "error allows retry");
        registration.shutdown();
    }
}
