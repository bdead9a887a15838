use super::{ClientPort, WorkerContext, WorkerMessage};

/// Downloads `urls` strictly one after another into the pack's store.
///
/// A failed asset is skipped but still counts toward `loaded`. Only a
/// storage failure before the first asset ends the run with `PACK_ERROR`.
pub(crate) fn cache_pack(ctx: &WorkerContext, pack_name: &str, urls: &[String], client: &ClientPort) {
    let store_name = ctx.naming.store_name(pack_name);
    let total = urls.len();

    let mut storage = match ctx.open_storage() {
        Ok(storage) => storage,
        Err(err) => {
            log::error!("cannot open store {store_name}: {err:#}");
            client.post_message(WorkerMessage::PackError {
                pack_name: pack_name.to_string(),
                error: format!("{err:#}"),
            });
            return;
        }
    };

    log::info!("caching pack {pack_name}: {total} asset(s)");
    let mut stored = 0;
    for (index, raw_url) in urls.iter().enumerate() {
        match ctx.origin.resolve(raw_url) {
            Ok(url) => match ctx.fetcher.fetch(&url) {
                Ok(response) if response.is_ok() => {
                    match storage.put(&store_name, url.as_str(), &response) {
                        Ok(()) => stored += 1,
                        Err(err) => log::warn!("could not store {url}: {err:#}"),
                    }
                }
                Ok(response) => log::warn!("skipping {url}: HTTP {}", response.status),
                Err(err) => log::warn!("skipping {url}: {err}"),
            },
            Err(err) => log::warn!("skipping malformed url {raw_url}: {err}"),
        }

        let loaded = index + 1;
        client.post_message(WorkerMessage::PackProgress {
            pack_name: pack_name.to_string(),
            loaded,
            total,
            done: loaded == total,
        });
    }

    log::info!("pack {pack_name} finished: {stored}/{total} stored");
    client.post_message(WorkerMessage::PackDone {
        pack_name: pack_name.to_string(),
    });
}

/// Pack names of the current version that have a backing store.
pub(crate) fn cached_packs(ctx: &WorkerContext) -> Vec<String> {
    let keys = match ctx.open_storage().and_then(|storage| storage.keys()) {
        Ok(keys) => keys,
        Err(err) => {
            log::warn!("cannot list stores: {err:#}");
            return Vec::new();
        }
    };
    keys.iter()
        .filter_map(|name| ctx.naming.pack_name(name))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    use super::*;
    use crate::http::{HttpFetcher, Origin};
    use crate::testutil::{Route, TestServer, closed_origin, temp_dir};

    fn context(origin: Origin, storage_path: std::path::PathBuf) -> WorkerContext {
        WorkerContext::new(
            storage_path,
            origin,
            "v1",
            Arc::new(HttpFetcher::new(
                Duration::from_millis(300),
                Duration::from_millis(300),
            )),
        )
    }

    fn urls(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|path| path.to_string()).collect()
    }

    fn drain(rx: &Receiver<WorkerMessage>) -> Vec<WorkerMessage> {
        rx.try_iter().collect()
    }

    #[test]
    fn partial_failure_still_reports_every_asset_then_done() {
        let server = TestServer::spawn(vec![
            ("/audio/a.mp3", Route::audio("a")),
            ("/audio/b.mp3", Route::audio("b")),
            ("/audio/d.mp3", Route::audio("d")),
        ]);
        let ctx = context(server.origin(), temp_dir("pack_partial").join("cache.db"));
        let (port, rx) = ClientPort::channel();
        let pack = urls(&["/audio/a.mp3", "/audio/b.mp3", "/audio/c.mp3", "/audio/d.mp3"]);

        cache_pack(&ctx, "medio", &pack, &port);

        let messages = drain(&rx);
        assert_eq!(messages.len(), 5);
        for (index, message) in messages[..4].iter().enumerate() {
            assert_eq!(
                *message,
                WorkerMessage::PackProgress {
                    pack_name: "medio".to_string(),
                    loaded: index + 1,
                    total: 4,
                    done: index == 3,
                }
            );
        }
        assert_eq!(
            messages[4],
            WorkerMessage::PackDone {
                pack_name: "medio".to_string()
            }
        );

        let storage = ctx.open_storage().expect("storage");
        assert_eq!(storage.entry_count("audio-pack-v1-medio").expect("count"), 3);
        let missing = ctx.origin.resolve("/audio/c.mp3").expect("url");
        assert!(storage.match_url(missing.as_str()).expect("match").is_none());
    }

    #[test]
    fn unreachable_asset_is_skipped_and_the_rest_are_stored() {
        let server = TestServer::spawn(vec![
            ("/audio/a.mp3", Route::audio("a")),
            ("/audio/c.mp3", Route::audio("c")),
        ]);
        let ctx = context(server.origin(), temp_dir("pack_unreachable").join("cache.db"));
        let (port, rx) = ClientPort::channel();
        let unreachable = format!("{}audio/b.mp3", closed_origin().as_str());
        let pack = vec![
            "/audio/a.mp3".to_string(),
            unreachable.clone(),
            "/audio/c.mp3".to_string(),
        ];

        cache_pack(&ctx, "facil", &pack, &port);

        let messages = drain(&rx);
        assert_eq!(messages.len(), 4);
        let progress: Vec<_> = messages[..3]
            .iter()
            .map(|message| match message {
                WorkerMessage::PackProgress { loaded, total, .. } => (*loaded, *total),
                other => panic!("expected PACK_PROGRESS, got {other:?}"),
            })
            .collect();
        assert_eq!(progress, [(1, 3), (2, 3), (3, 3)]);
        assert_eq!(
            messages[3],
            WorkerMessage::PackDone {
                pack_name: "facil".to_string()
            }
        );

        let storage = ctx.open_storage().expect("storage");
        assert_eq!(storage.entry_count("audio-pack-v1-facil").expect("count"), 2);
        assert!(storage.match_url(&unreachable).expect("match").is_none());
    }

    #[test]
    fn oversized_asset_is_skipped_not_stored_truncated() {
        let server = TestServer::spawn(vec![
            ("/audio/big.mp3", Route::audio(&"x".repeat(64))),
            ("/audio/small.mp3", Route::audio("ok")),
        ]);
        let ctx = WorkerContext::new(
            temp_dir("pack_oversized").join("cache.db"),
            server.origin(),
            "v1",
            Arc::new(
                HttpFetcher::new(Duration::from_millis(300), Duration::from_millis(300))
                    .with_body_limit(32),
            ),
        );
        let (port, rx) = ClientPort::channel();

        cache_pack(&ctx, "facil", &urls(&["/audio/big.mp3", "/audio/small.mp3"]), &port);

        let messages = drain(&rx);
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[2], WorkerMessage::PackDone { .. }));
        let storage = ctx.open_storage().expect("storage");
        assert_eq!(storage.entry_count("audio-pack-v1-facil").expect("count"), 1);
        let big = ctx.origin.resolve("/audio/big.mp3").expect("url");
        assert!(storage.match_url(big.as_str()).expect("match").is_none());
    }

    #[test]
    fn repeating_a_download_overwrites_instead_of_duplicating() {
        let server = TestServer::spawn(vec![
            ("/audio/a.mp3", Route::audio("a")),
            ("/audio/b.mp3", Route::audio("b")),
        ]);
        let ctx = context(server.origin(), temp_dir("pack_repeat").join("cache.db"));
        let (port, _rx) = ClientPort::channel();
        let pack = urls(&["/audio/a.mp3", "/audio/b.mp3"]);

        cache_pack(&ctx, "facil", &pack, &port);
        cache_pack(&ctx, "facil", &pack, &port);

        let storage = ctx.open_storage().expect("storage");
        assert_eq!(storage.keys().expect("keys"), ["audio-pack-v1-facil"]);
        assert_eq!(storage.entry_count("audio-pack-v1-facil").expect("count"), 2);
        let b = ctx.origin.resolve("/audio/b.mp3").expect("url");
        let hit = storage.match_url(b.as_str()).expect("match").expect("b stored");
        assert_eq!(hit.body, b"b");
        assert_eq!(server.hits("/audio/a.mp3"), 2);
    }

    #[test]
    fn all_failures_leave_no_store_behind() {
        let server = TestServer::spawn(vec![("/audio/x.mp3", Route::status(500))]);
        let ctx = context(server.origin(), temp_dir("pack_none").join("cache.db"));
        let (port, rx) = ClientPort::channel();

        cache_pack(&ctx, "dificil", &urls(&["/audio/x.mp3", "/audio/y.mp3"]), &port);

        let messages = drain(&rx);
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[2], WorkerMessage::PackDone { .. }));
        assert!(cached_packs(&ctx).is_empty());
    }

    #[test]
    fn storage_failure_reports_pack_error_without_done() {
        let server = TestServer::spawn(vec![("/audio/a.mp3", Route::audio("a"))]);
        // A directory cannot be opened as a database.
        let ctx = context(server.origin(), temp_dir("pack_error"));
        let (port, rx) = ClientPort::channel();

        cache_pack(&ctx, "facil", &urls(&["/audio/a.mp3"]), &port);

        let messages = drain(&rx);
        assert_eq!(messages.len(), 1);
        let WorkerMessage::PackError { pack_name, error } = &messages[0] else {
            panic!("expected PACK_ERROR, got {:?}", messages[0]);
        };
        assert_eq!(pack_name, "facil");
        assert!(!error.is_empty());
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn empty_pack_finishes_immediately() {
        let server = TestServer::spawn(Vec::new());
        let ctx = context(server.origin(), temp_dir("pack_empty").join("cache.db"));
        let (port, rx) = ClientPort::channel();

        cache_pack(&ctx, "medio", &[], &port);

        assert_eq!(
            drain(&rx),
            [WorkerMessage::PackDone {
                pack_name: "medio".to_string()
            }]
        );
    }
}
