mod tui;


use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::catalog::{Tier, exercises};
use crate::cli::{Cli, Command};
use crate::client::{PackClient, PackStatus};
use crate::config::Config;
use crate::http::{AudioResponse, Fetcher, HttpFetcher, Origin};
use crate::kv::{JsonFileStore, KeyValueStore};
use crate::packs::{PackIndex, pack_card};
use crate::worker::{Interception, Registration, WorkerContext, WorkerMessage};

pub fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Some(Command::Levels)) {
        run_levels();
        return Ok(());
    }

    let config = Config::resolve(&cli)?;
    log::debug!(
        "origin {} data dir {} cache version {}",
        config.origin.as_str(),
        config.data_dir.display(),
        config.cache_version
    );
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
        config.connect_timeout,
        config.read_timeout,
    ));
    let ctx = worker_context(&config, Arc::clone(&fetcher));
    let registration = Registration::register(ctx.clone());
    let store = JsonFileStore::open(&config.state_file())?;
    let mut client = PackClient::new(
        PackIndex::global(),
        store,
        Some(registration.clone()),
        config.ready_timeout,
    );

    let result = match cli.command {
        Some(Command::Packs) => run_packs(&client, &ctx),
        Some(Command::Download { tier }) => run_download(&mut client, tier, &config),
        Some(Command::Inventory) => run_inventory(&mut client, &config),
        Some(Command::Fetch { url, out }) => run_fetch(
            &registration,
            fetcher.as_ref(),
            &config,
            &url,
            out.as_deref(),
        ),
        Some(Command::Levels) => Ok(()),
        Some(Command::Tui) | None => tui::run_tui(&mut client),
    };

    registration.shutdown();
    result
}

pub(crate) fn worker_context(config: &Config, fetcher: Arc<dyn Fetcher>) -> WorkerContext {
    WorkerContext::new(
        config.cache_database(),
        config.origin.clone(),
        &config.cache_version,
        fetcher,
    )
}

fn run_packs<S: KeyValueStore>(client: &PackClient<'_, S>, ctx: &WorkerContext) -> Result<()> {
    let storage = ctx.open_storage()?;

    println!(
        "{:<10} {:<24} {:<8} {:<8} {:<8} {:<12}",
        "TIER", "PACK", "SIZE", "FILES", "STORED", "STATUS"
    );
    for (tier, info) in client.packs() {
        let card = pack_card(tier);
        let store_name = ctx.naming.store_name(tier.id());
        let stored = if storage.has(&store_name)? {
            storage.entry_count(&store_name)?.to_string()
        } else {
            "-".to_string()
        };
        println!(
            "{:<10} {:<24} {:<8} {:<8} {:<8} {:<12}",
            tier.id(),
            truncate(card.description, 24),
            card.size_hint,
            info.audio_count,
            stored,
            status_text(info.status, info.progress),
        );
    }
    Ok(())
}

fn run_download<S: KeyValueStore>(
    client: &mut PackClient<'_, S>,
    tier: Tier,
    config: &Config,
) -> Result<()> {
    let before = client.pack(tier);
    if before.status == PackStatus::Done {
        println!("Pack {} is already cached ({} files).", tier.label(), before.audio_count);
        return Ok(());
    }
    if !client.download_pack(tier) {
        bail!(
            "worker did not become ready within {}s; pack {} not requested",
            config.ready_timeout.as_secs(),
            tier.id()
        );
    }

    println!("Downloading {} ({} files)...", tier.label(), before.audio_count);
    follow_download(client, tier, config.connect_timeout + config.read_timeout)
}

/// Prints progress for `tier` until the worker finishes it. A `PACK_ERROR`
/// is an error so the process exits non-zero.
pub(crate) fn follow_download<S: KeyValueStore>(
    client: &mut PackClient<'_, S>,
    tier: Tier,
    patience: Duration,
) -> Result<()> {
    loop {
        let Some(message) = client.wait_message(patience) else {
            bail!(
                "no progress from worker for {}s while downloading {}",
                patience.as_secs(),
                tier.id()
            );
        };
        if message.pack_name() != Some(tier.id()) {
            continue;
        }
        match message {
            WorkerMessage::PackProgress { loaded, total, .. } => {
                println!(
                    "  [{loaded:>3}/{total:<3}] {:>3}%",
                    client.pack(tier).progress
                );
            }
            WorkerMessage::PackDone { .. } => {
                println!("Pack {} cached for offline use.", tier.label());
                return Ok(());
            }
            WorkerMessage::PackError { error, .. } => {
                bail!(
                    "pack {} failed: {error}; run the download again to retry",
                    tier.id()
                );
            }
            WorkerMessage::CachedPacks { .. } => {}
        }
    }
}

fn run_inventory<S: KeyValueStore>(client: &mut PackClient<'_, S>, config: &Config) -> Result<()> {
    if !client.request_inventory() {
        bail!("worker did not become ready; inventory unavailable");
    }
    while client.inventory().is_none() {
        if client.wait_message(config.ready_timeout).is_none() {
            bail!("worker did not answer the inventory query");
        }
    }

    let packs = client.inventory().unwrap_or_default();
    if packs.is_empty() {
        println!("No packs stored yet. Run `letras-offline download <tier>` first.");
        return Ok(());
    }
    println!("{:<10} {:<24}", "TIER", "PACK");
    for pack in packs {
        let description = Tier::from_id(pack)
            .map(|tier| pack_card(tier).description)
            .unwrap_or("-");
        println!("{:<10} {:<24}", pack, description);
    }
    Ok(())
}

fn run_fetch(
    registration: &Registration,
    fetcher: &dyn Fetcher,
    config: &Config,
    url: &str,
    out: Option<&Path>,
) -> Result<()> {
    let patience = config.connect_timeout + config.read_timeout;
    let (response, source) = fetch_through_worker(
        registration,
        fetcher,
        &config.origin,
        url,
        config.ready_timeout,
        patience,
    )?;

    println!("Status: {} {}", response.status, response.status_text);
    println!("Source: {source}");
    println!(
        "Type:   {}",
        response.content_type.as_deref().unwrap_or("-")
    );
    println!("Bytes:  {}", response.body.len());
    if let Some(path) = out {
        fs::write(path, &response.body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

/// Sends `url` through the active worker; anything it passes on goes
/// straight to the network.
pub(crate) fn fetch_through_worker(
    registration: &Registration,
    fetcher: &dyn Fetcher,
    origin: &Origin,
    url: &str,
    ready_timeout: Duration,
    patience: Duration,
) -> Result<(AudioResponse, &'static str)> {
    if let Some(worker) = registration.ready(ready_timeout)
        && let Interception::Respond { response, source } = worker.fetch(url, patience)
    {
        return Ok((response, source.label()));
    }

    let resolved = origin
        .resolve(url)
        .with_context(|| format!("invalid url `{url}`"))?;
    let response = fetcher.fetch(&resolved)?;
    Ok((response, "network (not intercepted)"))
}

fn run_levels() {
    println!(
        "{:<6} {:<8} {:<10} {:<10} {:<20} {:<6}",
        "ISLAND", "LEVEL", "MODE", "TIER", "TARGET", "AUDIOS"
    );
    for exercise in exercises() {
        println!(
            "{:<6} {:<8} {:<10} {:<10} {:<20} {:<6}",
            exercise.island,
            exercise.id,
            exercise.mode.label(),
            exercise.difficulty.id(),
            truncate(exercise.target, 20),
            exercise.required_audios.len()
        );
    }
}

pub(crate) fn status_text(status: PackStatus, progress: u8) -> String {
    match status {
        PackStatus::Downloading => format!("{} {progress}%", status.label()),
        _ => status.label().to_string(),
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}
