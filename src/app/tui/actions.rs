use std::collections::BTreeMap;

use crate::catalog::Tier;
use crate::client::{PackClient, PackStatus};
use crate::kv::KeyValueStore;

pub(crate) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(crate) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

pub(crate) fn selected_tier(selected: usize) -> Tier {
    Tier::ALL[selected.min(Tier::ALL.len() - 1)]
}

pub(crate) fn move_up(selected: usize) -> usize {
    selected.saturating_sub(1)
}

pub(crate) fn move_down(selected: usize) -> usize {
    (selected + 1).min(Tier::ALL.len() - 1)
}

/// Enter on a card: download, retry after an error, or explain why not.
pub(crate) fn start_selected<S: KeyValueStore>(client: &mut PackClient<'_, S>, tier: Tier) -> String {
    match client.pack(tier).status {
        PackStatus::Done => status_info(&format!("{} is already available offline.", tier.label())),
        PackStatus::Downloading => status_info(&format!("{} is still downloading.", tier.label())),
        PackStatus::Idle | PackStatus::Error => {
            if client.download_pack(tier) {
                status_info(&format!("Downloading {}...", tier.label()))
            } else {
                status_error("Worker is not ready. Try again in a moment.")
            }
        }
    }
}

pub(crate) fn refresh_inventory<S: KeyValueStore>(client: &mut PackClient<'_, S>) -> String {
    if client.request_inventory() {
        status_info("Checking stored packs...")
    } else {
        status_error("Worker is not ready; inventory unavailable.")
    }
}

pub(crate) fn snapshot<S: KeyValueStore>(client: &PackClient<'_, S>) -> BTreeMap<Tier, PackStatus> {
    client.packs().map(|(tier, info)| (tier, info.status)).collect()
}

/// Status line for packs that just finished or failed.
pub(crate) fn transition_notice<S: KeyValueStore>(
    before: &BTreeMap<Tier, PackStatus>,
    client: &PackClient<'_, S>,
) -> Option<String> {
    let mut notice = None;
    for (tier, info) in client.packs() {
        if before.get(&tier) == Some(&info.status) {
            continue;
        }
        match info.status {
            PackStatus::Done => {
                notice = Some(status_info(&format!("{} is ready offline.", tier.label())));
            }
            PackStatus::Error => {
                notice = Some(status_error(&format!(
                    "{} failed. Press Enter to retry.",
                    tier.label()
                )));
            }
            PackStatus::Idle | PackStatus::Downloading => {}
        }
    }
    notice
}
