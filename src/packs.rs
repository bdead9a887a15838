use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::catalog::{Exercise, SHARED_AUDIOS, Tier, exercises};

/// Per-tier audio URL lists. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PackIndex {
    audios: BTreeMap<Tier, Vec<String>>,
}

static GLOBAL_INDEX: OnceLock<PackIndex> = OnceLock::new();

impl PackIndex {
    /// Buckets every required audio under its exercise's tier, first
    /// occurrence wins, then folds the shared assets into `facil`.
    ///
    /// A URL required by exercises of two tiers stays in both lists.
    pub(crate) fn build(exercises: &[Exercise]) -> Self {
        let mut audios: BTreeMap<Tier, Vec<String>> =
            Tier::ALL.into_iter().map(|tier| (tier, Vec::new())).collect();

        for exercise in exercises {
            let urls = audios.entry(exercise.difficulty).or_default();
            for url in exercise.required_audios {
                push_unique(urls, url);
            }
        }

        let easy = audios.entry(Tier::Facil).or_default();
        for url in SHARED_AUDIOS {
            push_unique(easy, url);
        }

        Self { audios }
    }

    pub(crate) fn global() -> &'static Self {
        GLOBAL_INDEX.get_or_init(|| Self::build(exercises()))
    }

    pub(crate) fn urls(&self, tier: Tier) -> &[String] {
        self.audios.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn audio_count(&self, tier: Tier) -> usize {
        self.urls(tier).len()
    }
}

fn push_unique(urls: &mut Vec<String>, url: &str) {
    if !urls.iter().any(|existing| existing == url) {
        urls.push(url.to_string());
    }
}

/// Display metadata for a pack card.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PackCard {
    pub(crate) tier: Tier,
    pub(crate) description: &'static str,
    pub(crate) size_hint: &'static str,
}

pub(crate) const PACK_CARDS: [PackCard; 3] = [
    PackCard {
        tier: Tier::Facil,
        description: "Sílabas · Isla 1",
        size_hint: "~0.6 MB",
    },
    PackCard {
        tier: Tier::Medio,
        description: "Palabras · Isla 2",
        size_hint: "~0.4 MB",
    },
    PackCard {
        tier: Tier::Dificil,
        description: "Oraciones · Isla 3",
        size_hint: "~0.4 MB",
    },
];

pub(crate) fn pack_card(tier: Tier) -> PackCard {
    PACK_CARDS
        .into_iter()
        .find(|card| card.tier == tier)
        .unwrap_or(PackCard {
            tier,
            description: "",
            size_hint: "",
        })
}
