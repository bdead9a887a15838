use url::Url;

use super::WorkerContext;
use crate::http::{AudioResponse, Origin};

/// Requests under this path are answered cache-first.
pub(crate) const AUDIO_NAMESPACE: &str = "/audio/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseSource {
    Cache,
    Network,
    Offline,
}

impl ResponseSource {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Network => "network",
            Self::Offline => "offline placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Interception {
    /// Not ours; the caller does a plain network fetch.
    Passthrough,
    Respond {
        response: AudioResponse,
        source: ResponseSource,
    },
}

fn claims(url: &Url) -> bool {
    url.path().starts_with(AUDIO_NAMESPACE)
}

/// Cache-first for the audio namespace. Stored copies are served without
/// revalidation and network responses are never stored here.
pub(crate) fn intercept(ctx: &WorkerContext, raw_url: &str) -> Interception {
    let url = match ctx.origin.resolve(raw_url) {
        Ok(url) => url,
        Err(err) => {
            log::debug!("not intercepting unparsable url {raw_url}: {err}");
            return Interception::Passthrough;
        }
    };
    if !claims(&url) {
        return Interception::Passthrough;
    }

    match lookup(ctx, url.as_str()) {
        Ok(Some(response)) => {
            return Interception::Respond {
                response,
                source: ResponseSource::Cache,
            };
        }
        Ok(None) => {}
        Err(err) => log::warn!("cache lookup failed for {url}, trying network: {err:#}"),
    }

    match ctx.fetcher.fetch(&url) {
        Ok(response) => Interception::Respond {
            response,
            source: ResponseSource::Network,
        },
        Err(err) => {
            log::debug!("serving offline placeholder: {err}");
            Interception::Respond {
                response: AudioResponse::offline_placeholder(),
                source: ResponseSource::Offline,
            }
        }
    }
}

/// Answer for a request the worker accepted but did not finish in time.
/// Audio gets the placeholder so the page never refetches it from the network.
pub(crate) fn unanswered(origin: &Origin, raw_url: &str) -> Interception {
    match origin.resolve(raw_url) {
        Ok(url) if claims(&url) => {
            log::warn!("worker did not answer for {url}; serving offline placeholder");
            Interception::Respond {
                response: AudioResponse::offline_placeholder(),
                source: ResponseSource::Offline,
            }
        }
        _ => Interception::Passthrough,
    }
}

fn lookup(ctx: &WorkerContext, url: &str) -> anyhow::Result<Option<AudioResponse>> {
    ctx.open_storage()?.match_url(url)
}
