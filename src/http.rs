use std::io::Read;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Upper bound for a single audio body; the packs hold small spoken clips.
const MAX_AUDIO_BYTES: u64 = 16 * 1024 * 1024;

/// A response as the worker sees it, whether it came from the network or a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AudioResponse {
    pub(crate) status: u16,
    pub(crate) status_text: String,
    pub(crate) content_type: Option<String>,
    pub(crate) body: Vec<u8>,
}

impl AudioResponse {
    pub(crate) fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub(crate) fn offline_placeholder() -> Self {
        Self {
            status: 503,
            status_text: "Audio unavailable offline".to_string(),
            content_type: None,
            body: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("transport error for {url}: {detail}")]
    Transport { url: String, detail: String },

    #[error("body read failed for {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("body for {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },
}

/// Network seam. Any HTTP status is a response; only transport and body
/// failures are errors.
pub(crate) trait Fetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<AudioResponse, FetchError>;
}

/// App origin that relative asset paths such as `/audio/x.mp3` resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Origin {
    base: Url,
}

impl Origin {
    pub(crate) fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(raw.trim())?,
        })
    }

    pub(crate) fn resolve(&self, raw: &str) -> Result<Url, url::ParseError> {
        self.base.join(raw.trim())
    }

    pub(crate) fn as_str(&self) -> &str {
        self.base.as_str()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpFetcher {
    agent: ureq::Agent,
    max_body: u64,
}

impl HttpFetcher {
    pub(crate) fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self {
            agent,
            max_body: MAX_AUDIO_BYTES,
        }
    }

    pub(crate) fn with_body_limit(mut self, max_body: u64) -> Self {
        self.max_body = max_body;
        self
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<AudioResponse, FetchError> {
        match self.agent.request_url("GET", url).call() {
            Ok(response) => read_response(url, response, self.max_body),
            Err(ureq::Error::Status(_, response)) => read_response(url, response, self.max_body),
            Err(ureq::Error::Transport(err)) => Err(FetchError::Transport {
                url: url.to_string(),
                detail: err.to_string(),
            }),
        }
    }
}

/// Reads at most `max_body` bytes; a longer body is an error, never a
/// truncated success.
fn read_response(
    url: &Url,
    response: ureq::Response,
    max_body: u64,
) -> Result<AudioResponse, FetchError> {
    let status = response.status();
    let status_text = response.status_text().to_string();
    let content_type = response.header("Content-Type").map(str::to_string);

    let mut body = Vec::new();
    response
        .into_reader()
        .take(max_body.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
    if body.len() as u64 > max_body {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            limit: max_body,
        });
    }

    Ok(AudioResponse {
        status,
        status_text,
        content_type,
        body,
    })
}
