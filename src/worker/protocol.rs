use std::sync::mpsc;

use serde::{Deserialize, Serialize};

/// Page → worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    CachePack { pack_name: String, urls: Vec<String> },
    GetCachedPacks,
}

/// Worker → page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum WorkerMessage {
    #[serde(rename_all = "camelCase")]
    PackProgress {
        pack_name: String,
        loaded: usize,
        total: usize,
        done: bool,
    },
    #[serde(rename_all = "camelCase")]
    PackDone { pack_name: String },
    #[serde(rename_all = "camelCase")]
    PackError { pack_name: String, error: String },
    CachedPacks { packs: Vec<String> },
}

impl WorkerMessage {
    pub(crate) fn pack_name(&self) -> Option<&str> {
        match self {
            Self::PackProgress { pack_name, .. }
            | Self::PackDone { pack_name }
            | Self::PackError { pack_name, .. } => Some(pack_name),
            Self::CachedPacks { .. } => None,
        }
    }
}

/// Reply channel of the page that sent a message.
#[derive(Debug, Clone)]
pub(crate) struct ClientPort {
    tx: mpsc::Sender<WorkerMessage>,
}

impl ClientPort {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<WorkerMessage>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    /// Delivery to a closed page is dropped; the sender keeps going.
    pub(crate) fn post_message(&self, message: WorkerMessage) {
        if let Err(mpsc::SendError(message)) = self.tx.send(message) {
            log::debug!("page is gone, dropping {message:?}");
        }
    }
}
