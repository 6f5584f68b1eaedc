//! Shared application state.

use std::sync::{Arc, Mutex, RwLock};

use vocstream_core::StreamSegmenterConfig;
use vocstream_voice::{CancelToken, SpeakQueue, TokenSourceConfig};

/// Application state shared across all handlers.
pub type AppState = Arc<ServerContext>;

/// The running language-model worker, if any.
struct ChatTask {
    cancel: CancelToken,
    handle: tokio::task::JoinHandle<()>,
}

/// Everything the handlers need, built once at startup.
pub struct ServerContext {
    /// The queueing speech controller.
    pub queue: Arc<SpeakQueue>,

    /// Token source location and model.
    pub tokens: TokenSourceConfig,

    /// Streaming segmentation thresholds for the chat worker.
    pub segmenter: StreamSegmenterConfig,

    /// Shared async HTTP client for the token source.
    pub client: reqwest::Client,

    /// Accumulated text of the current response, for `/api/status`.
    latest_text: RwLock<String>,

    /// Current chat worker. Plain mutex — never held across an await.
    chat: Mutex<Option<ChatTask>>,
}

impl ServerContext {
    /// Build the context around an already-constructed controller.
    pub fn new(
        queue: Arc<SpeakQueue>,
        tokens: TokenSourceConfig,
        segmenter: StreamSegmenterConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            tokens,
            segmenter,
            client: reqwest::Client::new(),
            latest_text: RwLock::new(String::new()),
            chat: Mutex::new(None),
        })
    }

    /// The accumulated partial text of the current response.
    #[must_use]
    pub fn latest_text(&self) -> String {
        self.latest_text.read().expect("latest_text poisoned").clone()
    }

    /// Append a chunk to the partial text.
    pub fn append_latest_text(&self, chunk: &str) {
        self.latest_text
            .write()
            .expect("latest_text poisoned")
            .push_str(chunk);
    }

    /// Clear the partial text (a new request supersedes the old one).
    pub fn reset_latest_text(&self) {
        self.latest_text.write().expect("latest_text poisoned").clear();
    }

    /// Cancel the current chat worker, if one is running.
    pub fn cancel_chat(&self) {
        let mut chat = self.chat.lock().expect("chat lock poisoned");
        if let Some(task) = chat.take() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }

    /// Register a freshly spawned chat worker.
    pub(crate) fn set_chat(&self, cancel: CancelToken, handle: tokio::task::JoinHandle<()>) {
        let mut chat = self.chat.lock().expect("chat lock poisoned");
        if let Some(old) = chat.take() {
            old.cancel.cancel();
            old.handle.abort();
        }
        *chat = Some(ChatTask { cancel, handle });
    }

    /// Whether a chat worker is still producing text.
    #[must_use]
    pub fn chat_active(&self) -> bool {
        let chat = self.chat.lock().expect("chat lock poisoned");
        chat.as_ref().is_some_and(|task| !task.handle.is_finished())
    }
}
