// src/state.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::clipboard::{Clipboard, FileClipboard, SystemClipboard};
use crate::db::Storage;
use crate::interaction::{HeadlessInteraction, Interaction};
use crate::messages::{default_messages, MessageIdGenerator};
use crate::session;
use crate::settings;
use crate::types::{
    DebugData, EditBuffer, GroupOption, Message, ModelOption, PlaygroundConfig,
};

pub const CONFIG_SAVE_DELAY: Duration = Duration::from_millis(1000);

/// The request currently allowed to write into the message list.
pub(crate) struct ActiveRequest {
    pub id: u64,
    pub task: Option<AbortHandle>,
}

pub(crate) struct Inner {
    pub config: PlaygroundConfig,
    pub messages: Vec<Message>,
    pub debug: DebugData,
    pub editing: Option<EditBuffer>,
    pub ids: MessageIdGenerator,
    pub active_request: Option<ActiveRequest>,
    pub next_request_id: u64,
    pub models: Vec<ModelOption>,
    pub groups: Vec<GroupOption>,
    pub config_save: Option<AbortHandle>,
}

impl Inner {
    pub fn owns_request(&self, id: u64) -> bool {
        self.active_request.as_ref().is_some_and(|r| r.id == id)
    }

    /// Drops the active request, aborting its task. Returns whether one
    /// was running.
    pub fn close_active_request(&mut self) -> bool {
        match self.active_request.take() {
            Some(active) => {
                if let Some(task) = active.task {
                    task.abort();
                }
                debug!(request_id = active.id, "closed active request");
                true
            }
            None => false,
        }
    }
}

enum SaveCommand {
    Messages(Vec<Message>),
    Flush(oneshot::Sender<()>),
}

/// Serializes message-list writes. Each save carries the snapshot taken at
/// the moment of the transition, and saves land in submission order.
#[derive(Clone)]
pub(crate) struct SaveQueue {
    tx: mpsc::UnboundedSender<SaveCommand>,
}

impl SaveQueue {
    fn spawn(storage: Arc<dyn Storage>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SaveCommand>();
        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    SaveCommand::Messages(messages) => {
                        match settings::save_messages(&*storage, &messages) {
                            Ok(()) => debug!(count = messages.len(), "saved messages"),
                            Err(e) => warn!(error = %e, "failed to save messages"),
                        }
                    }
                    SaveCommand::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });
        Self { tx }
    }

    pub(crate) fn save(&self, messages: Vec<Message>) {
        if self.tx.send(SaveCommand::Messages(messages)).is_err() {
            warn!("message save queue is closed");
        }
    }

    pub(crate) async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(SaveCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    pub saver: SaveQueue,
}

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the message list and configuration of one playground session.
/// Cloning yields another handle onto the same session.
///
/// Must be created inside a Tokio runtime.
#[derive(Clone)]
pub struct PlaygroundState {
    pub(crate) shared: Arc<Shared>,
    pub(crate) api: ApiClient,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) interaction: Arc<dyn Interaction>,
    pub(crate) clipboard: Arc<dyn Clipboard>,
    pub(crate) fallback_clipboard: Arc<dyn Clipboard>,
    pub(crate) config_save_delay: Duration,
}

impl PlaygroundState {
    /// Loads configuration and history from `storage`. A history that ends
    /// in a generating message (e.g. the process died mid-stream) is
    /// finalized and saved.
    pub fn new(api: ApiClient, storage: Arc<dyn Storage>) -> Self {
        let config = settings::load_config(&*storage);
        let mut messages = settings::load_messages(&*storage).unwrap_or_else(default_messages);
        let ids = MessageIdGenerator::after(&messages);

        let saver = SaveQueue::spawn(storage.clone());
        if let Some(snapshot) = session::finalize_generating(&mut messages) {
            info!("finalized interrupted message from previous session");
            saver.save(snapshot);
        }

        let fallback_clipboard = FileClipboard::in_data_dir().unwrap_or_else(|| {
            FileClipboard::new(std::env::temp_dir().join("chat-playground-clipboard.txt"))
        });

        let inner = Inner {
            config,
            messages,
            debug: DebugData::default(),
            editing: None,
            ids,
            active_request: None,
            next_request_id: 1,
            models: Vec::new(),
            groups: Vec::new(),
            config_save: None,
        };

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                saver,
            }),
            api,
            storage,
            interaction: Arc::new(HeadlessInteraction),
            clipboard: Arc::new(SystemClipboard),
            fallback_clipboard: Arc::new(fallback_clipboard),
            config_save_delay: CONFIG_SAVE_DELAY,
        }
    }

    pub fn with_interaction(mut self, interaction: Arc<dyn Interaction>) -> Self {
        self.interaction = interaction;
        self
    }

    pub fn with_clipboard(mut self, primary: Arc<dyn Clipboard>, fallback: Arc<dyn Clipboard>) -> Self {
        self.clipboard = primary;
        self.fallback_clipboard = fallback;
        self
    }

    pub fn with_config_save_delay(mut self, delay: Duration) -> Self {
        self.config_save_delay = delay;
        self
    }

    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().messages.clone()
    }

    pub fn config(&self) -> PlaygroundConfig {
        self.shared.lock().config.clone()
    }

    pub fn debug_data(&self) -> DebugData {
        self.shared.lock().debug.clone()
    }

    pub fn editing(&self) -> Option<EditBuffer> {
        self.shared.lock().editing.clone()
    }

    pub fn models(&self) -> Vec<ModelOption> {
        self.shared.lock().models.clone()
    }

    pub fn groups(&self) -> Vec<GroupOption> {
        self.shared.lock().groups.clone()
    }

    /// True while the last message is still receiving output.
    pub fn is_generating(&self) -> bool {
        self.shared
            .lock()
            .messages
            .last()
            .is_some_and(|m| m.status.is_generating())
    }

    /// Waits until every message save queued so far has been written.
    pub async fn flush_messages(&self) {
        self.shared.saver.flush().await;
    }

    pub(crate) fn save_messages(&self, snapshot: Vec<Message>) {
        self.shared.saver.save(snapshot);
    }

    /// Restarts the debounce timer for the configuration save. The config
    /// written is the one current when the timer fires.
    pub(crate) fn schedule_config_save(&self) {
        let shared = self.shared.clone();
        let storage = self.storage.clone();
        let delay = self.config_save_delay;

        let mut inner = self.shared.lock();
        if let Some(pending) = inner.config_save.take() {
            pending.abort();
        }

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let config = shared.lock().config.clone();
            match settings::save_config(&*storage, &config) {
                Ok(()) => debug!("saved playground config"),
                Err(e) => warn!(error = %e, "failed to save playground config"),
            }
        });
        inner.config_save = Some(task.abort_handle());
    }

    /// Cancels any pending debounced save and writes the config now.
    pub fn flush_config(&self) -> crate::error::Result<()> {
        let config = {
            let mut inner = self.shared.lock();
            if let Some(pending) = inner.config_save.take() {
                pending.abort();
            }
            inner.config.clone()
        };
        settings::save_config(&*self.storage, &config)
    }
}
