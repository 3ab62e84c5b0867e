//! The chat store: owns every chat and the active selection.
//!
//! State changes go through [`reduce`]; the store runs the effects it returns.
//! Remote calls and greeting timers run as spawned tasks and report back as
//! [`StoreEvent`]s, which are applied one at a time by whoever drives the
//! store (`process_next` / `settle`, or `next_event` + `apply_event`).

pub mod actions;
pub mod reducer;
pub mod state;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

pub use actions::{ChatAction, ChatEffect};
pub use reducer::reduce;
pub use state::ChatState;

use crate::models::{now_millis, Chat, Message, Sender};
use crate::providers::{CompanionBackend, ProviderError};
use crate::services::conversation::{load_chats, save_chats, GREETING};
use crate::services::pipeline::{render_reply, ReplyOutcome, ResponsePipeline};
use crate::services::suggestions::{context_window, SuggestionFetcher, SuggestionState};
use crate::services::{Database, Settings, SettingsService};

pub const GREETING_DELAY: Duration = Duration::from_millis(500);

/// Completion of background work, applied back onto the store.
#[derive(Debug)]
pub enum StoreEvent {
    GreetingDue {
        chat_id: String,
    },
    ReplyReady {
        chat_id: String,
        outcome: ReplyOutcome,
        friendly_tone: bool,
    },
    SuggestionsReady {
        request: u64,
        result: Result<Vec<String>, ProviderError>,
    },
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub greeting_delay: Duration,
    /// Seed for tone augmentation; entropy when unset.
    pub rng_seed: Option<u64>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            greeting_delay: GREETING_DELAY,
            rng_seed: None,
        }
    }
}

pub struct ChatStore {
    state: ChatState,
    db: Database,
    settings: Settings,
    pipeline: ResponsePipeline,
    fetcher: SuggestionFetcher,
    suggestions: SuggestionState,
    pending_replies: HashMap<String, usize>,
    in_flight: usize,
    greeting_delay: Duration,
    rng: StdRng,
    events_tx: mpsc::UnboundedSender<StoreEvent>,
    events_rx: mpsc::UnboundedReceiver<StoreEvent>,
}

impl ChatStore {
    /// Build the store from persisted state. Must be called inside a Tokio
    /// runtime: a fresh chat schedules its greeting immediately.
    pub fn load(db: Database, backend: Arc<dyn CompanionBackend>, options: StoreOptions) -> Self {
        let settings = SettingsService::load(&db);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut store = Self {
            state: ChatState::default(),
            db,
            settings,
            pipeline: ResponsePipeline::new(backend.clone()),
            fetcher: SuggestionFetcher::new(backend),
            suggestions: SuggestionState::default(),
            pending_replies: HashMap::new(),
            in_flight: 0,
            greeting_delay: options.greeting_delay,
            rng,
            events_tx,
            events_rx,
        };

        let chats = load_chats(&store.db).unwrap_or_default();
        tracing::info!(chats = chats.len(), "Loaded chats");
        store.dispatch(ChatAction::LoadChats { chats });
        store
    }

    // --- Queries ---

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn chats(&self) -> &[Chat] {
        &self.state.chats
    }

    pub fn visible_chats(&self) -> Vec<&Chat> {
        self.state.visible().collect()
    }

    pub fn archived_chats(&self) -> Vec<&Chat> {
        self.state.archived().collect()
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.state.active()
    }

    pub fn active_messages(&self) -> &[Message] {
        self.state.active_messages()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn suggestions(&self) -> &SuggestionState {
        &self.suggestions
    }

    pub fn is_awaiting_reply(&self, chat_id: &str) -> bool {
        self.pending_replies.contains_key(chat_id)
    }

    /// Number of spawned tasks whose results have not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    // --- Operations ---

    pub fn create_chat(&mut self) -> String {
        let chat = Chat::new(now_millis());
        let chat_id = chat.id.clone();
        tracing::debug!(chat_id = %chat_id, "Creating chat");
        self.dispatch(ChatAction::CreateChat { chat });
        chat_id
    }

    pub fn set_active_chat(&mut self, chat_id: &str) {
        self.dispatch(ChatAction::SetActiveChat {
            chat_id: chat_id.to_string(),
        });
    }

    /// Append a message to the active chat. User messages also request a reply.
    pub fn add_message(&mut self, content: impl Into<String>, sender: Sender) {
        let Some(chat_id) = self.state.active_chat.clone() else {
            tracing::debug!("No active chat, dropping message");
            return;
        };
        self.append_to(&chat_id, content.into(), sender);
    }

    pub fn delete_chat(&mut self, chat_id: &str) {
        self.dispatch(ChatAction::DeleteChat {
            chat_id: chat_id.to_string(),
        });
    }

    pub fn archive_chat(&mut self, chat_id: &str) {
        self.dispatch(ChatAction::ArchiveChat {
            chat_id: chat_id.to_string(),
        });
    }

    pub fn unarchive_chat(&mut self, chat_id: &str) {
        self.dispatch(ChatAction::UnarchiveChat {
            chat_id: chat_id.to_string(),
        });
    }

    pub fn update_settings(&mut self, settings: Settings) {
        if let Err(e) = SettingsService::save(&self.db, &settings) {
            tracing::error!("Failed to save settings: {}", e);
        }
        self.settings = settings;
    }

    // --- Event loop ---

    pub async fn next_event(&mut self) -> Option<StoreEvent> {
        self.events_rx.recv().await
    }

    pub fn apply_event(&mut self, event: StoreEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match event {
            StoreEvent::GreetingDue { chat_id } => {
                self.append_to(&chat_id, GREETING.to_string(), Sender::Bot);
            }
            StoreEvent::ReplyReady {
                chat_id,
                outcome,
                friendly_tone,
            } => {
                let remaining = self.pending_replies.get_mut(&chat_id).map(|n| {
                    *n = n.saturating_sub(1);
                    *n
                });
                if remaining == Some(0) {
                    self.pending_replies.remove(&chat_id);
                }

                if !self.state.contains(&chat_id) {
                    tracing::info!(chat_id = %chat_id, "Chat was deleted, dropping reply");
                    return;
                }
                if self.state.active_chat.as_deref() != Some(chat_id.as_str()) {
                    tracing::debug!(chat_id = %chat_id, "Reply landed in an inactive chat");
                }

                let content = render_reply(outcome, friendly_tone, &mut self.rng);
                self.append_to(&chat_id, content, Sender::Bot);
            }
            StoreEvent::SuggestionsReady { request, result } => {
                self.suggestions.complete(request, result);
            }
        }
    }

    /// Wait for one event and apply it. Returns `false` if the channel closed.
    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.apply_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply events until no spawned work is outstanding.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            if !self.process_next().await {
                break;
            }
        }
    }

    // --- Internals ---

    fn dispatch(&mut self, action: ChatAction) {
        let effects = reduce(&mut self.state, action);
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: ChatEffect) {
        match effect {
            ChatEffect::Persist => self.persist(),
            ChatEffect::ScheduleGreeting { chat_id } => self.schedule_greeting(chat_id),
            ChatEffect::RequestReply { chat_id } => self.request_reply(chat_id),
            ChatEffect::SynthesizeChat => {
                let chat_id = self.create_chat();
                tracing::info!(chat_id = %chat_id, "No visible chats left, created a new one");
            }
            ChatEffect::RefreshSuggestions => self.refresh_suggestions(),
        }
    }

    fn append_to(&mut self, chat_id: &str, content: String, sender: Sender) {
        let Some(chat) = self.state.chat(chat_id) else {
            tracing::debug!(chat_id = %chat_id, "Chat no longer exists, dropping message");
            return;
        };
        let message = Message::new(content, sender, chat.next_timestamp(now_millis()));
        self.dispatch(ChatAction::AddMessage {
            chat_id: chat_id.to_string(),
            message,
        });
    }

    fn persist(&self) {
        if let Err(e) = save_chats(&self.db, &self.state.chats) {
            tracing::error!("Failed to persist chats: {}", e);
        }
    }

    fn schedule_greeting(&mut self, chat_id: String) {
        let tx = self.events_tx.clone();
        let delay = self.greeting_delay;
        self.in_flight += 1;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(StoreEvent::GreetingDue { chat_id });
        });
    }

    fn request_reply(&mut self, chat_id: String) {
        let Some(chat) = self.state.chat(&chat_id) else {
            return;
        };
        let history = chat.messages.clone();
        let configured_length = self.settings.response_length;
        let friendly_tone = self.settings.friendly_tone;

        *self.pending_replies.entry(chat_id.clone()).or_default() += 1;
        self.in_flight += 1;

        let pipeline = self.pipeline.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = pipeline.request_reply(history, configured_length).await;
            let _ = tx.send(StoreEvent::ReplyReady {
                chat_id,
                outcome,
                friendly_tone,
            });
        });
    }

    fn refresh_suggestions(&mut self) {
        let messages = self.state.active_messages();
        if messages.is_empty() {
            return;
        }
        let context = if self.suggestions.has_requested() {
            context_window(messages)
        } else {
            Vec::new()
        };
        let request = self.suggestions.begin();
        self.in_flight += 1;

        let fetcher = self.fetcher.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(context).await;
            let _ = tx.send(StoreEvent::SuggestionsReady { request, result });
        });
    }
}
