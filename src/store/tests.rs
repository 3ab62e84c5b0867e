use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use super::*;
use crate::providers::{
    ReplyRequest, ReplyResponse, SuggestionRequest, SuggestionResponse,
};
use crate::services::conversation::CHATS_KEY;
use crate::services::pipeline::{FALLBACK_REPLY, MAX_RESPONSE_TOKENS, MIN_RESPONSE_TOKENS};
use crate::services::suggestions::fallback_suggestions;

/// Backend that plays back queued results and records every request.
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ReplyResponse, ProviderError>>>,
    suggestions: Mutex<VecDeque<Result<SuggestionResponse, ProviderError>>>,
    reply_requests: Mutex<Vec<ReplyRequest>>,
    suggestion_requests: Mutex<Vec<SuggestionRequest>>,
}

impl ScriptedBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push_reply(&self, content: &str) {
        self.replies.lock().unwrap().push_back(Ok(ReplyResponse {
            content: content.to_string(),
            truncated: None,
        }));
    }

    fn push_suggestions(&self, items: &[&str]) {
        self.suggestions
            .lock()
            .unwrap()
            .push_back(Ok(SuggestionResponse {
                suggestions: items.iter().map(|s| s.to_string()).collect(),
            }));
    }

    fn reply_requests(&self) -> Vec<ReplyRequest> {
        self.reply_requests.lock().unwrap().clone()
    }

    fn suggestion_requests(&self) -> Vec<SuggestionRequest> {
        self.suggestion_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompanionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate_reply(&self, request: ReplyRequest) -> Result<ReplyResponse, ProviderError> {
        self.reply_requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::NetworkError("connection refused".to_string())))
    }

    async fn suggest(
        &self,
        request: SuggestionRequest,
    ) -> Result<SuggestionResponse, ProviderError> {
        self.suggestion_requests.lock().unwrap().push(request);
        self.suggestions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::RequestFailed("HTTP 500".to_string())))
    }
}

fn options() -> StoreOptions {
    StoreOptions {
        greeting_delay: GREETING_DELAY,
        rng_seed: Some(11),
    }
}

fn open(db: &Database, backend: &Arc<ScriptedBackend>) -> ChatStore {
    ChatStore::load(db.clone(), backend.clone(), options())
}

fn plain_tone(store: &mut ChatStore) {
    let settings = Settings {
        friendly_tone: false,
        ..store.settings().clone()
    };
    store.update_settings(settings);
}

fn contents(chat: &Chat) -> Vec<&str> {
    chat.messages.iter().map(|m| m.content.as_str()).collect()
}

fn assert_visible_invariants(store: &ChatStore) {
    assert!(!store.visible_chats().is_empty(), "no visible chats left");
    let active = store.active_chat().expect("an active chat");
    assert!(!active.archived, "active chat is archived");
}

#[tokio::test(start_paused = true)]
async fn test_first_start_creates_a_greeted_chat() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);

    assert_eq!(store.chats().len(), 1);
    assert!(store.active_messages().is_empty());

    store.settle().await;

    let chat = store.active_chat().unwrap();
    assert_eq!(contents(chat), vec![GREETING]);
    assert_eq!(chat.messages[0].sender, Sender::Bot);

    let saved = load_chats(&db).unwrap();
    assert_eq!(saved, store.chats().to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_storage_starts_fresh() {
    let db = Database::new_in_memory().unwrap();
    db.set_item(CHATS_KEY, "[{\"broken\": ").unwrap();
    let backend = ScriptedBackend::new();

    let mut store = open(&db, &backend);
    store.settle().await;

    assert_eq!(store.chats().len(), 1);
    assert_eq!(contents(&store.chats()[0]), vec![GREETING]);
}

#[tokio::test(start_paused = true)]
async fn test_reload_reproduces_chats_and_picks_a_visible_active_chat() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    backend.push_reply("I'm glad you reached out.");

    let mut store = open(&db, &backend);
    plain_tone(&mut store);
    store.settle().await;
    let first = store.active_chat().unwrap().id.clone();
    store.add_message("Rough day", Sender::User);
    let second = store.create_chat();
    store.settle().await;
    store.archive_chat(&second);
    let chats_before = store.chats().to_vec();
    drop(store);

    let reloaded = open(&db, &backend);
    assert_eq!(reloaded.chats().to_vec(), chats_before);
    assert_eq!(reloaded.active_chat().unwrap().id, first);
    assert_eq!(reloaded.archived_chats().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reload_with_only_archived_chats_adds_a_fresh_one() {
    let db = Database::new_in_memory().unwrap();
    let mut archived = Chat::new(1);
    archived.archived = true;
    save_chats(&db, &[archived.clone()]).unwrap();

    let backend = ScriptedBackend::new();
    let store = open(&db, &backend);

    assert_eq!(store.chats().len(), 2);
    assert_visible_invariants(&store);
    assert!(store.state().contains(&archived.id));
}

#[tokio::test(start_paused = true)]
async fn test_greeting_goes_to_the_chat_it_was_scheduled_for() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);
    store.settle().await;
    let first = store.active_chat().unwrap().id.clone();

    let second = store.create_chat();
    store.set_active_chat(&first);
    store.settle().await;

    assert_eq!(store.active_chat().unwrap().id, first);
    assert_eq!(contents(store.state().chat(&first).unwrap()), vec![GREETING]);
    assert_eq!(contents(store.state().chat(&second).unwrap()), vec![GREETING]);
}

#[tokio::test(start_paused = true)]
async fn test_greeting_for_a_deleted_chat_is_dropped() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);
    store.settle().await;

    let doomed = store.create_chat();
    store.delete_chat(&doomed);
    store.settle().await;

    assert!(!store.state().contains(&doomed));
    assert_eq!(store.chats().len(), 1);
    assert_eq!(store.active_messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_leaving_the_active_chat_refetches_suggestions() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    backend.push_suggestions(&["About the second chat"]);
    backend.push_suggestions(&["Back to the first chat"]);
    backend.push_suggestions(&["Third chat"]);
    backend.push_suggestions(&["First chat again"]);
    let mut store = open(&db, &backend);
    let first = store.active_chat().unwrap().id.clone();
    let second = store.create_chat();
    store.settle().await;
    assert_eq!(store.suggestions().items(), ["About the second chat".to_string()]);
    let before = backend.suggestion_requests().len();

    store.delete_chat(&second);
    assert_eq!(store.active_chat().unwrap().id, first);
    assert!(store.suggestions().is_loading());
    store.settle().await;

    let requests = backend.suggestion_requests();
    assert_eq!(requests.len(), before + 1);
    assert_eq!(requests[before].messages.last().unwrap().content, GREETING);
    assert_eq!(store.suggestions().items(), ["Back to the first chat".to_string()]);

    let third = store.create_chat();
    store.settle().await;
    let before = backend.suggestion_requests().len();

    store.archive_chat(&third);
    assert_eq!(store.active_chat().unwrap().id, first);
    store.settle().await;

    assert_eq!(backend.suggestion_requests().len(), before + 1);
    assert_eq!(store.suggestions().items(), ["First chat again".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_set_active_chat_with_unknown_id_changes_nothing() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);
    store.settle().await;
    let before = store.state().clone();

    store.set_active_chat("does-not-exist");

    assert_eq!(store.state(), &before);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reply_becomes_the_apology_message() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);
    store.settle().await;

    let chat_id = store.create_chat();
    store.add_message("I feel anxious", Sender::User);
    assert!(store.is_awaiting_reply(&chat_id));

    while store.is_awaiting_reply(&chat_id) {
        assert!(store.process_next().await);
    }

    let chat = store.state().chat(&chat_id).unwrap();
    assert_eq!(contents(chat), vec!["I feel anxious", FALLBACK_REPLY]);
    assert_eq!(chat.messages[0].sender, Sender::User);
    assert_eq!(chat.messages[1].sender, Sender::Bot);
}

#[tokio::test(start_paused = true)]
async fn test_reply_request_carries_history_and_clamped_budget() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    backend.push_reply("That sounds like a lot to carry.");
    backend.push_reply("Sleep can be tough.");
    let mut store = open(&db, &backend);
    plain_tone(&mut store);
    store.settle().await;

    store.add_message("Work is stressful", Sender::User);
    store.settle().await;

    let mut settings = store.settings().clone();
    settings.response_length = 5000;
    store.update_settings(settings);
    store.add_message("And I can't sleep", Sender::User);
    store.settle().await;

    let requests = backend.reply_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].max_tokens, MIN_RESPONSE_TOKENS);
    assert_eq!(requests[1].max_tokens, MAX_RESPONSE_TOKENS);

    let sent: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        sent,
        vec![
            GREETING,
            "Work is stressful",
            "That sounds like a lot to carry.",
            "And I can't sleep"
        ]
    );

    assert_eq!(
        contents(store.active_chat().unwrap()),
        vec![
            GREETING,
            "Work is stressful",
            "That sounds like a lot to carry.",
            "And I can't sleep",
            "Sleep can be tough."
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_friendly_tone_decorates_replies() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    backend.push_reply("Thank you for telling me.");
    let mut store = open(&db, &backend);
    store.settle().await;
    assert!(store.settings().friendly_tone);

    store.add_message("I finally went for a walk", Sender::User);
    store.settle().await;

    let reply = store.active_messages().last().unwrap();
    assert_eq!(reply.sender, Sender::Bot);
    assert!(reply.content.ends_with("Thank you for telling me."));
    assert_ne!(reply.content, "Thank you for telling me.");
}

#[tokio::test(start_paused = true)]
async fn test_pending_reply_lands_in_its_original_chat() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    backend.push_reply("Let's unpack that together.");
    let mut store = open(&db, &backend);
    plain_tone(&mut store);
    store.settle().await;
    let original = store.active_chat().unwrap().id.clone();

    store.add_message("My partner and I argued", Sender::User);
    let other = store.create_chat();
    store.settle().await;

    assert_eq!(store.active_chat().unwrap().id, other);
    assert_eq!(
        contents(store.state().chat(&original).unwrap()),
        vec![GREETING, "My partner and I argued", "Let's unpack that together."]
    );
    assert_eq!(contents(store.state().chat(&other).unwrap()), vec![GREETING]);
}

#[tokio::test(start_paused = true)]
async fn test_reply_for_a_deleted_chat_is_dropped() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    backend.push_reply("Still here for you.");
    let mut store = open(&db, &backend);
    store.settle().await;
    let doomed = store.active_chat().unwrap().id.clone();

    store.add_message("Never mind", Sender::User);
    store.delete_chat(&doomed);
    store.settle().await;

    assert!(!store.state().contains(&doomed));
    assert!(!store.is_awaiting_reply(&doomed));
    assert_visible_invariants(&store);
    assert!(store
        .chats()
        .iter()
        .all(|c| c.messages.iter().all(|m| m.content != "Still here for you.")));
}

#[tokio::test(start_paused = true)]
async fn test_visible_chats_never_run_out() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);

    for round in 0..6 {
        let active = store.active_chat().unwrap().id.clone();
        match round % 3 {
            0 => store.delete_chat(&active),
            1 => store.archive_chat(&active),
            _ => {
                store.create_chat();
                let newest = store.active_chat().unwrap().id.clone();
                store.archive_chat(&newest);
            }
        }
        assert_visible_invariants(&store);
    }
    store.settle().await;
    assert_visible_invariants(&store);
}

#[tokio::test(start_paused = true)]
async fn test_unarchive_keeps_the_current_selection() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);
    let first = store.active_chat().unwrap().id.clone();
    let second = store.create_chat();

    store.archive_chat(&first);
    assert_eq!(store.archived_chats().len(), 1);
    store.unarchive_chat(&first);

    assert!(store.archived_chats().is_empty());
    assert_eq!(store.active_chat().unwrap().id, second);
    assert!(!load_chats(&db).unwrap().iter().any(|c| c.archived));
}

#[tokio::test(start_paused = true)]
async fn test_appended_messages_keep_order_and_timestamps() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);
    let chat_id = store.create_chat();

    for i in 0..8 {
        store.add_message(format!("note {i}"), Sender::Bot);
    }

    let chat = store.state().chat(&chat_id).unwrap();
    assert_eq!(chat.messages.len(), 8);
    for (i, message) in chat.messages.iter().enumerate() {
        assert_eq!(message.content, format!("note {i}"));
    }
    assert!(chat
        .messages
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

#[tokio::test(start_paused = true)]
async fn test_first_user_message_names_the_chat() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);
    let chat_id = store.create_chat();

    store.add_message("Hello there, this is a long message", Sender::User);
    assert_eq!(store.state().chat(&chat_id).unwrap().title, "Hello there, this is...");

    store.add_message("Another thought entirely", Sender::User);
    store.settle().await;
    assert_eq!(store.state().chat(&chat_id).unwrap().title, "Hello there, this is...");
}

#[tokio::test(start_paused = true)]
async fn test_suggestions_follow_the_active_conversation() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    backend.push_suggestions(&["How can I relax?", "Tell me about sleep"]);
    let mut store = open(&db, &backend);
    plain_tone(&mut store);

    assert_eq!(store.suggestions().items(), fallback_suggestions().as_slice());
    assert!(backend.suggestion_requests().is_empty());

    store.settle().await;
    let requests = backend.suggestion_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].messages.is_empty());
    assert_eq!(
        store.suggestions().items(),
        ["How can I relax?".to_string(), "Tell me about sleep".to_string()]
    );

    store.add_message("I keep overthinking", Sender::User);
    assert!(store.suggestions().is_loading());
    store.settle().await;

    let requests = backend.suggestion_requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].messages.len(), 2);
    assert_eq!(requests[2].messages.len(), 3);
    assert_eq!(requests[2].messages[2].content, FALLBACK_REPLY);

    assert!(!store.suggestions().is_loading());
    assert_eq!(
        store.suggestions().items(),
        ["How can I relax?".to_string(), "Tell me about sleep".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_settings_survive_a_restart() {
    let db = Database::new_in_memory().unwrap();
    let backend = ScriptedBackend::new();
    let mut store = open(&db, &backend);
    let settings = Settings {
        show_timestamps: false,
        friendly_tone: false,
        response_length: 200,
    };
    store.update_settings(settings.clone());
    drop(store);

    let store = open(&db, &backend);
    assert_eq!(store.settings(), &settings);
}
