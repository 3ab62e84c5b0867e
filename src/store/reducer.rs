use super::actions::{ChatAction, ChatEffect};
use super::state::ChatState;
use crate::models::Sender;
use crate::services::conversation::derive_title;

/// Apply `action` to `state` and return the effects the store must carry out.
/// Actions that target a missing chat, or would change nothing, return no
/// effects and leave the state untouched.
pub fn reduce(state: &mut ChatState, action: ChatAction) -> Vec<ChatEffect> {
    match action {
        ChatAction::CreateChat { chat } => {
            if state.contains(&chat.id) {
                return Vec::new();
            }
            let chat_id = chat.id.clone();
            state.chats.insert(0, chat);
            state.active_chat = Some(chat_id.clone());
            vec![ChatEffect::Persist, ChatEffect::ScheduleGreeting { chat_id }]
        }
        ChatAction::SetActiveChat { chat_id } => {
            if state.active_chat.as_deref() == Some(chat_id.as_str()) {
                return Vec::new();
            }
            let Some(chat) = state.chat(&chat_id) else {
                return Vec::new();
            };
            let has_messages = !chat.messages.is_empty();
            state.active_chat = Some(chat_id);
            if has_messages {
                vec![ChatEffect::RefreshSuggestions]
            } else {
                Vec::new()
            }
        }
        ChatAction::AddMessage { chat_id, message } => {
            let is_active = state.active_chat.as_deref() == Some(chat_id.as_str());
            let Some(chat) = state.chat_mut(&chat_id) else {
                return Vec::new();
            };
            let from_user = message.sender == Sender::User;
            if from_user && !chat.has_user_message() {
                chat.title = derive_title(&message.content);
            }
            chat.messages.push(message);

            let mut effects = vec![ChatEffect::Persist];
            if from_user {
                effects.push(ChatEffect::RequestReply { chat_id });
            }
            if is_active {
                effects.push(ChatEffect::RefreshSuggestions);
            }
            effects
        }
        ChatAction::DeleteChat { chat_id } => {
            let Some(index) = state.chats.iter().position(|c| c.id == chat_id) else {
                return Vec::new();
            };
            state.chats.remove(index);
            let mut effects = vec![ChatEffect::Persist];
            if state.active_chat.as_deref() == Some(chat_id.as_str()) {
                reselect_active(state, &mut effects);
            }
            with_replacement(state, effects)
        }
        ChatAction::ArchiveChat { chat_id } => {
            match state.chat_mut(&chat_id) {
                Some(chat) if !chat.archived => chat.archived = true,
                _ => return Vec::new(),
            }
            let mut effects = vec![ChatEffect::Persist];
            if state.active_chat.as_deref() == Some(chat_id.as_str()) {
                reselect_active(state, &mut effects);
            }
            with_replacement(state, effects)
        }
        ChatAction::UnarchiveChat { chat_id } => match state.chat_mut(&chat_id) {
            Some(chat) if chat.archived => {
                chat.archived = false;
                vec![ChatEffect::Persist]
            }
            _ => Vec::new(),
        },
        ChatAction::LoadChats { chats } => {
            state.chats = chats;
            state.active_chat = state.first_visible_id();
            if !state.has_visible() {
                vec![ChatEffect::SynthesizeChat]
            } else if !state.active_messages().is_empty() {
                vec![ChatEffect::RefreshSuggestions]
            } else {
                Vec::new()
            }
        }
    }
}

/// Move the selection to the first visible chat, refreshing suggestions when
/// it already has messages.
fn reselect_active(state: &mut ChatState, effects: &mut Vec<ChatEffect>) {
    state.active_chat = state.first_visible_id();
    if !state.active_messages().is_empty() {
        effects.push(ChatEffect::RefreshSuggestions);
    }
}

/// Ask for a fresh chat when nothing visible is left.
fn with_replacement(state: &ChatState, mut effects: Vec<ChatEffect>) -> Vec<ChatEffect> {
    if !state.has_visible() {
        effects.push(ChatEffect::SynthesizeChat);
    }
    effects
}
