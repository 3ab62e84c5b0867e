use crate::models::{Chat, Message};

/// Every state transition the chat store knows about.
#[derive(Debug, Clone)]
pub enum ChatAction {
    CreateChat { chat: Chat },
    SetActiveChat { chat_id: String },
    AddMessage { chat_id: String, message: Message },
    DeleteChat { chat_id: String },
    ArchiveChat { chat_id: String },
    UnarchiveChat { chat_id: String },
    LoadChats { chats: Vec<Chat> },
}

/// Follow-up work requested by a transition, carried out by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEffect {
    Persist,
    ScheduleGreeting { chat_id: String },
    RequestReply { chat_id: String },
    SynthesizeChat,
    RefreshSuggestions,
}
