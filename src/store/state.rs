use crate::models::{Chat, Message};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    /// Most recently created first.
    pub chats: Vec<Chat>,
    pub active_chat: Option<String>,
}

impl ChatState {
    pub fn chat(&self, id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn chat_mut(&mut self, id: &str) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.chat(id).is_some()
    }

    pub fn active(&self) -> Option<&Chat> {
        self.active_chat.as_deref().and_then(|id| self.chat(id))
    }

    pub fn active_messages(&self) -> &[Message] {
        self.active().map(|c| c.messages.as_slice()).unwrap_or(&[])
    }

    pub fn visible(&self) -> impl Iterator<Item = &Chat> {
        self.chats.iter().filter(|c| !c.archived)
    }

    pub fn archived(&self) -> impl Iterator<Item = &Chat> {
        self.chats.iter().filter(|c| c.archived)
    }

    pub fn has_visible(&self) -> bool {
        self.visible().next().is_some()
    }

    pub fn first_visible_id(&self) -> Option<String> {
        self.visible().next().map(|c| c.id.clone())
    }
}
