pub mod chat;
pub mod message;

pub use chat::{Chat, NEW_CHAT_TITLE};
pub use message::{now_millis, Message, Sender};
