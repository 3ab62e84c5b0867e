//! Line-oriented host. Renders the active chat and forwards typed intents to
//! the [`ChatStore`]; all behavior lives in the store.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::APP_NAME;
use crate::models::{Chat, Message, Sender};
use crate::store::ChatStore;

const HELP: &str = "\
Commands:
  /new               start a new chat
  /chats             list chats
  /archived          list archived chats
  /open N            switch to chat N
  /archive           archive the current chat
  /unarchive N       restore archived chat N
  /delete            delete the current chat
  /suggest N         send suggestion N
  /tone on|off       friendly tone
  /length N          response length in tokens
  /timestamps on|off show message times
  /quit              exit
Anything else is sent as a message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    Chats,
    Archived,
    /// Zero-based index into the visible chats.
    Open(usize),
    Archive,
    /// Zero-based index into the archived chats.
    Unarchive(usize),
    Delete,
    /// Zero-based index into the current suggestions.
    Suggest(usize),
    Tone(bool),
    Length(u32),
    Timestamps(bool),
    Help,
    Quit,
    Send(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0} (try /help)")]
    Unknown(String),
    #[error("{command} expects {expected}")]
    BadArgument {
        command: &'static str,
        expected: &'static str,
    },
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Send(line.to_string())));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        let command = match name {
            "new" => Command::New,
            "chats" => Command::Chats,
            "archived" => Command::Archived,
            "open" => Command::Open(index_arg("/open", arg)?),
            "archive" => Command::Archive,
            "unarchive" => Command::Unarchive(index_arg("/unarchive", arg)?),
            "delete" => Command::Delete,
            "suggest" => Command::Suggest(index_arg("/suggest", arg)?),
            "tone" => Command::Tone(switch_arg("/tone", arg)?),
            "length" => Command::Length(arg.and_then(|a| a.parse().ok()).ok_or(
                CommandError::BadArgument {
                    command: "/length",
                    expected: "a token count",
                },
            )?),
            "timestamps" => Command::Timestamps(switch_arg("/timestamps", arg)?),
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(format!("/{other}"))),
        };
        Ok(Some(command))
    }
}

fn index_arg(command: &'static str, arg: Option<&str>) -> Result<usize, CommandError> {
    arg.and_then(|a| a.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
        .ok_or(CommandError::BadArgument {
            command,
            expected: "a number from the list",
        })
}

fn switch_arg(command: &'static str, arg: Option<&str>) -> Result<bool, CommandError> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err(CommandError::BadArgument {
            command,
            expected: "on or off",
        }),
    }
}

pub fn format_message(message: &Message, show_timestamps: bool) -> String {
    let label = match message.sender {
        Sender::User => "You",
        Sender::Bot => APP_NAME,
    };
    if show_timestamps {
        if let Some(time) = DateTime::from_timestamp_millis(message.timestamp) {
            return format!(
                "[{}] {}: {}",
                time.with_timezone(&Local).format("%H:%M"),
                label,
                message.content
            );
        }
    }
    format!("{}: {}", label, message.content)
}

/// What has already been printed for the active chat.
#[derive(Debug, Default)]
struct View {
    chat_id: Option<String>,
    shown: usize,
    typing: bool,
    suggestions: Vec<String>,
}

impl View {
    fn render(&mut self, store: &ChatStore, out: &mut impl Write) -> std::io::Result<()> {
        let show_timestamps = store.settings().show_timestamps;
        let active = store.active_chat();

        let active_id = active.map(|chat| chat.id.clone());
        if active_id != self.chat_id {
            self.chat_id = active_id;
            self.shown = 0;
            self.typing = false;
            self.suggestions.clear();
            if let Some(chat) = active {
                writeln!(out, "--- {} ---", chat.title)?;
            }
        }

        let Some(chat) = active else {
            return Ok(());
        };

        for message in chat.messages.iter().skip(self.shown) {
            writeln!(out, "{}", format_message(message, show_timestamps))?;
        }
        self.shown = chat.messages.len();

        let typing = store.is_awaiting_reply(&chat.id);
        if typing && !self.typing {
            writeln!(out, "{} is typing...", APP_NAME)?;
        }
        self.typing = typing;

        let suggestions = store.suggestions();
        if !chat.messages.is_empty()
            && !suggestions.is_loading()
            && suggestions.items() != self.suggestions.as_slice()
        {
            self.suggestions = suggestions.items().to_vec();
            let numbered: Vec<String> = self
                .suggestions
                .iter()
                .enumerate()
                .map(|(i, s)| format!("{}) {}", i + 1, s))
                .collect();
            writeln!(out, "Suggestions: {}", numbered.join("  "))?;
        }
        Ok(())
    }
}

fn list_chats(out: &mut impl Write, chats: &[&Chat], active: Option<&str>) -> std::io::Result<()> {
    if chats.is_empty() {
        writeln!(out, "(none)")?;
    }
    for (i, chat) in chats.iter().enumerate() {
        let marker = if Some(chat.id.as_str()) == active { "*" } else { " " };
        writeln!(
            out,
            "{} {}. {} ({} messages)",
            marker,
            i + 1,
            chat.title,
            chat.messages.len()
        )?;
    }
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn execute(store: &mut ChatStore, command: Command, out: &mut impl Write) -> std::io::Result<()> {
    let active_id = store.active_chat().map(|chat| chat.id.clone());

    match command {
        Command::New => {
            store.create_chat();
        }
        Command::Chats => list_chats(out, &store.visible_chats(), active_id.as_deref())?,
        Command::Archived => list_chats(out, &store.archived_chats(), None)?,
        Command::Open(index) => {
            let target = store.visible_chats().get(index).map(|chat| chat.id.clone());
            match target {
                Some(chat_id) => store.set_active_chat(&chat_id),
                None => writeln!(out, "No chat {}", index + 1)?,
            }
        }
        Command::Archive => match active_id {
            Some(chat_id) => store.archive_chat(&chat_id),
            None => writeln!(out, "No active chat")?,
        },
        Command::Unarchive(index) => {
            let target = store.archived_chats().get(index).map(|chat| chat.id.clone());
            match target {
                Some(chat_id) => store.unarchive_chat(&chat_id),
                None => writeln!(out, "No archived chat {}", index + 1)?,
            }
        }
        Command::Delete => match active_id {
            Some(chat_id) => store.delete_chat(&chat_id),
            None => writeln!(out, "No active chat")?,
        },
        Command::Suggest(index) => {
            let text = store.suggestions().items().get(index).cloned();
            match text {
                Some(text) => store.add_message(text, Sender::User),
                None => writeln!(out, "No suggestion {}", index + 1)?,
            }
        }
        Command::Tone(on) => {
            let mut settings = store.settings().clone();
            settings.friendly_tone = on;
            store.update_settings(settings);
            writeln!(out, "Friendly tone {}", on_off(on))?;
        }
        Command::Length(tokens) => {
            let mut settings = store.settings().clone();
            settings.response_length = tokens;
            store.update_settings(settings);
            writeln!(out, "Response length set to {}", tokens)?;
        }
        Command::Timestamps(on) => {
            let mut settings = store.settings().clone();
            settings.show_timestamps = on;
            store.update_settings(settings);
            writeln!(out, "Timestamps {}", on_off(on))?;
        }
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Send(text) => store.add_message(text, Sender::User),
        Command::Quit => {}
    }
    Ok(())
}

/// Drive the store from stdin until `/quit` or end of input.
pub async fn run(mut store: ChatStore) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    let mut view = View::default();

    writeln!(stdout, "{}. Type a message, or /help for commands.", APP_NAME)?;

    loop {
        view.render(&store, &mut stdout)?;
        stdout.flush()?;

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => execute(&mut store, command, &mut stdout)?,
                    Err(e) => writeln!(stdout, "{}", e)?,
                }
            }
            Some(event) = store.next_event() => store.apply_event(event),
        }
    }

    tracing::info!(in_flight = store.in_flight(), "Exiting");
    Ok(())
}
