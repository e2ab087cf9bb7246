//! Interactive tutoring session on the terminal.
//!
//! DESIGN
//! ======
//! The REPL is a thin shell around [`ConversationManager`]: it reads a line,
//! hands it to `send`, then prints whatever messages were added and drains
//! the manager's notices. Slash commands cover the few actions a chat front
//! end offers besides typing.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tutor::{
    ConversationContext, ConversationManager, HttpAskGateway, Message, Notice, NoticeAction, NoticeLevel,
    Preferences, SendOutcome, Storage,
};

use crate::CliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Say(String),
    New,
    Status,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

pub const HELP: &str = "commands: /new start over, /status quota, /help, /quit";

#[must_use]
pub fn parse_input(line: &str) -> ReplInput {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplInput::Say(line.to_owned());
    };
    match command.trim().to_ascii_lowercase().as_str() {
        "new" => ReplInput::New,
        "status" => ReplInput::Status,
        "help" | "?" => ReplInput::Help,
        "quit" | "exit" | "q" => ReplInput::Quit,
        other => ReplInput::Unknown(other.to_owned()),
    }
}

#[must_use]
pub fn format_message(message: &Message) -> String {
    let who = if message.is_from_user() { "you" } else { "laith" };
    format!("{who}> {}", message.body)
}

#[must_use]
pub fn format_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    let mut line = format!("[{tag}] {}: {}", notice.title, notice.body);
    if notice.action == Some(NoticeAction::UpgradeRequired) {
        line.push_str(" (run `lisan subscription checkout` to upgrade)");
    }
    line
}

fn print_notices(manager: &ConversationManager) {
    for notice in manager.take_notices() {
        eprintln!("{}", format_notice(&notice));
    }
}

fn print_all(manager: &ConversationManager) {
    for message in manager.messages() {
        println!("{}", format_message(&message));
    }
}

/// The reply (or diagnostic) a send appended, if any.
#[must_use]
pub fn reply_after(outcome: SendOutcome, messages: &[Message]) -> Option<&Message> {
    match outcome {
        SendOutcome::Replied | SendOutcome::Failed(_) => messages.last().filter(|m| !m.is_from_user()),
        SendOutcome::Ignored | SendOutcome::Blocked | SendOutcome::Busy | SendOutcome::Superseded => None,
    }
}

fn quota_line(manager: &ConversationManager) -> String {
    match manager.quota().remaining() {
        Some(remaining) => format!("{remaining} free message(s) left this month"),
        None => "premium: unlimited messages".to_owned(),
    }
}

pub struct ChatSetup {
    pub storage: Arc<dyn Storage>,
    pub gateway: HttpAskGateway,
    pub identity: String,
    pub entitled: bool,
    pub prefs: Preferences,
    pub fresh: bool,
}

pub async fn run(setup: ChatSetup) -> Result<(), CliError> {
    let ctx = ConversationContext {
        storage: setup.storage,
        gateway: Arc::new(setup.gateway),
        identity: setup.identity,
        entitled: setup.entitled,
    };
    let manager = ConversationManager::new(ctx, setup.prefs.clone());
    if setup.fresh {
        manager.start(&setup.prefs);
    } else {
        let source = manager.open().await;
        tracing::debug!(?source, "conversation opened");
    }

    print_all(&manager);
    eprintln!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_input(&line) {
            ReplInput::Empty => {}
            ReplInput::Quit => break,
            ReplInput::Help => eprintln!("{HELP}"),
            ReplInput::Status => eprintln!("{}", quota_line(&manager)),
            ReplInput::Unknown(command) => eprintln!("unknown command /{command}; {HELP}"),
            ReplInput::New => {
                manager.start(&manager.preferences());
                print_all(&manager);
            }
            ReplInput::Say(text) => {
                let outcome = manager.send(&text).await;
                if let Some(reply) = reply_after(outcome, &manager.messages()) {
                    println!("{}", format_message(reply));
                }
                print_notices(&manager);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
