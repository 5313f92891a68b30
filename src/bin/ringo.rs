use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

use ringo_chat::application::services::{
    ConversationOrchestrator, MessageStore, OrchestratorError, OrchestratorOptions, ReplyOutcome,
    StoreEvent,
};
use ringo_chat::domain::{Attachment, Message, MessageId, MessageRole};
use ringo_chat::infrastructure::llm::HttpCompletionClient;
use ringo_chat::infrastructure::observability::{LogWriter, TracingConfig, init_tracing};
use ringo_chat::infrastructure::storage::HttpAttachmentClient;
use ringo_chat::presentation::{Environment, Settings};

const HELP: &str = "commands: /new /list /select <n> /search <term> /regen /attach <path> /clear /quit";

#[derive(Debug, PartialEq)]
enum Command {
    Send(String),
    New,
    List,
    Select(usize),
    Search(String),
    Regenerate,
    Attach(PathBuf),
    Clear,
    Quit,
    Help,
    Invalid(String),
}

impl Command {
    fn parse(line: &str) -> Command {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Command::Send(line.to_string());
        };

        let (name, argument) = command
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((command, ""));

        match (name, argument) {
            ("new", _) => Command::New,
            ("list", _) => Command::List,
            ("select", n) => n
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Command::Select)
                .unwrap_or_else(|| Command::Invalid("usage: /select <n>".to_string())),
            ("search", term) => Command::Search(term.to_string()),
            ("regen", _) => Command::Regenerate,
            ("attach", "") => Command::Invalid("usage: /attach <path>".to_string()),
            ("attach", path) => Command::Attach(PathBuf::from(path)),
            ("clear", _) => Command::Clear,
            ("quit" | "exit", _) => Command::Quit,
            ("help", _) => Command::Help,
            (other, _) => Command::Invalid(format!("unknown command /{}", other)),
        }
    }
}

type Orchestrator = ConversationOrchestrator<HttpCompletionClient>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;

    init_tracing(
        &TracingConfig::default()
            .with_default_filter("warn")
            .with_writer(LogWriter::Stderr),
    )?;

    let store = Arc::new(Mutex::new(MessageStore::new()));
    let events = store
        .lock()
        .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
        .subscribe();
    tokio::spawn(print_replies(events));

    let uploads = Arc::new(HttpAttachmentClient::new(&settings.chat.endpoint));
    let options = OrchestratorOptions {
        user_id: settings.chat.user_id.clone(),
        mode: settings.chat.mode,
        system_prompt: settings.chat.system_prompt.clone(),
        ..OrchestratorOptions::default()
    };
    let orchestrator = ConversationOrchestrator::new(
        Arc::clone(&store),
        Arc::new(HttpCompletionClient::new(&settings.chat.endpoint)),
        options,
    )
    .with_attachments(uploads.clone());

    println!("ringo: chatting via {} ({})", settings.chat.endpoint, HELP);

    let mut pending: Vec<Attachment> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() && pending.is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Command::Send(text) => match orchestrator.send(&text, &pending).await {
                Ok(outcome) => {
                    pending.clear();
                    report(&outcome);
                }
                Err(e) => eprintln!("! {}", e),
            },
            Command::New => {
                orchestrator.new_chat();
                println!("-- new conversation");
            }
            Command::List => list_conversations(&orchestrator, None),
            Command::Search(term) => list_conversations(&orchestrator, Some(&term)),
            Command::Select(n) => select(&orchestrator, n),
            Command::Regenerate => match orchestrator.last_reply_id() {
                Some(message_id) => match orchestrator.regenerate(message_id).await {
                    Ok(outcome) => report(&outcome),
                    Err(e) => eprintln!("! {}", e),
                },
                None => eprintln!("! nothing to regenerate"),
            },
            Command::Attach(path) => match uploads.upload(&path).await {
                Ok(attachment) => {
                    println!("-- attached {} ({} bytes)", attachment.filename, attachment.filesize);
                    pending.push(attachment);
                }
                Err(e) => eprintln!("! upload failed: {}", e),
            },
            Command::Clear => match orchestrator.clear_all() {
                Ok(()) => println!("-- history cleared"),
                Err(OrchestratorError::RequestsInFlight) => eprintln!("! wait for the reply first"),
                Err(e) => eprintln!("! {}", e),
            },
            Command::Help => println!("{}", HELP),
            Command::Invalid(reason) => eprintln!("! {}", reason),
            Command::Quit => break,
        }
    }

    Ok(())
}

fn report(outcome: &ReplyOutcome) {
    if let ReplyOutcome::Failed { error, .. } = outcome {
        tracing::debug!(error = %error, "Reply failed");
    }
}

fn list_conversations(orchestrator: &Orchestrator, term: Option<&str>) {
    let store = orchestrator.store();
    let current = store.current_id();
    let matches = store.search(term.unwrap_or(""));

    if matches.is_empty() {
        println!("-- no conversations");
        return;
    }

    // Numbering follows the full list so /select works on search results too.
    for conversation in matches {
        let index = store
            .conversations()
            .iter()
            .position(|c| c.id == conversation.id)
            .map(|i| i + 1)
            .unwrap_or(0);
        let marker = if Some(conversation.id) == current { '*' } else { ' ' };
        println!(
            "{}{:>3}. {} ({} messages)",
            marker,
            index,
            conversation.title.as_deref().unwrap_or("(untitled)"),
            conversation.messages.len()
        );
    }
}

fn select(orchestrator: &Orchestrator, n: usize) {
    let target = orchestrator
        .store()
        .conversations()
        .get(n - 1)
        .map(|c| c.id);

    let Some(conversation_id) = target else {
        eprintln!("! no conversation #{}", n);
        return;
    };

    if orchestrator.select_conversation(conversation_id) {
        for message in orchestrator.visible_messages() {
            print_message(&message);
        }
    }
}

fn print_message(message: &Message) {
    println!("{}> {}", message.role, message.content.display_text());
}

/// Echoes assistant text as it lands in the store, printing only the part of
/// each reply that has not been shown yet.
async fn print_replies(mut events: broadcast::Receiver<StoreEvent>) {
    let mut shown: HashMap<MessageId, usize> = HashMap::new();
    let mut stdout = std::io::stdout();

    loop {
        match events.recv().await {
            Ok(StoreEvent::MessageAdded(message) | StoreEvent::MessageUpdated(message))
                if message.role == MessageRole::Assistant =>
            {
                let text = message.content.display_text();
                let offset = shown.entry(message.id).or_insert(0);
                if *offset == 0 {
                    print!("assistant> ");
                }
                print!("{}", text.get(*offset..).unwrap_or_default());
                *offset = text.len();
                let _ = stdout.flush();
            }
            Ok(StoreEvent::LoadingChanged(false)) => println!(),
            Ok(StoreEvent::ErrorChanged(Some(error))) => eprintln!("! {}", error),
            Ok(StoreEvent::Cleared) => shown.clear(),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Reply printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_sent() {
        assert_eq!(Command::parse(" hello "), Command::Send("hello".to_string()));
    }

    #[test]
    fn select_requires_a_positive_index() {
        assert_eq!(Command::parse("/select 2"), Command::Select(2));
        assert!(matches!(Command::parse("/select 0"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/select x"), Command::Invalid(_)));
    }

    #[test]
    fn arguments_keep_inner_whitespace() {
        assert_eq!(
            Command::parse("/search rust  async"),
            Command::Search("rust  async".to_string())
        );
        assert_eq!(
            Command::parse("/attach ./my file.png"),
            Command::Attach(PathBuf::from("./my file.png"))
        );
    }

    #[test]
    fn unknown_commands_are_reported() {
        assert!(matches!(Command::parse("/bogus"), Command::Invalid(_)));
    }
}
