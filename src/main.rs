//! ragchat - terminal chat client for a retrieval-augmented generation service
//!
//! Each chat turn runs through a pure state machine: context building,
//! answer streaming over server-sent events, and relevance scoring.

mod config;
mod mention;
mod rag;
mod runtime;
mod state_machine;
mod store;
mod transcript;

use config::ClientConfig;
use mention::{default_catalog, reduce, ComposerContext, ComposerEvent, ComposerState, Key, ToolMention};
use rag::{HttpRagService, LoggingService};
use runtime::{ChatHandle, ProductionManager, TurnView, ViewEvent};
use store::{InMemoryStore, Role};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcript::{render_segments, Transcript};

const HELP: &str = "\
Type a message and press Enter to send. End a line with \\ to continue on the next line.
A draft ending in @ opens the tool list: u/d move, empty line picks, a number picks that entry, q closes.
Commands: /new /chats /switch <n> /rename <title> /delete /refs /help /quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragchat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let service = HttpRagService::new(ClientConfig::from_env()?)?;
    tracing::info!(
        server_url = %service.config().server_url,
        user_id = %service.config().user_id,
        "Starting ragchat"
    );

    let rag = LoggingService::new(Arc::new(service));
    let manager = ProductionManager::new(Arc::new(InMemoryStore::new()), Arc::new(rag));

    let chat = manager.create_chat().await?;
    let mut app = App::open(manager, &chat.id).await?;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match app.handle_line(&line).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("error: {e}"),
                }
            }

            Ok(()) = app.view_rx.changed() => app.render_view(),

            event = app.events.recv() => match event {
                Ok(event) => app.render_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "View lagged behind chat events");
                }
                Err(broadcast::error::RecvError::Closed) => {}
            },
        }
    }

    app.manager.shutdown_all().await;
    Ok(())
}

/// Front-end state for the chat on screen
struct App {
    manager: ProductionManager,
    catalog: Vec<ToolMention>,
    chat_id: String,
    handle: ChatHandle,
    events: broadcast::Receiver<ViewEvent>,
    view_rx: watch::Receiver<TurnView>,
    composer: ComposerState,
    transcript: Transcript,
}

impl App {
    async fn open(manager: ProductionManager, chat_id: &str) -> Result<Self, String> {
        let handle = manager.get_or_create(chat_id).await?;
        let app = Self {
            events: handle.subscribe(),
            view_rx: handle.view_rx.clone(),
            transcript: Transcript::new(&handle.view()),
            handle,
            manager,
            catalog: default_catalog(),
            chat_id: chat_id.to_string(),
            composer: ComposerState::default(),
        };
        app.print_header().await?;
        Ok(app)
    }

    async fn switch_to(&mut self, chat_id: &str) -> Result<(), String> {
        let handle = self.manager.get_or_create(chat_id).await?;
        self.events = handle.subscribe();
        self.view_rx = handle.view_rx.clone();
        self.transcript = Transcript::new(&handle.view());
        self.handle = handle;
        chat_id.clone_into(&mut self.chat_id);
        self.composer = ComposerState::default();
        self.print_header().await
    }

    async fn print_header(&self) -> Result<(), String> {
        let chat = self
            .manager
            .get_chat(&self.chat_id)
            .await?
            .ok_or_else(|| format!("Chat not found: {}", self.chat_id))?;
        println!("== {} ==", chat.title);
        for message in &chat.messages {
            match message.role {
                Role::User => println!("you> {}", message.content),
                Role::Assistant => {
                    println!("bot> {}", message.content);
                    if let Some(label) = message.score_label() {
                        println!("     score {label}");
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns `false` when the user asked to quit
    async fn handle_line(&mut self, line: &str) -> Result<bool, String> {
        if self.composer.popup_open() {
            self.handle_popup_line(line.trim());
            return Ok(true);
        }

        if let Some(command) = line.strip_prefix('/') {
            if self.composer.input.is_empty() {
                return self.handle_command(command.trim()).await;
            }
        }

        if line.trim().is_empty() && self.composer.input.trim().is_empty() {
            return Ok(true);
        }

        let (text, newline) = match line.strip_suffix('\\') {
            Some(text) => (text, true),
            None => (line, false),
        };
        let draft = format!("{}{text}", self.composer.input);
        self.apply(ComposerEvent::Edit(draft));

        if self.composer.popup_open() {
            self.print_popup();
        } else if newline {
            self.apply(ComposerEvent::KeyDown {
                key: Key::Enter,
                shift: true,
            });
        } else {
            self.submit().await?;
        }
        Ok(true)
    }

    fn handle_popup_line(&mut self, line: &str) {
        let event = match line {
            "u" => ComposerEvent::KeyDown {
                key: Key::ArrowUp,
                shift: false,
            },
            "d" => ComposerEvent::KeyDown {
                key: Key::ArrowDown,
                shift: false,
            },
            "" => ComposerEvent::KeyDown {
                key: Key::Enter,
                shift: false,
            },
            "q" => ComposerEvent::KeyDown {
                key: Key::Escape,
                shift: false,
            },
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 => ComposerEvent::Pick(n - 1),
                _ => {
                    println!("u/d to move, empty line to pick, a number to pick, q to close");
                    return;
                }
            },
        };
        let focus_input = self.apply(event);

        if self.composer.popup_open() {
            self.print_popup();
        } else if focus_input {
            println!("draft: {}", render_segments(&self.composer.segments(), &self.catalog));
        }
    }

    async fn submit(&mut self) -> Result<(), String> {
        let in_flight = self.handle.view().in_flight;
        let ctx = ComposerContext {
            catalog: &self.catalog,
            in_flight,
        };
        let update = reduce(
            &self.composer,
            &ctx,
            ComposerEvent::KeyDown {
                key: Key::Enter,
                shift: false,
            },
        );
        self.composer = update.state;

        match update.submission {
            Some(submission) => self.handle.submit(submission.text, submission.tools).await,
            None => {
                if in_flight {
                    println!("(still answering, draft kept)");
                }
                Ok(())
            }
        }
    }

    /// Returns whether the input should take focus again
    fn apply(&mut self, event: ComposerEvent) -> bool {
        let ctx = ComposerContext {
            catalog: &self.catalog,
            in_flight: self.handle.view().in_flight,
        };
        let update = reduce(&self.composer, &ctx, event);
        self.composer = update.state;
        update.focus_input
    }

    async fn handle_command(&mut self, command: &str) -> Result<bool, String> {
        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, arg)| (name, arg.trim()));

        match name {
            "quit" | "q" => return Ok(false),
            "help" => println!("{HELP}"),
            "new" => {
                let chat = self.manager.create_chat().await?;
                self.switch_to(&chat.id).await?;
            }
            "chats" => {
                for (i, chat) in self.manager.list_chats().await?.iter().enumerate() {
                    let marker = if chat.id == self.chat_id { '*' } else { ' ' };
                    println!(
                        "{marker} {}. {} ({} messages, started {})",
                        i + 1,
                        chat.title,
                        chat.messages.len(),
                        chat.created_at.format("%H:%M")
                    );
                }
            }
            "switch" => {
                let chats = self.manager.list_chats().await?;
                let chat = arg
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| chats.get(i))
                    .ok_or_else(|| format!("No chat numbered {arg:?}"))?;
                self.switch_to(&chat.id).await?;
            }
            "rename" => {
                if arg.is_empty() {
                    return Err("Usage: /rename <title>".to_string());
                }
                self.manager.rename_chat(&self.chat_id, arg).await?;
                println!("renamed to {arg}");
            }
            "delete" => {
                self.manager.delete_chat(&self.chat_id).await?;
                let next = match self.manager.list_chats().await?.into_iter().next() {
                    Some(chat) => chat,
                    None => self.manager.create_chat().await?,
                };
                self.switch_to(&next.id).await?;
            }
            "refs" => self.print_references().await?,
            other => println!("unknown command /{other}, try /help"),
        }
        Ok(true)
    }

    async fn print_references(&self) -> Result<(), String> {
        let messages = self.manager.messages(&self.chat_id).await?;
        let Some(references) = messages.iter().rev().find_map(|m| m.references.as_ref()) else {
            println!("no references yet");
            return Ok(());
        };
        for (label, text) in references {
            println!("--- {label} ---\n{text}");
        }
        Ok(())
    }

    fn print_popup(&self) {
        let highlighted = self.composer.popup.map_or(0, |p| p.highlighted);
        for (i, tool) in self.catalog.iter().enumerate() {
            let cursor = if i == highlighted { '>' } else { ' ' };
            println!("{cursor} {}. {} {}", i + 1, tool.icon, tool.display_name);
        }
    }

    fn render_view(&mut self) {
        let out = self.transcript.on_view(&self.view_rx.borrow_and_update());
        emit(&out);
    }

    fn render_event(&mut self, event: &ViewEvent) {
        let out = self.transcript.on_event(event);
        emit(&out);
    }
}

fn emit(out: &str) {
    if !out.is_empty() {
        print!("{out}");
        let _ = std::io::stdout().flush();
    }
}
