//! Interactive chat across sections.
//!
//! Lines starting with `/` are local commands; anything else is sent to the
//! assistant under the current section. Answers are printed as they are
//! revealed. Typing while an answer is still being revealed finishes it at
//! once and handles the new line.

use std::io::Write;

use clap::ValueEnum;
use companion_config::Config;
use companion_conversation::{
    RevealRef, SessionController, SessionError, SubmitOutcome, ValidationError,
};
use companion_core::{Message, Role};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info};

use super::{ExportFormat, init_common_components, write_export};

const HELP: &str = "\
Commands:
  /sections          list sections
  /switch <id>       change section
  /clear             clear this section's history
  /export [txt|pdf]  export this section's history
  /examples          show example questions
  /quit              leave";

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Section to start in instead of the last active one
    pub section: Option<String>,
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Keep history in memory only
    pub ephemeral: bool,
}

/// Strategy for executing the Chat command.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components(input.ephemeral).await?;
        let controller = common.controller;

        if let Some(id) = &input.section {
            controller.switch_section(id).await?;
        }
        let section = controller
            .active_section()
            .await
            .ok_or_else(|| anyhow::anyhow!("No sections available"))?;

        if let Some(msg) = input.message {
            let outcome = controller.submit(&section, &msg).await?;
            controller.cancel_reveal().await;
            let answer = controller.snapshot(outcome.section_id()).await;
            if let Some(last) = answer.last() {
                println!("{}", last.content);
            }
            return Ok(());
        }

        ChatSession {
            controller,
            config: common.config,
            section,
            warned_persistence: false,
        }
        .run()
        .await
    }
}

/// How printing a reveal ended.
enum Interrupt {
    Finished,
    Line(String),
    Eof,
}

enum Flow {
    Continue,
    Quit,
}

struct ChatSession {
    controller: SessionController,
    config: Config,
    section: String,
    warned_persistence: bool,
}

impl ChatSession {
    async fn run(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("Type a question, or /help for commands.");
        self.show_section().await;

        let mut queued: Option<String> = None;
        loop {
            let line = match queued.take() {
                Some(line) => line,
                None => {
                    print!("[{}] > ", self.section);
                    std::io::stdout().flush()?;
                    match lines.next_line().await? {
                        Some(line) => line,
                        None => break,
                    }
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(command) = line.strip_prefix('/') {
                match self.command(command).await? {
                    Flow::Continue => continue,
                    Flow::Quit => break,
                }
            }

            match self.controller.submit(&self.section, line).await {
                Ok(outcome) => {
                    if let SubmitOutcome::Redirected { to, .. } = &outcome {
                        self.section.clone_from(to);
                        println!("(moved to {})", self.section_name());
                    }
                    let answer = outcome.answer_ref();
                    match self.print_reveal(&answer, &mut lines).await? {
                        Interrupt::Finished => {}
                        Interrupt::Line(next) => queued = Some(next),
                        Interrupt::Eof => break,
                    }
                }
                Err(e) => {
                    debug!("Submission failed: {e}");
                    eprintln!("{}", e.user_notice());
                }
            }
            self.warn_persistence().await;
        }

        info!("Chat ended");
        Ok(())
    }

    async fn command(&mut self, command: &str) -> anyhow::Result<Flow> {
        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(n, a)| (n, a.trim()));

        match name {
            "quit" | "exit" | "q" => return Ok(Flow::Quit),
            "help" => println!("{HELP}"),
            "sections" => {
                for section in self.controller.catalog().iter() {
                    let marker = if section.id == self.section { "*" } else { " " };
                    println!("{marker} {:<10} {}", section.id, section.name);
                }
            }
            "switch" if arg.is_empty() => eprintln!("Usage: /switch <id> (see /sections)"),
            "switch" => match self.controller.switch_section(arg).await {
                Ok(()) => {
                    self.section = arg.to_string();
                    self.show_section().await;
                }
                Err(e) => eprintln!("{}", switch_notice(arg, &e)),
            },
            "clear" => {
                self.controller.clear(&self.section).await?;
                println!("Cleared {} history.", self.section_name());
                self.warn_persistence().await;
            }
            "export" => {
                let format = if arg.is_empty() {
                    ExportFormat::Txt
                } else {
                    match ExportFormat::from_str(arg, true) {
                        Ok(format) => format,
                        Err(_) => {
                            eprintln!("Unknown export format: {arg}");
                            return Ok(Flow::Continue);
                        }
                    }
                };
                let dir = self.config.export_dir();
                match write_export(&self.controller, &self.section, format, &dir).await {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(e) => eprintln!("Export failed: {e}"),
                }
            }
            "examples" => {
                if let Some(section) = self.controller.catalog().get(&self.section) {
                    for example in &section.example_queries {
                        println!("  {example}");
                    }
                }
            }
            other => eprintln!("Unknown command: /{other} (try /help)"),
        }
        Ok(Flow::Continue)
    }

    /// Print `answer`, following its reveal until it completes or the user
    /// types. An answer whose reveal already ended is printed whole.
    async fn print_reveal(
        &self,
        answer: &RevealRef,
        lines: &mut Lines<BufReader<Stdin>>,
    ) -> anyhow::Result<Interrupt> {
        let mut printed = 0;
        let mut interrupt = Interrupt::Finished;

        print!("Assistant: ");
        std::io::stdout().flush()?;

        let frames = self
            .controller
            .reveal_frames()
            .await
            .filter(|frames| frames.borrow().target == *answer);
        if let Some(mut frames) = frames {
            loop {
                tokio::select! {
                    changed = frames.changed() => {
                        let frame = frames.borrow_and_update().clone();
                        if let Some(delta) = frame.shown.get(printed..) {
                            print!("{delta}");
                            std::io::stdout().flush()?;
                        }
                        printed = frame.shown.len();
                        if changed.is_err() || frame.complete {
                            break;
                        }
                    }
                    line = lines.next_line() => {
                        self.controller.cancel_reveal().await;
                        interrupt = match line? {
                            Some(line) => Interrupt::Line(line),
                            None => Interrupt::Eof,
                        };
                        break;
                    }
                }
            }
        }

        let messages = self.controller.snapshot(&answer.section_id).await;
        if let Some(rest) = unprinted(&messages, answer, printed) {
            print!("{rest}");
        }
        println!("\n");
        Ok(interrupt)
    }

    async fn show_section(&self) {
        println!("=== {} ===", self.section_name());
        for message in self.controller.view(&self.section).await {
            print_message(&message);
        }
    }

    async fn warn_persistence(&mut self) {
        if self.warned_persistence {
            return;
        }
        if let Some(e) = self.controller.persistence_status().await {
            debug!("{e}");
            eprintln!("{}", e.user_notice());
            self.warned_persistence = true;
        }
    }

    fn section_name(&self) -> &str {
        self.controller
            .catalog()
            .get(&self.section)
            .map_or(self.section.as_str(), |s| s.name.as_str())
    }
}

fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("> {}", message.content),
        Role::Assistant => println!("{}: {}\n", message.role.label(), message.content),
    }
}

/// The part of `answer` not yet on screen after `printed` bytes of it.
fn unprinted<'a>(messages: &'a [Message], answer: &RevealRef, printed: usize) -> Option<&'a str> {
    messages
        .get(answer.index)
        .and_then(|m| m.content.get(printed..))
}

fn switch_notice(section_id: &str, error: &SessionError) -> String {
    match error {
        SessionError::Validation(ValidationError::UnknownSection(_)) => {
            format!("No section named {section_id:?} (see /sections)")
        }
        other => format!("Cannot switch to {section_id}: {other}"),
    }
}
