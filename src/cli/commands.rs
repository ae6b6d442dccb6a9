//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use std::sync::Arc;

use crate::cluster::ClusterClient;
use crate::core::{Config, Result, UserMessage};
use crate::history::QueryType;
use crate::llm::models::get_model_presets;
use crate::session::ConversationService;

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Start over with a fresh session
    NewSession,
    /// Exit the REPL
    Exit,
}

/// What a command may look at or act on
pub struct CommandContext<'a> {
    pub service: &'a ConversationService,
    pub client: &'a Arc<dyn ClusterClient>,
    pub session_id: &'a str,
    pub config: &'a Config,
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, ctx: &CommandContext<'_>) -> Result<CommandResult> {
    let input = input.trim();
    let (cmd, args) = match input.split_once(' ') {
        Some((cmd, args)) => (cmd, args.trim()),
        None => (input, ""),
    };
    let cmd = cmd.trim_start_matches('/').to_lowercase();

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "new" | "reset" => Ok(CommandResult::NewSession),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "models" => Ok(CommandResult::Handled(list_models(ctx.config))),

        "history" => {
            let records = ctx.service.history().read_all(ctx.session_id).await?;
            if records.is_empty() {
                return Ok(CommandResult::Handled("No history yet.".to_string()));
            }
            let lines = records
                .iter()
                .map(|r| match r.kind {
                    QueryType::UserQuery => format!("[{:>7.2}s] you: {}", r.timestamp, r.query),
                    QueryType::AiResponse => format!(
                        "[{:>7.2}s] agent answered '{}' ({} bytes)",
                        r.timestamp,
                        r.query,
                        r.response.len()
                    ),
                })
                .collect::<Vec<_>>();
            Ok(CommandResult::Handled(lines.join("\n")))
        }

        "questions" => {
            let Some(message) = resource_message(args) else {
                return Ok(CommandResult::Handled(
                    "Usage: questions <kind> [name] [namespace]\n\
                     Example: questions Pod my-pod default"
                        .to_string(),
                ));
            };
            let questions = ctx
                .service
                .new_conversation(ctx.session_id, ctx.client.clone(), message)
                .await?;
            if questions.is_empty() {
                return Ok(CommandResult::Handled("No suggestions.".to_string()));
            }
            let output = questions
                .iter()
                .enumerate()
                .map(|(i, q)| format!("  {}. {}", i + 1, q))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(CommandResult::Handled(format!("You could ask:\n{}", output)))
        }

        "status" => {
            let started = ctx.service.session(ctx.session_id).await.is_some();
            let status = format!(
                "Companion Status:\n\
                 ─────────────────────────────\n\
                 Model:    {}\n\
                 Agent:    {}\n\
                 Cluster:  {}\n\
                 Session:  {}{}\n\
                 History:  {:?}",
                ctx.config.model.name,
                ctx.config.agent.name,
                ctx.client.api_server(),
                ctx.session_id,
                if started { "" } else { " (no turns yet)" },
                ctx.config.history.backend,
            );
            Ok(CommandResult::Handled(status))
        }

        _ => {
            // Not a command, treat as normal input
            if input.starts_with('/') {
                Ok(CommandResult::Handled(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                )))
            } else {
                Ok(CommandResult::Continue(input.to_string()))
            }
        }
    }
}

/// `<kind> [name] [namespace]` into the message that opens a conversation
fn resource_message(args: &str) -> Option<UserMessage> {
    let mut parts = args.split_whitespace();
    let kind = parts.next()?;
    let name = parts.next();
    let namespace = parts.next();

    let query = match name {
        Some(name) => format!("Tell me about {} {}", kind, name),
        None => format!("Tell me about my {} resources", kind),
    };
    Some(UserMessage {
        query,
        resource_kind: Some(kind.to_string()),
        resource_api_version: None,
        resource_name: name.map(str::to_string),
        namespace: namespace.map(str::to_string),
    })
}

/// Generate help text
fn help_text() -> String {
    r#"Companion Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit Companion
  new, reset       Start a new session
  status           Show current configuration
  models           List supported models
  history          Show this session's history

  questions <kind> [name] [namespace]
                   Open the session on a resource and get
                   suggested questions

Anything else is sent to the agent.

Keyboard Shortcuts:
  Ctrl+D           Exit Companion
─────────────────────────────────────────────"#
        .to_string()
}

/// Supported models, current one marked
fn list_models(config: &Config) -> String {
    let mut output = String::from("Supported models:\n");
    for preset in get_model_presets() {
        let marker = if preset.name == config.model.name { "*" } else { " " };
        output.push_str(&format!(
            " {} {} ({}){}\n",
            marker,
            preset.name,
            preset.display_name,
            if preset.supports_tools { "" } else { " - no tool calling" }
        ));
    }
    output
}
