//! Interactive REPL for Companion
//!
//! Provides the main user interaction loop.

use futures::StreamExt;
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cli::commands::{handle_command, CommandContext, CommandResult};
use crate::cluster::ClusterClient;
use crate::core::{Config, Result, UserMessage};
use crate::session::ConversationService;

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    config: Config,
    service: ConversationService,
    client: Arc<dyn ClusterClient>,
    session_id: String,
}

impl Repl {
    pub fn new(
        config: Config,
        service: ConversationService,
        client: Arc<dyn ClusterClient>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            config,
            service,
            client,
            session_id: session_id.unwrap_or_else(new_session_id),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send one query and print the agent's progress as it arrives
    pub async fn ask(&self, query: &str) -> Result<()> {
        let mut chunks = self.service.handle_request(
            &self.session_id,
            UserMessage::new(query),
            self.client.clone(),
        );

        let mut stdout = io::stdout();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if let Some(line) = render_chunk(&chunk) {
                println!("{}", line);
                stdout.flush()?;
            }
        }
        Ok(())
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            let ctx = CommandContext {
                service: &self.service,
                client: &self.client,
                session_id: &self.session_id,
                config: &self.config,
            };

            match handle_command(input, &ctx).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::NewSession) => {
                    self.service.end_session(&self.session_id).await;
                    self.session_id = new_session_id();
                    println!("Started session {}.\n", self.session_id);
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::Continue(query)) => {
                    println!();
                    if let Err(e) = self.ask(&query).await {
                        eprintln!("\nError: {}\n", e);
                    } else {
                        println!();
                    }
                }
                Err(e) => {
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        self.service.end_session(&self.session_id).await;
        Ok(())
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!("Companion - Kubernetes companion agent");
        println!("─────────────────────────────────────────────");
        println!("Ollama:   {}", self.config.ollama_url());
        println!("Model:    {}", self.config.model.name);
        println!("Cluster:  {}", self.client.api_server());
        println!("Session:  {}", self.session_id);
        println!();
        println!("Commands: help, questions, history, status, new, exit");
        println!("─────────────────────────────────────────────");
    }
}

/// Session id derived from the current time
fn new_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("cli-{}", millis)
}

/// Human-readable form of one output chunk
///
/// Chunks are JSON lines `{"node": ..., "messages": [...]}`; anything else is
/// shown as is.
pub fn render_chunk(chunk: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(chunk);
    let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
        return Some(text.trim_end().to_string());
    };

    let node = value["node"].as_str().unwrap_or_default();
    let messages = value["messages"].as_array()?;

    let lines: Vec<String> = messages
        .iter()
        .filter_map(|m| {
            let content = m["content"].as_str().unwrap_or_default();
            match (node, m["role"].as_str()) {
                ("tools", _) => {
                    let name = m["name"].as_str().unwrap_or("tool");
                    Some(format!("  ↳ {} returned {} bytes", name, content.len()))
                }
                (_, Some("assistant")) => {
                    let calls = m["tool_calls"].as_array().map(Vec::len).unwrap_or(0);
                    if calls > 0 {
                        let names: Vec<&str> = m["tool_calls"]
                            .as_array()
                            .into_iter()
                            .flatten()
                            .filter_map(|c| c["name"].as_str())
                            .collect();
                        Some(format!("  ⚙ calling {}", names.join(", ")))
                    } else if content.is_empty() {
                        None
                    } else {
                        Some(format!("Assistant:\n{}", content))
                    }
                }
                _ => None,
            }
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
