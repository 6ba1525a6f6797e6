//! Chat command - Interactive refund conversation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use refund_chat::{BotConfig, ChatError, ConversationManager, JsonProfileStore};
use refund_engine::TurnOutcome;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Args)]
pub struct ChatArgs {
    /// Customer to load from the customer data file
    #[arg(long)]
    customer: Option<String>,

    /// Customer data file (overrides configuration)
    #[arg(long)]
    customer_data: Option<PathBuf>,

    /// Export the conversation when the session ends
    #[arg(long)]
    export_on_exit: bool,
}

/// Words typed at the prompt that are handled by the loop itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quit,
    Help,
    Status,
    Reset,
    Export,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "quit" | "exit" => Some(Command::Quit),
            "help" => Some(Command::Help),
            "status" => Some(Command::Status),
            "reset" => Some(Command::Reset),
            "export" => Some(Command::Export),
            _ => None,
        }
    }
}

pub async fn execute(args: ChatArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = BotConfig::load(config_path)?;
    if let Some(path) = args.customer_data {
        config.customer_data_file = path;
    }
    config.ensure_directories()?;

    let profiles = JsonProfileStore::new(&config.customer_data_file);
    let mut manager = ConversationManager::from_config(&config, &profiles, args.customer).await?;

    print_banner();
    let reply = manager.start().await?;
    println!("Bot: {}\n", reply.text);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match Command::parse(input) {
            Some(Command::Quit) => break,
            Some(Command::Help) => print_help(manager.max_turns()),
            Some(Command::Status) => print_status(&manager),
            Some(Command::Reset) => {
                let reply = manager.reset().await?;
                println!("Conversation reset.\nBot: {}\n", reply.text);
            }
            Some(Command::Export) => {
                let path = manager.export()?;
                println!("Conversation exported to: {}\n", path.display());
            }
            None => match manager.handle_message(input).await {
                Ok(reply) => {
                    if config.debug_mode {
                        let status = manager.status();
                        println!("[debug] {} at {} after {} hops", status.state, status.current_node, status.hops);
                    }
                    println!("Bot: {}\n", reply.text);
                    if let TurnOutcome::Decision { .. } = reply.outcome {
                        println!("You can type 'reset' to start a new request or 'quit' to exit.\n");
                    }
                }
                Err(ChatError::TurnLimitReached(max)) => {
                    println!(
                        "We've reached the limit of {} messages. Type 'reset' to start over or 'export' to save this conversation.\n",
                        max
                    );
                }
                Err(e) if e.is_recoverable() => {
                    println!("Sorry, something went wrong: {}. Please try again.\n", e);
                }
                Err(e) => return Err(e.into()),
            },
        }
    }

    if args.export_on_exit {
        let path = manager.export()?;
        info!("Conversation exported to {}", path.display());
    }
    println!("Goodbye! Thank you for using the refund bot.");
    Ok(())
}

fn print_prompt() {
    use std::io::Write;
    print!("You: ");
    let _ = std::io::stdout().flush();
}

fn print_banner() {
    println!("{}", "=".repeat(68));
    println!("           DECISION TREE REFUND BOT");
    println!("{}", "=".repeat(68));
    println!();
    println!("Commands:");
    println!("  'status'  - Show conversation progress");
    println!("  'reset'   - Start new conversation");
    println!("  'export'  - Save conversation history");
    println!("  'help'    - Show detailed help");
    println!("  'quit'    - Exit the system");
    println!("{}", "-".repeat(68));
}

fn print_help(max_turns: u32) {
    println!();
    println!("Describe your refund request in your own words, for example:");
    println!("  \"My laptop arrived broken and I paid with my credit card.\"");
    println!();
    println!("I'll ask only for what I still need. Short answers such as");
    println!("'yes' or 'no' are read against the last question asked.");
    println!("A conversation allows up to {} messages.", max_turns);
    println!();
    println!("  'status' - Show current conversation progress");
    println!("  'reset'  - Start a new conversation");
    println!("  'export' - Save conversation history");
    println!("  'help'   - Show this help message");
    println!("  'quit'   - Exit the system");
    println!();
}

fn print_status(manager: &ConversationManager) {
    let status = manager.status();
    println!();
    println!(
        "Customer: {}",
        status.customer_id.as_deref().unwrap_or("unknown")
    );
    println!("Messages: {} / {}", status.turns, manager.max_turns());
    println!("State:    {} at {}", status.state, status.current_node);
    println!("Hops:     {}", status.hops);
    println!("Known facts:");
    for (key, value) in &status.facts {
        println!("  {}: {}", key, value);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("quit"), Some(Command::Quit));
        assert_eq!(Command::parse("  EXIT "), Some(Command::Quit));
        assert_eq!(Command::parse("Status"), Some(Command::Status));
        assert_eq!(Command::parse("reset"), Some(Command::Reset));
        assert_eq!(Command::parse("export"), Some(Command::Export));
        assert_eq!(Command::parse("help"), Some(Command::Help));
        assert_eq!(Command::parse("my phone broke"), None);
    }
}
