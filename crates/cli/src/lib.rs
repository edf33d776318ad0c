pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "nexus",
    about = "Nexus travel assistant CLI",
    long_about = "Chat with the travel assistant, classify messages, inspect configuration, and run readiness checks.",
    after_help = "Examples:\n  nexus chat\n  nexus ask \"what is the baggage policy for pets\"\n  nexus classify \"cancel my flight to Delhi\"\n  nexus doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive chat session (exit/quit to leave, clear, cache)")]
    Chat,
    #[command(about = "Answer a single message and print a structured result")]
    Ask {
        #[arg(required = true, trailing_var_arg = true, help = "Message text")]
        message: Vec<String>,
    },
    #[command(about = "Print the intents detected in a message without answering it")]
    Classify {
        #[arg(required = true, trailing_var_arg = true, help = "Message text")]
        message: Vec<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, LLM credentials, and tool server readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    // A missing .env is normal outside local development.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat => commands::chat::run(),
        Command::Ask { message } => commands::ask::run(&message.join(" ")),
        Command::Classify { message } => commands::classify::run(&message.join(" ")),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
