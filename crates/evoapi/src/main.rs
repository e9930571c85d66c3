//! evoapi - command-line client for an Evolution API instance.
//!
//! Every command forwards to EvolutionClient and prints JSON to stdout.
//! Logs go to stderr.
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial implementation

use clap::{Parser, Subcommand};
use evoapi::output::{self, OutputControls};
use evoapi_core::client::DEFAULT_MESSAGE_LIMIT;
use evoapi_core::{EvolutionClient, EvolutionConfig, EvolutionError, MediaType, PresenceStatus};
use serde_json::{json, Value};
use std::process::ExitCode;

/// Command-line client for an Evolution API instance.
#[derive(Parser, Debug)]
#[command(name = "evoapi")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Compact JSON output (no whitespace)
    #[arg(long, global = true)]
    compact: bool,

    /// Comma-separated field allowlist
    #[arg(long, global = true)]
    fields: Option<String>,

    /// Truncate text fields to this length
    #[arg(long, global = true)]
    max_text_chars: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    // =========================================================================
    // MESSAGING COMMANDS
    // =========================================================================
    /// Send a text message
    SendText {
        /// Phone number in international format (e.g., 5511999999999)
        number: String,

        /// Message to send
        text: Vec<String>,

        /// Disable link previews
        #[arg(long)]
        no_link_preview: bool,
    },

    /// Send an image, video, document or audio by URL
    SendMedia {
        /// Phone number in international format
        number: String,

        /// Public URL of the media
        url: String,

        /// Media type (image, video, document, audio)
        #[arg(short = 't', long = "type")]
        media_type: String,

        /// Caption (max 1024 characters)
        #[arg(short, long)]
        caption: Option<String>,

        /// File name shown for documents
        #[arg(short, long)]
        filename: Option<String>,
    },

    // =========================================================================
    // READING COMMANDS
    // =========================================================================
    /// List chats, filling missing names from contacts
    Chats {
        /// Skip contact name enrichment
        #[arg(long)]
        no_enrich: bool,
    },

    /// List contacts
    Contacts {
        /// Only this contact jid (e.g., 5511999999999@s.whatsapp.net)
        #[arg(long)]
        id: Option<String>,
    },

    /// Resolve a phone number to a contact name
    Resolve {
        /// Phone number
        number: String,

        /// Always ask the server
        #[arg(long)]
        no_cache: bool,
    },

    /// Get messages with a phone number
    Messages {
        /// Phone number
        number: String,

        /// Max messages
        #[arg(short, long, default_value_t = DEFAULT_MESSAGE_LIMIT)]
        limit: u32,
    },

    /// Search messages
    Search {
        /// Text to search for
        #[arg(short, long)]
        query: Option<String>,

        /// Restrict to one chat jid
        #[arg(long)]
        chat_id: Option<String>,

        /// Max messages
        #[arg(short, long, default_value_t = DEFAULT_MESSAGE_LIMIT)]
        limit: u32,
    },

    // =========================================================================
    // INSTANCE COMMANDS
    // =========================================================================
    /// Show connection state
    Status,

    /// Show instance name and state
    Info,

    /// Set presence (available, unavailable, composing, recording)
    Presence {
        status: String,

        /// Send presence to this number only
        #[arg(short, long)]
        number: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let output_controls = OutputControls {
        compact: cli.compact,
        fields: cli.fields.clone(),
        max_text_chars: cli.max_text_chars,
    };

    let config = match EvolutionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Required environment variables:");
            eprintln!("  - EVOLUTION_BASE_URL");
            eprintln!("  - EVOLUTION_API_TOKEN");
            eprintln!("  - EVOLUTION_INSTANCE_NAME");
            return ExitCode::from(2);
        }
    };

    let result = EvolutionClient::from_config(&config).and_then(|client| run(&client, cli.command));

    match result {
        Ok(value) => {
            output_controls.print(&value);
            ExitCode::from(0)
        }
        Err(e) => {
            println!("{}", output::format_error(&e));
            ExitCode::from(1)
        }
    }
}

fn run(client: &EvolutionClient, command: Command) -> Result<Value, EvolutionError> {
    match command {
        Command::SendText { number, text, no_link_preview } => {
            client.send_text(&number, &text.join(" "), !no_link_preview)
        }
        Command::SendMedia { number, url, media_type, caption, filename } => {
            let media_type: MediaType = media_type.parse()?;
            client.send_media(&number, &url, media_type, caption.as_deref(), filename.as_deref())
        }
        Command::Chats { no_enrich } => Ok(json!(client.list_chats(!no_enrich)?)),
        Command::Contacts { id } => Ok(json!(client.fetch_contacts(id.as_deref())?)),
        Command::Resolve { number, no_cache } => {
            let name = client.resolve_name(&number, !no_cache)?;
            Ok(json!({ "number": number, "name": name }))
        }
        Command::Messages { number, limit } => client.messages_by_number(&number, limit),
        Command::Search { query, chat_id, limit } => {
            client.find_messages(query.as_deref(), chat_id.as_deref(), limit)
        }
        Command::Status => client.connection_state(),
        Command::Info => client.instance_info(),
        Command::Presence { status, number } => {
            let status: PresenceStatus = status.parse()?;
            client.set_presence(status, number.as_deref())
        }
    }
}
