//! CLI entry point for `msgbridge`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use msgbridge::config;
use msgbridge::db::MessageStore;
use msgbridge::event::MessageEvent;
use msgbridge::model::message::{Message, ReadReceipt};
use msgbridge::render::convert::convert_message;
use msgbridge::render::part::{MessagePart, NoopUploader};
use msgbridge::watch::{watch_messages, EventSink, WatchOptions};

#[derive(Parser)]
#[command(name = "msgbridge", version, about = "Bridge the local chat database into a federated network")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the chat database (defaults to config, then the standard location)
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the database and print translated events as JSON lines
    Watch,
    /// Convert stored messages and print them as JSON
    Backfill {
        /// Only rows above this row id
        #[arg(long, default_value_t = 0)]
        after_row: i64,
        /// Stop after this many messages
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decode a typedstream blob from a file and dump its components
    Decode { path: PathBuf },
    /// Show database statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    let db_path = cli
        .db
        .or_else(|| config.database.path.clone())
        .unwrap_or_else(MessageStore::default_path);

    match cli.command {
        Commands::Watch => cmd_watch(&db_path, &config),
        Commands::Backfill { after_row, limit } => cmd_backfill(&db_path, after_row, limit),
        Commands::Decode { path } => cmd_decode(&path),
        Commands::Stats { json } => cmd_stats(&db_path, json),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "msgbridge.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Prints every event as one JSON line on stdout.
struct JsonLineSink;

impl EventSink for JsonLineSink {
    fn on_message(&mut self, event: MessageEvent) {
        let message = event.message();
        let line = serde_json::json!({
            "event": event.kind(),
            "guid": message.guid,
            "chat": message.chat_guid,
            "sender": message.sender.local_id,
            "date": message.created_at().to_rfc3339(),
            "parts": parts_json(&convert_message(message, "", &NoopUploader)),
        });
        println!("{line}");
    }

    fn on_read_receipt(&mut self, receipt: ReadReceipt) {
        let line = serde_json::json!({
            "event": "read-receipt",
            "chat": receipt.chat_guid,
            "read_up_to": receipt.read_up_to,
            "read_at": receipt.read_at.to_rfc3339(),
            "is_from_me": receipt.is_from_me,
        });
        println!("{line}");
    }
}

fn cmd_watch(db_path: &std::path::Path, config: &config::Config) -> anyhow::Result<()> {
    let store = MessageStore::open(db_path)?;
    let options = WatchOptions {
        debounce: std::time::Duration::from_millis(config.watch.debounce_ms),
    };
    let handle = watch_messages(store, options, Box::new(JsonLineSink))?;

    eprintln!("Watching {}; press Enter to stop.", db_path.display());
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    handle.stop();
    Ok(())
}

fn cmd_backfill(
    db_path: &std::path::Path,
    after_row: i64,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let store = MessageStore::open(db_path)?;
    let mut messages = store.messages_above_row(after_row)?;
    if let Some(limit) = limit {
        messages.truncate(limit);
    }

    for message in &messages {
        println!("{}", message_json(message));
    }
    eprintln!("{} message(s)", messages.len());
    Ok(())
}

fn cmd_decode(path: &std::path::Path) -> anyhow::Result<()> {
    let blob = std::fs::read(path)?;
    let components = msgbridge::parser::typedstream::decode_components(&blob)?;
    println!("{components:#?}");
    eprintln!("{} component(s)", components.len());
    Ok(())
}

fn cmd_stats(db_path: &std::path::Path, json: bool) -> anyhow::Result<()> {
    let store = MessageStore::open(db_path)?;
    let max_row = store.max_row_id()?;
    let max_time = store.max_message_time()?;
    let newest = msgbridge::model::message::apple_ns_to_utc(max_time);

    if json {
        let stats = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "max_row_id": max_row,
            "newest_activity": newest.to_rfc3339(),
        });
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!();
        println!("  {:<20} {}", "Database", db_path.display());
        println!("  {:<20} {}", "Max row id", max_row);
        println!("  {:<20} {}", "Newest activity", newest.format("%Y-%m-%d %H:%M:%S"));
        println!();
    }
    Ok(())
}

fn message_json(message: &Message) -> serde_json::Value {
    serde_json::json!({
        "row_id": message.row_id,
        "guid": message.guid,
        "chat": message.chat_guid,
        "date": message.created_at().to_rfc3339(),
        "text": message.attributed_body_text,
        "attachments": message.attachments.len(),
        "parts": parts_json(&convert_message(message, "", &NoopUploader)),
    })
}

fn parts_json(parts: &[MessagePart]) -> Vec<serde_json::Value> {
    parts
        .iter()
        .map(|part| {
            serde_json::json!({
                "id": part.id,
                "kind": format!("{:?}", part.kind),
                "body": part.body,
                "formatted_body": part.formatted_body,
                "mime_type": part.mime_type,
            })
        })
        .collect()
}
