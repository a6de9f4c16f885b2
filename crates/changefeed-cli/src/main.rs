//! Changefeed CLI - read change feed logs from a local container directory.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod location;
mod output;

use commands::{cursor, dump_chunk, last_consumable, list, pages};

#[derive(Parser)]
#[command(name = "changefeed")]
#[command(about = "Read change feed logs stored in a container directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events in a time window
    List {
        /// Container root directory
        root: String,
        /// Read segments from the hour containing this time (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// Do not read segments after this time (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        /// Resume from a continuation token instead of a time window
        #[arg(long, conflicts_with_all = ["start", "end"])]
        cursor: Option<String>,
        /// Only show events of this type
        #[arg(long)]
        event_type: Option<String>,
        /// Stop after N events (default: unlimited)
        #[arg(long)]
        max_events: Option<u64>,
        /// Container name used in segment manifests
        #[arg(long, default_value = "changefeed")]
        container: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read events page by page and print one summary line per page
    Pages {
        /// Container root directory
        root: String,
        /// Read segments from the hour containing this time (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// Do not read segments after this time (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        /// Resume from a continuation token instead of a time window
        #[arg(long, conflicts_with_all = ["start", "end"])]
        cursor: Option<String>,
        /// Events per page (default: 5000)
        #[arg(long)]
        page_size: Option<usize>,
        /// Container name used in segment manifests
        #[arg(long, default_value = "changefeed")]
        container: String,
    },
    /// Show the latest complete segment time
    LastConsumable {
        /// Container root directory
        root: String,
    },
    /// Decode a continuation token
    Cursor {
        /// Token printed by `list` or `pages`
        token: String,
    },
    /// Decode a local chunk file block by block
    DumpChunk {
        /// Path to chunk file
        file: String,
        /// Output records as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List {
            root,
            start,
            end,
            cursor,
            event_type,
            max_events,
            container,
            json,
        } => {
            list::run(list::ListArgs {
                root,
                start,
                end,
                cursor,
                event_type,
                max_events,
                container,
                json,
            })
            .await
        }
        Commands::Pages {
            root,
            start,
            end,
            cursor,
            page_size,
            container,
        } => pages::run(root, start, end, cursor, page_size, container).await,
        Commands::LastConsumable { root } => last_consumable::run(root).await,
        Commands::Cursor { token } => cursor::run(token),
        Commands::DumpChunk { file, json } => dump_chunk::run(file, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
