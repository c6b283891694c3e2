mod config;
mod events_cmd;
mod messages_cmd;
mod status_cmd;
mod sync_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use collabsync_store::Direction;

#[derive(Parser)]
#[command(name = "collabsync", about = "Mirror remote collaboration data into a local store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize remote data into the local store
    Sync {
        /// What to sync: teams, chats, events, or all
        #[arg(default_value = "all")]
        target: String,

        /// Skip owned child collections (channels, messages, members)
        #[arg(long)]
        no_children: bool,

        /// Override the database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show when each collection was last synced, and row counts
    Status {
        /// Override the database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List locally mirrored messages of one channel (or chat)
    Messages {
        /// Channel id (or chat id with --chat)
        id: String,

        /// Query a chat instead of a team channel
        #[arg(long)]
        chat: bool,

        /// Only messages touched at or after this RFC 3339 time
        #[arg(long)]
        since: Option<String>,

        /// Only messages touched at or before this RFC 3339 time
        #[arg(long)]
        until: Option<String>,

        /// Restrict to these author ids
        #[arg(long = "author")]
        authors: Vec<String>,

        /// Case-insensitive free-text filter
        #[arg(long)]
        search: Option<String>,

        /// Oldest first instead of newest first
        #[arg(long)]
        asc: bool,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Override the database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List locally mirrored calendar events
    Events {
        /// Only events starting at or after this RFC 3339 time
        #[arg(long)]
        from: Option<String>,

        /// Only events starting at or before this RFC 3339 time
        #[arg(long)]
        to: Option<String>,

        /// Case-insensitive free-text filter
        #[arg(long)]
        search: Option<String>,

        /// Oldest first instead of newest first
        #[arg(long)]
        asc: bool,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Override the database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show or set configuration
    Config {
        /// Set the remote API base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Set the bearer token
        #[arg(long)]
        token: Option<String>,

        /// Set the database path
        #[arg(long)]
        db_path: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sync { target, no_children, db } => {
            sync_cmd::run_sync(&target, !no_children, db.as_deref()).await
        }
        Commands::Status { db } => status_cmd::run_status(db.as_deref()),
        Commands::Messages {
            id,
            chat,
            since,
            until,
            authors,
            search,
            asc,
            limit,
            offset,
            db,
        } => messages_cmd::run_messages(messages_cmd::MessagesQuery {
            id,
            chat,
            since,
            until,
            authors,
            search,
            direction: if asc { Direction::Asc } else { Direction::Desc },
            limit,
            offset,
            db,
        }),
        Commands::Events { from, to, search, asc, limit, db } => {
            events_cmd::run_events(events_cmd::EventsQuery {
                from,
                to,
                search,
                direction: if asc { Direction::Asc } else { Direction::Desc },
                limit,
                db,
            })
        }
        Commands::Config { base_url, token, db_path } => {
            if base_url.is_none() && token.is_none() && db_path.is_none() {
                config::show_config()
            } else {
                config::set_config(base_url, token, db_path)
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
