//! Work-ID CLI
//!
//! Command-line client for a Work-ID record store kept in a local
//! directory.
//!
//! # Commands
//!
//! - `new-id` - Preview an unused record id
//! - `create` / `get` / `update` / `delete` - Record CRUD
//! - `list` / `search` - Paginated listing and free-text search
//! - `fields` - Show the configured meta fields
//! - `reconcile` - Repair the owner index
//! - `compact` - Rewrite the journal to its live contents
//!
//! Meta fields and store settings come from `META_SEL_*`, `META_MSEL_*`,
//! `WORK_ID_PATTERN`, `RECORD_PREFIX`, `OWNER_INDEX_PREFIX`,
//! `DEFAULT_PUBLIC` and `PER_PAGE`.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CliError, EditArgs, Session};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Work-ID record store client.
#[derive(Parser)]
#[command(name = "workid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Identity performing the command
    #[arg(global = true, long = "as", value_name = "CREATOR")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an unused record id
    NewId,

    /// Create a record owned by --as
    Create {
        /// Title of the record
        #[arg(short, long)]
        title: Option<String>,

        /// Use this id instead of a generated one
        #[arg(long)]
        id: Option<String>,

        /// Hide the record from other identities
        #[arg(long)]
        private: bool,

        #[command(flatten)]
        edit: EditArgs,
    },

    /// Show one record
    Get {
        /// Record id
        id: String,
    },

    /// Change a record owned by --as
    Update {
        /// Record id
        id: String,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// Remove the description
        #[arg(long, conflicts_with = "description")]
        clear_description: bool,

        /// Set visibility (true or false)
        #[arg(long)]
        public: Option<bool>,

        /// Fail unless the record is at this version
        #[arg(long)]
        expect_version: Option<u64>,

        #[command(flatten)]
        edit: EditArgs,
    },

    /// Delete a record (only its creator may, when --as is given)
    Delete {
        /// Record id
        id: String,
    },

    /// List records, most recently changed first
    List {
        /// Only records created by --as
        #[arg(short, long)]
        mine: bool,

        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,

        /// Records per page
        #[arg(long)]
        per_page: Option<usize>,
    },

    /// Search records; every term must match
    Search {
        /// Query text; quote phrases to keep them together
        #[arg(default_value = "")]
        query: String,

        /// Only records created by --as
        #[arg(short, long)]
        mine: bool,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show the configured meta fields
    Fields,

    /// Repair the owner index
    Reconcile,

    /// Rewrite the journal to its live contents
    Compact,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("Work-ID CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("Work-ID Core v{}", workid_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or(CliError::Usage("--path is required"))?;
    let session = Session::open(&path)?;
    let actor = cli.actor.as_deref();

    match cli.command {
        Commands::NewId => commands::records::new_id(&session)?,
        Commands::Create {
            title,
            id,
            private,
            edit,
        } => commands::records::create(&session, actor, title, id, private, &edit)?,
        Commands::Get { id } => commands::records::get(&session, &id)?,
        Commands::Update {
            id,
            title,
            clear_description,
            public,
            expect_version,
            edit,
        } => {
            let patch = commands::records::patch_from_args(
                &session,
                title,
                clear_description,
                public,
                expect_version,
                &edit,
            )?;
            commands::records::update(&session, actor, &id, &patch)?;
        }
        Commands::Delete { id } => commands::records::delete(&session, actor, &id)?,
        Commands::List {
            mine,
            page,
            per_page,
        } => commands::query::list(&session, actor, mine, page, per_page)?,
        Commands::Search { query, mine, limit } => {
            commands::query::search(&session, actor, query, mine, limit)?;
        }
        Commands::Fields => commands::maintenance::fields(&session)?,
        Commands::Reconcile => commands::maintenance::reconcile(&session)?,
        Commands::Compact => commands::maintenance::compact(&session)?,
        Commands::Version => {}
    }

    Ok(())
}
