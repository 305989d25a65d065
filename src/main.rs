//! # Crate Digger CLI (`digger`)
//!
//! ## Usage
//!
//! ```bash
//! digger --config ./config/digger.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `digger identify <PHOTOS>...` | Identify a record through the clarification loop |
//! | `digger collection list` | List saved records |
//! | `digger collection show <ID>` | Print one record as JSON |
//! | `digger collection remove <ID>` | Delete a record |
//! | `digger export` | Write the collection ZIP snapshot |
//! | `digger discogs whoami` | Show the Discogs account behind the token |
//! | `digger discogs search <QUERY>` | Search Discogs releases |
//! | `digger discogs collection` | Page through your Discogs collection |
//! | `digger discogs add <ID>` | Add a release to your Discogs collection |
//! | `digger discogs want <ID>` | Add a release to your wantlist |
//! | `digger discogs sell <ID>` | Create a marketplace listing |
//!
//! ## Examples
//!
//! ```bash
//! # Identify from front and back covers, save without asking
//! digger identify front.jpg back.jpg --save --condition VG+
//!
//! # Export without the remote collection, JSON progress on stderr
//! digger export --no-discogs --progress json
//!
//! # List a release as a draft
//! digger discogs sell 249504 --condition NM --sleeve VG+ --price 35 --draft
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use crate_digger::catalog::{Condition, SleeveCondition};
use crate_digger::catalog_cmd::{self, SellArgs};
use crate_digger::identify::{self, IdentifyOptions};
use crate_digger::progress::ProgressMode;
use crate_digger::{collection, config, export};

/// Crate Digger: identify vinyl pressings from photos and keep a collection.
#[derive(Parser)]
#[command(
    name = "digger",
    about = "Identify vinyl pressings from photos, keep a collection, export it as a ZIP",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/digger.toml`. A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/digger.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a terminal,
    /// otherwise `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify a record from photos.
    ///
    /// Photos (or directories of photos) are sent to the agent, which may
    /// ask clarifying questions. Answer with an option number, free text,
    /// or `@photo.jpg [text]` to attach another photo.
    Identify {
        /// Photo files or directories (front cover, back cover, labels...).
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Print each agent turn as a JSON line.
        #[arg(long)]
        json: bool,

        /// Save the result without asking.
        #[arg(long)]
        save: bool,

        /// Media condition to record (M, NM, VG+, VG, G+, G, F, P).
        #[arg(long)]
        condition: Option<Condition>,
    },

    /// Manage the local collection.
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Export the collection as `vinyl-collection-YYYY-MM-DD.zip`.
    Export {
        /// Output file. Defaults to `[export].output_dir`.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip the remote Discogs collection.
        #[arg(long)]
        no_discogs: bool,
    },

    /// Talk to Discogs directly. Requires a token in `DISCOGS_TOKEN`.
    Discogs {
        #[command(subcommand)]
        action: DiscogsAction,
    },
}

#[derive(Subcommand)]
enum CollectionAction {
    /// List saved records, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print one record as JSON.
    Show { id: String },
    /// Delete a record.
    Remove { id: String },
}

#[derive(Subcommand)]
enum DiscogsAction {
    /// Show the account and profile behind the token.
    Whoami,
    /// Search releases.
    Search { query: String },
    /// List one page of your collection.
    Collection {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Add a release to your collection.
    Add { release_id: u64 },
    /// Add a release to your wantlist.
    Want { release_id: u64 },
    /// Create a marketplace listing.
    Sell {
        release_id: u64,

        /// Media condition (M, NM, VG+, VG, G+, G, F, P).
        #[arg(long)]
        condition: Condition,

        #[arg(long)]
        price: f64,

        /// Sleeve condition: a media grade, `generic`, `not graded` or `no cover`.
        #[arg(long)]
        sleeve: Option<SleeveCondition>,

        /// Create the listing as a draft instead of for sale.
        #[arg(long)]
        draft: bool,

        #[arg(long)]
        comments: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Identify {
            images,
            json,
            save,
            condition,
        } => {
            identify::run_identify(
                &cfg,
                IdentifyOptions {
                    images,
                    json,
                    save,
                    condition,
                },
            )
            .await?;
        }
        Commands::Collection { action } => match action {
            CollectionAction::List { json } => collection::run_list(&cfg, json).await?,
            CollectionAction::Show { id } => collection::run_show(&cfg, &id).await?,
            CollectionAction::Remove { id } => collection::run_remove(&cfg, &id).await?,
        },
        Commands::Export { output, no_discogs } => {
            export::run_export(&cfg, output.as_deref(), !no_discogs, progress).await?;
        }
        Commands::Discogs { action } => match action {
            DiscogsAction::Whoami => catalog_cmd::run_whoami(&cfg).await?,
            DiscogsAction::Search { query } => catalog_cmd::run_search(&cfg, &query).await?,
            DiscogsAction::Collection { page } => catalog_cmd::run_collection(&cfg, page).await?,
            DiscogsAction::Add { release_id } => catalog_cmd::run_add(&cfg, release_id).await?,
            DiscogsAction::Want { release_id } => catalog_cmd::run_want(&cfg, release_id).await?,
            DiscogsAction::Sell {
                release_id,
                condition,
                price,
                sleeve,
                draft,
                comments,
            } => {
                catalog_cmd::run_sell(
                    &cfg,
                    SellArgs {
                        release_id,
                        condition,
                        sleeve,
                        price,
                        draft,
                        comments,
                    },
                )
                .await?
            }
        },
    }

    Ok(())
}
