//! Command-line interface.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Settings;

/// Check for the verbose flag before clap runs, so logging can be
/// initialised first.
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Parser)]
#[command(
    name = "annolist",
    version,
    about = "Annotation retrieval and reshaping client for W3C Web Annotation servers"
)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML config file (default: ./annolist.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// How the query argument of `list` addresses the result set.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum QueryKind {
    /// An explicit container name (or the MD5 hash of a target URI)
    Container,
    /// A target URI, resolved through the search-by-target service
    Target,
    /// A topic URI, resolved through the search-by-body service
    Body,
}

/// Output profile for `list`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Profile {
    /// IIIF annotation list with Mirador-style tag bodies
    Mirador,
    /// Flattened linking records (capture-model drafts)
    Linking,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch annotations and print an annotation list as JSON
    List {
        /// Container name, target URI, or topic URI (see --by)
        query: String,

        /// How to interpret the query argument
        #[arg(long, value_enum, default_value_t = QueryKind::Container)]
        by: QueryKind,

        /// Output profile
        #[arg(long, value_enum, default_value_t = Profile::Mirador)]
        profile: Profile,

        /// Emit structured oa:SpecificResource targets instead of simple
        /// `on` strings (Mirador profile only)
        #[arg(long)]
        specific_resources: bool,

        /// Selector substituted for selector-less targets (overrides config)
        #[arg(long)]
        fake_selector: Option<String>,

        /// Value for the envelope @id (default: the service query URI)
        #[arg(long)]
        request_uri: Option<String>,
    },

    /// Delete every annotation for a target, container, or IIIF manifest
    Delete {
        /// Target URI to sweep (searched, not container-addressed)
        #[arg(
            long,
            required_unless_present_any = ["manifest", "container"],
            conflicts_with_all = ["manifest", "container"]
        )]
        target: Option<String>,

        /// IIIF manifest URI: sweep every canvas, then the manifest itself
        #[arg(long, conflicts_with = "container")]
        manifest: Option<String>,

        /// Container name to sweep directly
        #[arg(long)]
        container: Option<String>,

        /// Log what would be deleted without issuing any DELETE
        #[arg(long)]
        dry_run: bool,
    },

    /// List distinct manifest URIs annotated with a topic
    Manifests {
        /// Topic URI (body source)
        topic: String,
    },
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::List {
            query,
            by,
            profile,
            specific_resources,
            fake_selector,
            request_uri,
        } => {
            commands::cmd_list(
                &settings,
                &query,
                by,
                profile,
                specific_resources,
                fake_selector,
                request_uri,
            )
            .await
        }
        Command::Delete {
            target,
            manifest,
            container,
            dry_run,
        } => commands::cmd_delete(&settings, target, manifest, container, dry_run).await,
        Command::Manifests { topic } => commands::cmd_manifests(&settings, &topic).await,
    }
}
