//! annolist - annotation retrieval and reshaping client.
//!
//! Command-line front end for querying a W3C Web Annotation server and
//! reshaping the results into IIIF-style annotation lists, plus bulk
//! deletion workflows.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if annolist::cli::is_verbose() {
        "annolist=info"
    } else {
        "annolist=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    annolist::cli::run().await
}
