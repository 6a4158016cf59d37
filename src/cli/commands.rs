//! CLI command implementations.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::cli::{Profile, QueryKind};
use crate::client::AnnotationClient;
use crate::config::Settings;
use crate::delete::{DeleteEvent, DeleteReport, DeletionWalker};
use crate::fetch::ConcurrentFetcher;
use crate::retrieve::AnnotationReader;
use crate::service::ServiceEndpoints;
use crate::transform::{self, TransformPipeline};

fn build_reader(settings: &Settings) -> (AnnotationClient, AnnotationReader) {
    let client = AnnotationClient::new(settings.request_timeout());
    let fetcher = ConcurrentFetcher::new(settings.connector_limit, settings.request_timeout());
    (client.clone(), AnnotationReader::new(client, fetcher))
}

/// Fetch a container or search result and print an annotation list.
#[allow(clippy::too_many_arguments)]
pub async fn cmd_list(
    settings: &Settings,
    query: &str,
    by: QueryKind,
    profile: Profile,
    specific_resources: bool,
    fake_selector: Option<String>,
    request_uri: Option<String>,
) -> anyhow::Result<()> {
    let endpoints = ServiceEndpoints::new(&settings.service_uri)?;
    let query_url = match by {
        QueryKind::Container => endpoints.container(query)?,
        QueryKind::Target => endpoints.search_by_target(query)?,
        QueryKind::Body => endpoints.search_by_body(query)?,
    };

    let (_, reader) = build_reader(settings);
    let items = reader.query_items(&query_url).await?;

    let request_uri = request_uri.unwrap_or_else(|| query_url.to_string());
    let fake_selector = fake_selector.or_else(|| settings.fake_selector.clone());

    let list = match profile {
        Profile::Mirador => {
            let pipeline = if specific_resources {
                TransformPipeline::specific_resource(fake_selector)
            } else {
                TransformPipeline::mirador(fake_selector)
            };
            pipeline.annotation_list(items.iter(), &request_uri)
        }
        Profile::Linking => transform::linking_list(items.iter(), &request_uri),
    };

    match list {
        Some(list) => {
            println!("{}", serde_json::to_string_pretty(&list)?);
            Ok(())
        }
        None => {
            eprintln!("{} No annotations for {}", style("✗").red(), query_url);
            anyhow::bail!("no content");
        }
    }
}

/// Delete every annotation for a target or manifest, with a progress bar
/// fed by the walker's events.
pub async fn cmd_delete(
    settings: &Settings,
    target: Option<String>,
    manifest: Option<String>,
    container: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let endpoints = ServiceEndpoints::new(&settings.service_uri)?;
    let (client, reader) = build_reader(settings);

    if dry_run {
        println!(
            "{} Dry run: no annotations will be deleted",
            style("→").cyan()
        );
    }

    let (event_tx, mut event_rx) = mpsc::channel::<DeleteEvent>(64);
    let walker = DeletionWalker::new(client, reader, dry_run).with_events(event_tx);

    let handle = tokio::spawn(async move {
        match (target, manifest, container) {
            (Some(target), _, _) => walker
                .delete_by_target(&endpoints, &target)
                .await
                .map(|report| vec![report]),
            (None, Some(manifest), _) => walker.delete_by_manifest(&endpoints, &manifest).await,
            (None, None, Some(container)) => walker
                .delete_by_container(&endpoints, Some(container.as_str()), None)
                .await
                .map(|report| vec![report]),
            (None, None, None) => Ok(Vec::new()),
        }
    });

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    while let Some(event) = event_rx.recv().await {
        match event {
            DeleteEvent::Discovered { count } => {
                pb.inc_length(count as u64);
            }
            DeleteEvent::Deleted { id, status, .. } => {
                pb.set_message(truncate(&id, 48));
                if status != Some(204) {
                    pb.println(format!(
                        "{} {} -> {}",
                        style("✗").red(),
                        id,
                        status.map_or_else(|| "no response".to_string(), |s| s.to_string())
                    ));
                }
                pb.inc(1);
            }
        }
    }
    pb.finish_and_clear();

    let reports: Vec<DeleteReport> = handle.await??;
    let attempted: usize = reports.iter().map(|report| report.outcomes.len()).sum();
    let failed: usize = reports.iter().map(DeleteReport::failed_count).sum();

    if failed == 0 {
        println!(
            "{} Deleted {} annotations{}",
            style("✓").green(),
            attempted,
            if dry_run { " (dry run)" } else { "" }
        );
        Ok(())
    } else {
        println!(
            "{} {} of {} deletes failed",
            style("✗").red(),
            failed,
            attempted
        );
        anyhow::bail!("could not delete all annotations");
    }
}

/// List distinct manifest URIs annotated with a topic.
pub async fn cmd_manifests(settings: &Settings, topic: &str) -> anyhow::Result<()> {
    let endpoints = ServiceEndpoints::new(&settings.service_uri)?;
    let (_, reader) = build_reader(settings);

    let manifests = reader.manifests_by_topic(&endpoints, topic).await?;
    if manifests.is_empty() {
        eprintln!("{} No manifests for {}", style("✗").red(), topic);
        anyhow::bail!("no content");
    }
    for manifest in manifests {
        println!("{}", manifest);
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", truncated)
    }
}
