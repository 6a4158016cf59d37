//! Sequential bulk deletion of discovered annotations.
//!
//! The read path (paged search or container lookup) discovers candidate
//! annotation ids; deletion itself is strictly sequential, one id at a
//! time, with a fresh conditional GET for the ETag immediately before
//! each DELETE. Deliberately not a bulk API call: slow, but it cannot
//! time out on a large result set, and every id gets its own status.

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use url::Url;

use crate::client::{AnnotationClient, FetchError, IIIF_PRESENTATION_PROFILE};
use crate::retrieve::{AnnotationReader, RetrieveError};
use crate::service::{ServiceEndpoints, ServiceError};

/// Errors raised by deletion workflows outside the per-id sweep.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Manifest {0} contained no sequences")]
    MissingSequences(String),

    #[error("Could not find canvases in manifest {0}")]
    MissingCanvases(String),
}

/// Progress events emitted during a deletion sweep.
#[derive(Debug, Clone)]
pub enum DeleteEvent {
    /// Discovery finished; the sweep will attempt this many ids.
    Discovered { count: usize },
    /// One id was processed (or simulated, on a dry run).
    Deleted {
        id: String,
        status: Option<u16>,
        dry_run: bool,
    },
}

/// Per-id outcome of a sweep. `status` is `None` when no HTTP response
/// was obtained at all (network failure on the GET or DELETE).
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub id: String,
    pub status: Option<u16>,
}

/// Aggregate report of one deletion walk.
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub outcomes: Vec<DeleteOutcome>,
}

impl DeleteReport {
    /// Overall success: every delete answered 204. Zero discovered ids is
    /// vacuously a success.
    pub fn succeeded(&self) -> bool {
        self.outcomes
            .iter()
            .all(|outcome| outcome.status == Some(204))
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status != Some(204))
            .count()
    }
}

/// DISCOVER -> (for each id) DELETE -> DONE.
pub struct DeletionWalker {
    client: AnnotationClient,
    reader: AnnotationReader,
    dry_run: bool,
    events: Option<mpsc::Sender<DeleteEvent>>,
}

impl DeletionWalker {
    pub fn new(client: AnnotationClient, reader: AnnotationReader, dry_run: bool) -> Self {
        Self {
            client,
            reader,
            dry_run,
            events: None,
        }
    }

    /// Attach a progress-event channel (used by the CLI progress bar).
    pub fn with_events(mut self, events: mpsc::Sender<DeleteEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Delete every annotation found by a search for `target`.
    pub async fn delete_by_target(
        &self,
        endpoints: &ServiceEndpoints,
        target: &str,
    ) -> Result<DeleteReport, WalkError> {
        let query = endpoints.search_by_target(target)?;
        let ids = self.discover(&query).await?;
        if ids.is_empty() {
            warn!("No annotations for {}", target);
        }
        Ok(self.sweep(ids).await)
    }

    /// Delete every annotation in a container, addressed either by name
    /// or by the MD5 hash of `target`.
    pub async fn delete_by_container(
        &self,
        endpoints: &ServiceEndpoints,
        container: Option<&str>,
        target: Option<&str>,
    ) -> Result<DeleteReport, WalkError> {
        let query = match (container, target) {
            (Some(container), _) => endpoints.container(container)?,
            (None, Some(target)) => endpoints.container_for_target(target)?,
            (None, None) => {
                return Ok(DeleteReport::default());
            }
        };
        let ids = self.discover(&query).await?;
        Ok(self.sweep(ids).await)
    }

    /// Delete all annotations for every canvas in a IIIF manifest, then
    /// for the manifest itself.
    ///
    /// A failed manifest GET or a manifest without sequences/canvases
    /// aborts the whole workflow - nothing is deleted on a guess.
    pub async fn delete_by_manifest(
        &self,
        endpoints: &ServiceEndpoints,
        manifest_uri: &str,
    ) -> Result<Vec<DeleteReport>, WalkError> {
        let manifest = self
            .client
            .get_json_as(manifest_uri, IIIF_PRESENTATION_PROFILE)
            .await?;

        let sequences = manifest
            .get("sequences")
            .and_then(Value::as_array)
            .filter(|sequences| !sequences.is_empty())
            .ok_or_else(|| WalkError::MissingSequences(manifest_uri.to_string()))?;

        let canvases = sequences[0]
            .get("canvases")
            .and_then(Value::as_array)
            .ok_or_else(|| WalkError::MissingCanvases(manifest_uri.to_string()))?;

        let mut targets: Vec<String> = canvases
            .iter()
            .filter_map(|canvas| canvas.get("@id").and_then(Value::as_str))
            .map(|id| id.to_string())
            .collect();
        if let Some(id) = manifest.get("@id").and_then(Value::as_str) {
            targets.push(id.to_string());
        }

        let mut reports = Vec::with_capacity(targets.len());
        for target in &targets {
            reports.push(self.delete_by_target(endpoints, target).await?);
        }
        Ok(reports)
    }

    /// Discover candidate annotation ids for a query.
    ///
    /// The same annotation may appear on more than one page, so ids are
    /// deduplicated via a set union. Search results are slim records
    /// (`fields=source,id`), so discovery reads raw `id` fields rather
    /// than running full normalization.
    async fn discover(&self, query: &Url) -> Result<BTreeSet<String>, WalkError> {
        let items = self.reader.query_items(query).await?;
        let ids = items
            .iter()
            .filter_map(|item| item.get("id").and_then(Value::as_str))
            .map(|id| id.to_string())
            .collect();
        Ok(ids)
    }

    /// The sequential sweep. Failures are recorded and the sweep carries
    /// on: best effort first, aggregate verdict afterwards.
    async fn sweep(&self, ids: BTreeSet<String>) -> DeleteReport {
        self.emit(DeleteEvent::Discovered { count: ids.len() }).await;

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let status = if self.dry_run {
                info!("Dry run: would delete {}", id);
                Some(204)
            } else {
                self.delete_one(&id).await
            };

            self.emit(DeleteEvent::Deleted {
                id: id.clone(),
                status,
                dry_run: self.dry_run,
            })
            .await;

            match status {
                Some(204) => info!("Deleted {} status 204", id),
                Some(other) => error!("Could not delete {} status {}", id, other),
                None => error!("Could not delete {}: no response", id),
            }
            outcomes.push(DeleteOutcome { id, status });
        }
        DeleteReport { outcomes }
    }

    /// One conditional-GET-then-DELETE exchange.
    ///
    /// The ETag is fetched fresh immediately before the delete so the
    /// If-Match precondition reflects the current state of the resource.
    async fn delete_one(&self, id: &str) -> Option<u16> {
        let etag = match self.client.get_with_etag(id).await {
            Ok((_, etag)) => etag,
            Err(FetchError::Status { status, .. }) => return Some(status.as_u16()),
            Err(err) => {
                warn!("Failed to read {} before delete: {}", id, err);
                return None;
            }
        };

        match self.client.delete(id, etag.as_deref()).await {
            Ok(status) => Some(status.as_u16()),
            Err(err) => {
                warn!("Delete request for {} failed: {}", id, err);
                None
            }
        }
    }

    async fn emit(&self, event: DeleteEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}
