//! annolist - annotation retrieval and reshaping client.
//!
//! Queries a W3C Web Annotation server, fetches every page of a container
//! or search result concurrently, and reshapes the records into
//! presentation formats (IIIF-style annotation lists, flattened linking
//! records). Also provides a sequential bulk-deletion walker built on the
//! same read path.

pub mod cli;
pub mod client;
pub mod config;
pub mod delete;
pub mod fetch;
pub mod normalize;
pub mod paging;
pub mod retrieve;
pub mod service;
pub mod target;
pub mod transform;

pub use client::{AnnotationClient, FetchError};
pub use config::Settings;
pub use delete::{DeleteEvent, DeleteOutcome, DeleteReport, DeletionWalker};
pub use fetch::ConcurrentFetcher;
pub use normalize::{NormalizeOptions, NormalizedAnnotation, Target};
pub use paging::{PageCursor, PagingError, SequentialPager};
pub use retrieve::{AnnotationReader, RetrieveError};
pub use service::ServiceEndpoints;
pub use target::{TargetExtractor, TargetMode};
pub use transform::{BodyTransform, TransformPipeline};
