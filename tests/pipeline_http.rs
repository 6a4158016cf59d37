//! End-to-end tests of the read and delete paths against a local fixture
//! server standing in for the annotation store.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::TryStreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use url::Url;

use annolist::delete::WalkError;
use annolist::service::container_hash;
use annolist::{
    transform, AnnotationClient, AnnotationReader, ConcurrentFetcher, DeleteEvent, DeletionWalker,
    SequentialPager, ServiceEndpoints,
};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn spawn(listener: TcpListener, app: Router) {
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
}

fn reader(limit: usize) -> AnnotationReader {
    AnnotationReader::new(
        AnnotationClient::new(TIMEOUT),
        ConcurrentFetcher::new(limit, TIMEOUT),
    )
}

#[tokio::test]
async fn pages_come_back_in_input_order() {
    // earlier pages answer later, so completion order is reversed
    async fn page(Path(index): Path<u64>) -> Json<Value> {
        tokio::time::sleep(Duration::from_millis(120 - index * 20)).await;
        Json(json!({ "index": index }))
    }

    let (listener, addr) = bind().await;
    spawn(listener, Router::new().route("/page/:index", get(page)));

    let uris: Vec<Url> = (0..5)
        .map(|index| Url::parse(&format!("http://{}/page/{}", addr, index)).unwrap())
        .collect();

    let fetcher = ConcurrentFetcher::new(5, TIMEOUT);
    let pages = fetcher.fetch_all(uris).await.unwrap();
    let indices: Vec<u64> = pages
        .iter()
        .map(|page| page["index"].as_u64().unwrap())
        .collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn one_bad_page_fails_the_whole_batch() {
    async fn page(Path(index): Path<u64>) -> Response {
        if index == 2 {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        } else {
            Json(json!({ "index": index })).into_response()
        }
    }

    let (listener, addr) = bind().await;
    spawn(listener, Router::new().route("/page/:index", get(page)));

    let uris: Vec<Url> = (0..4)
        .map(|index| Url::parse(&format!("http://{}/page/{}", addr, index)).unwrap())
        .collect();

    let fetcher = ConcurrentFetcher::new(2, TIMEOUT);
    let err = fetcher.fetch_all(uris).await.unwrap_err();
    assert_eq!(err.status().map(|status| status.as_u16()), Some(500));
}

#[tokio::test]
async fn query_items_flattens_pages_in_page_order() {
    async fn pages(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let page: usize = params["page"].parse().unwrap();
        let items: Vec<Value> = (0..2)
            .map(|index| json!({ "id": format!("anno-{}-{}", page, index) }))
            .collect();
        Json(json!({ "items": items }))
    }

    let (listener, addr) = bind().await;
    let app = Router::new()
        .route(
            "/annotation/w3c/cont/",
            get(move || async move {
                Json(json!({
                    "total": 4,
                    "last": format!("http://{}/pages?page=1", addr)
                }))
            }),
        )
        .route("/pages", get(pages));
    spawn(listener, app);

    let endpoints = ServiceEndpoints::new(&format!("http://{}", addr)).unwrap();
    let query = endpoints.container("cont").unwrap();
    let items = reader(2).query_items(&query).await.unwrap();

    let ids: Vec<&str> = items.iter().map(|item| item["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["anno-0-0", "anno-0-1", "anno-1-0", "anno-1-1"]);
}

#[tokio::test]
async fn empty_container_yields_no_envelope() {
    let (listener, addr) = bind().await;
    let app = Router::new().route(
        "/annotation/w3c/empty/",
        get(|| async { Json(json!({ "total": 0 })) }),
    );
    spawn(listener, app);

    let endpoints = ServiceEndpoints::new(&format!("http://{}", addr)).unwrap();
    let query = endpoints.container("empty").unwrap();
    let items = reader(2).query_items(&query).await.unwrap();

    assert!(items.is_empty());
    assert!(transform::annotation_list(query.as_str(), Vec::new()).is_none());
}

#[tokio::test]
async fn sequential_pager_follows_the_next_chain() {
    let (listener, addr) = bind().await;
    let app = Router::new()
        .route(
            "/search",
            get(move || async move {
                Json(json!({
                    "first": {
                        "as:items": { "@list": [{ "id": "a" }, { "id": "b" }] },
                        "next": format!("http://{}/search/1", addr)
                    }
                }))
            }),
        )
        .route(
            "/search/1",
            get(move || async move {
                Json(json!({
                    "items": [{ "id": "c" }],
                    "next": format!("http://{}/search/2", addr)
                }))
            }),
        )
        .route(
            "/search/2",
            get(|| async { Json(json!({ "items": [{ "id": "d" }] })) }),
        );
    spawn(listener, app);

    let pager = SequentialPager::new(AnnotationClient::new(TIMEOUT));
    let items: Vec<Value> = pager
        .items(&format!("http://{}/search", addr))
        .try_collect()
        .await
        .unwrap();

    let ids: Vec<&str> = items.iter().map(|item| item["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn sequential_pager_stops_quietly_past_the_end() {
    let (listener, addr) = bind().await;
    let app = Router::new().route(
        "/search",
        get(move || async move {
            Json(json!({
                "first": {
                    "as:items": { "@list": [{ "id": "a" }] },
                    "next": format!("http://{}/search/missing", addr)
                }
            }))
        }),
    );
    spawn(listener, app);

    let pager = SequentialPager::new(AnnotationClient::new(TIMEOUT));
    let items: Vec<Value> = pager
        .items(&format!("http://{}/search", addr))
        .try_collect()
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
}

#[derive(Clone, Default)]
struct DeleteLog {
    deletes: Arc<AtomicUsize>,
}

async fn anno_get(Path(id): Path<String>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ETAG,
        format!("W/\"v-{}\"", id).parse().unwrap(),
    );
    (headers, Json(json!({ "id": id }))).into_response()
}

async fn anno_delete(
    State(log): State<DeleteLog>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> StatusCode {
    log.deletes.fetch_add(1, Ordering::SeqCst);
    let expected = format!("\"v-{}\"", id);
    match headers
        .get(header::IF_MATCH)
        .and_then(|value| value.to_str().ok())
    {
        Some(tag) if tag == expected => {
            if id == "b" {
                StatusCode::CONFLICT
            } else {
                StatusCode::NO_CONTENT
            }
        }
        _ => StatusCode::PRECONDITION_FAILED,
    }
}

/// Fixture store: a search service answering three annotation ids (listed
/// out of order) and GET/DELETE routes for the annotations themselves.
/// DELETE demands the If-Match tag served by the matching GET, answers
/// 409 for annotation `b`, and counts every call it receives.
async fn delete_fixture() -> (SocketAddr, DeleteLog) {
    let (listener, addr) = bind().await;
    let log = DeleteLog::default();

    let app = Router::new()
        .route(
            // container addressed by the MD5 hash of the target URI
            &format!(
                "/annotation/w3c/{}/",
                container_hash("https://example.org/canvas/c1")
            ),
            get(move || async move {
                Json(json!({
                    "total": 3,
                    "last": format!("http://{}/search-pages?page=0", addr)
                }))
            }),
        )
        .route(
            "/annotation/w3c/services/search/target",
            get(move || async move {
                Json(json!({
                    "total": 3,
                    "last": format!("http://{}/search-pages?page=0", addr)
                }))
            }),
        )
        .route(
            "/search-pages",
            get(move || async move {
                Json(json!({
                    "items": [
                        { "id": format!("http://{}/anno/b", addr) },
                        { "id": format!("http://{}/anno/a", addr) },
                        { "id": format!("http://{}/anno/c", addr) }
                    ]
                }))
            }),
        )
        .route("/anno/:id", get(anno_get).delete(anno_delete))
        .with_state(log.clone());
    spawn(listener, app);

    (addr, log)
}

#[tokio::test]
async fn sweep_records_every_status_and_carries_on() {
    let (addr, log) = delete_fixture().await;
    let endpoints = ServiceEndpoints::new(&format!("http://{}", addr)).unwrap();

    let (event_tx, mut event_rx) = mpsc::channel::<DeleteEvent>(16);
    let client = AnnotationClient::new(TIMEOUT);
    let walker = DeletionWalker::new(client, reader(2), false).with_events(event_tx);

    let report = walker
        .delete_by_target(&endpoints, "https://example.org/canvas/c1")
        .await
        .unwrap();
    drop(walker);

    let ids: Vec<&str> = report
        .outcomes
        .iter()
        .map(|outcome| outcome.id.rsplit('/').next().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let statuses: Vec<Option<u16>> =
        report.outcomes.iter().map(|outcome| outcome.status).collect();
    assert_eq!(statuses, vec![Some(204), Some(409), Some(204)]);
    assert!(!report.succeeded());
    assert_eq!(report.failed_count(), 1);
    assert_eq!(log.deletes.load(Ordering::SeqCst), 3);

    let mut events = Vec::new();
    while let Some(event) = event_rx.recv().await {
        events.push(event);
    }
    assert!(matches!(events[0], DeleteEvent::Discovered { count: 3 }));
    assert_eq!(events.len(), 4);
}

#[tokio::test]
async fn dry_run_issues_no_deletes() {
    let (addr, log) = delete_fixture().await;
    let endpoints = ServiceEndpoints::new(&format!("http://{}", addr)).unwrap();

    let client = AnnotationClient::new(TIMEOUT);
    let walker = DeletionWalker::new(client, reader(2), true);

    let report = walker
        .delete_by_target(&endpoints, "https://example.org/canvas/c1")
        .await
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.outcomes.len(), 3);
    assert!(report
        .outcomes
        .iter()
        .all(|outcome| outcome.status == Some(204)));
    assert_eq!(log.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn container_sweep_addresses_the_hashed_container() {
    let (addr, log) = delete_fixture().await;
    let endpoints = ServiceEndpoints::new(&format!("http://{}", addr)).unwrap();

    let client = AnnotationClient::new(TIMEOUT);
    let walker = DeletionWalker::new(client, reader(2), false);

    let report = walker
        .delete_by_container(&endpoints, None, Some("https://example.org/canvas/c1"))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(log.deletes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn manifest_walk_visits_every_canvas_then_the_manifest() {
    let (listener, addr) = bind().await;
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = Router::new()
        .route(
            "/manifest",
            get(move || async move {
                Json(json!({
                    "@id": format!("http://{}/manifest", addr),
                    "sequences": [{
                        "canvases": [
                            { "@id": format!("http://{}/canvas/c1", addr) },
                            { "@id": format!("http://{}/canvas/c2", addr) }
                        ]
                    }]
                }))
            }),
        )
        .route(
            "/annotation/w3c/services/search/target",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Json(json!({ "total": 0 })) }
            }),
        );
    spawn(listener, app);

    let endpoints = ServiceEndpoints::new(&format!("http://{}", addr)).unwrap();
    let client = AnnotationClient::new(TIMEOUT);
    let walker = DeletionWalker::new(client, reader(2), false);

    let reports = walker
        .delete_by_manifest(&endpoints, &format!("http://{}/manifest", addr))
        .await
        .unwrap();

    // two canvases, then the manifest itself
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|report| report.succeeded()));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn manifest_without_sequences_aborts_the_walk() {
    let (listener, addr) = bind().await;
    let app = Router::new().route(
        "/manifest",
        get(move || async move { Json(json!({ "@id": format!("http://{}/manifest", addr) })) }),
    );
    spawn(listener, app);

    let endpoints = ServiceEndpoints::new(&format!("http://{}", addr)).unwrap();
    let client = AnnotationClient::new(TIMEOUT);
    let walker = DeletionWalker::new(client, reader(2), false);

    let err = walker
        .delete_by_manifest(&endpoints, &format!("http://{}/manifest", addr))
        .await
        .unwrap_err();
    assert!(matches!(err, WalkError::MissingSequences(_)));
}
