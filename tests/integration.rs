use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{TimeDelta, Utc};
use serde_json::Value;
use site_publisher::{
    FsStorage, MemoryStorage, Mode, ObjectMeta, ObjectStore, PointerSource, PublishError,
    PublishRequest, Publisher, PublisherBuilder, PutOptions, StoredObject, build_app,
};
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ACME_HTML: &str = "<!doctype html><html><head><title>Acme</title></head><body>Welcome to Acme</body></html>";

fn publisher_over<S: ObjectStore>(store: S) -> Arc<Publisher<S>> {
    Arc::new(
        PublisherBuilder::new(store)
            .base_domain("example.com")
            .public_base_url("https://publish.example.com")
            .preview_host_suffix(".vercel.app")
            .build()
            .unwrap(),
    )
}

fn memory_publisher() -> (MemoryStorage, Arc<Publisher<MemoryStorage>>) {
    let store = MemoryStorage::new();
    (store.clone(), publisher_over(store))
}

fn publish_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/publish")
        .header(header::HOST, "publish.example.com")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(host: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, host)
        .body(Body::empty())
        .unwrap()
}

async fn send<S: ObjectStore>(
    publisher: &Arc<Publisher<S>>,
    req: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = build_app(publisher.clone()).oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

async fn send_json<S: ObjectStore>(
    publisher: &Arc<Publisher<S>>,
    req: Request<Body>,
) -> (StatusCode, Value) {
    let (status, _, body) = send(publisher, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

/// Store that always fails -- for testing error paths.
struct FailingStorage;

impl ObjectStore for FailingStorage {
    fn public_base(&self) -> &str {
        "https://failing.example"
    }

    async fn put(&self, _path: &str, _content: &[u8], _opts: &PutOptions) -> site_publisher::Result<StoredObject> {
        Err(PublishError::StoreWrite("simulated failure at sites/secret/path".into()))
    }

    async fn get(&self, _path: &str) -> site_publisher::Result<Option<Vec<u8>>> {
        Err(PublishError::StoreRead("simulated failure".into()))
    }

    async fn list(&self, _prefix: &str) -> site_publisher::Result<Vec<ObjectMeta>> {
        Err(PublishError::StoreRead("simulated failure".into()))
    }
}

// ---------------------------------------------------------------------------
// Publish endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publish_then_read_byte_for_byte() {
    let (_, publisher) = memory_publisher();

    let (status, receipt) = send_json(
        &publisher,
        publish_request(&serde_json::json!({
            "site": "acme",
            "mode": "publish",
            "html": ACME_HTML,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["ok"], true);
    assert_eq!(receipt["mode"], "publish");
    assert_eq!(receipt["publishedUrl"], "https://acme.example.com");
    assert!(receipt["pointerUrl"].as_str().unwrap().ends_with("/sites/acme/latest.json"));
    assert!(receipt["snapshotUrl"].as_str().unwrap().contains("/sites/acme/index-"));

    let (status, headers, body) = send(&publisher, get("publish.example.com", "/s/acme")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACME_HTML.as_bytes());
    assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=60");
}

#[tokio::test]
async fn each_publish_gets_a_fresh_snapshot() {
    let (store, publisher) = memory_publisher();
    let mut snapshot_urls = Vec::new();

    for version in 1..=3 {
        let html = format!("<!doctype html><p>version {version}</p>");
        let (status, receipt) = send_json(
            &publisher,
            publish_request(&serde_json::json!({ "site": "acme", "html": html })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let url = receipt["snapshotUrl"].as_str().unwrap().to_string();
        assert!(!snapshot_urls.contains(&url));
        snapshot_urls.push(url);
    }

    let (_, _, body) = send(&publisher, get("acme.example.com", "/")).await;
    assert_eq!(body, b"<!doctype html><p>version 3</p>");

    // Three snapshots plus one pointer.
    let stored = store.paths();
    assert_eq!(stored.iter().filter(|p| p.starts_with("sites/acme/index-")).count(), 3);
    assert_eq!(stored.iter().filter(|p| p.ends_with("latest.json")).count(), 1);
}

#[tokio::test]
async fn publish_accepts_legacy_slug_field() {
    let (_, publisher) = memory_publisher();
    let (status, receipt) = send_json(
        &publisher,
        publish_request(&serde_json::json!({ "slug": "  Acme ", "html": ACME_HTML })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["site"], "acme");
}

#[tokio::test]
async fn publish_rejects_invalid_identifier() {
    let (store, publisher) = memory_publisher();
    let too_long = "a".repeat(64);
    for site in ["", "-acme", "acme-", "ac_me", too_long.as_str()] {
        let (status, body) = send_json(
            &publisher,
            publish_request(&serde_json::json!({ "site": site, "html": ACME_HTML })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{site:?}");
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "invalid_identifier");
    }
    assert!(store.paths().is_empty());
}

#[tokio::test]
async fn publish_rejects_fragments_and_missing_html() {
    let (store, publisher) = memory_publisher();
    for body in [
        serde_json::json!({ "site": "acme", "html": "<div>just a fragment</div>" }),
        serde_json::json!({ "site": "acme", "html": "" }),
        serde_json::json!({ "site": "acme" }),
    ] {
        let (status, json) = send_json(&publisher, publish_request(&body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_content");
    }
    assert!(store.paths().is_empty());
}

#[tokio::test]
async fn publish_rejects_malformed_body() {
    let (_, publisher) = memory_publisher();
    let req = Request::builder()
        .method("POST")
        .uri("/api/publish")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send_json(&publisher, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");

    let (status, json) = send_json(
        &publisher,
        publish_request(&serde_json::json!({ "site": "acme", "mode": "live", "html": ACME_HTML })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn store_failure_is_500_without_leaking_paths() {
    let publisher = publisher_over(FailingStorage);
    let (status, _, body) = send(
        &publisher,
        publish_request(&serde_json::json!({ "site": "acme", "html": ACME_HTML })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("store_write_failed"));
    assert!(!text.contains("sites/secret"));
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unpublished_site_is_404_json() {
    let (_, publisher) = memory_publisher();
    let (status, json) = send_json(&publisher, get("publish.example.com", "/s/nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"], "not_found");

    let (status, _) = send_json(&publisher, get("nobody.example.com", "/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn read_with_invalid_slug_is_rejected() {
    let (_, publisher) = memory_publisher();
    let (status, json) = send_json(&publisher, get("publish.example.com", "/s/bad_slug")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "invalid_identifier");
}

#[tokio::test]
async fn dangling_pointer_is_502() {
    let (store, publisher) = memory_publisher();
    publisher
        .publish(&PublishRequest::new("acme", Mode::Publish, ACME_HTML))
        .await
        .unwrap();
    for path in store.paths() {
        if path.contains("/index-") {
            store.remove(&path);
        }
    }

    let (status, json) = send_json(&publisher, get("acme.example.com", "/")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "snapshot_unreachable");
}

#[tokio::test]
async fn unreadable_store_is_502() {
    let publisher = publisher_over(FailingStorage);
    let (status, json) = send_json(&publisher, get("publish.example.com", "/s/acme")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "upstream_unavailable");
}

#[tokio::test]
async fn drafts_are_served_only_on_preview_route() {
    let (_, publisher) = memory_publisher();
    let draft = "<!doctype html><p>draft</p>";
    let (_, receipt) = send_json(
        &publisher,
        publish_request(&serde_json::json!({ "site": "acme", "mode": "draft", "html": draft })),
    )
    .await;
    assert_eq!(receipt["publishedUrl"], "https://publish.example.com/preview/acme");

    let (status, headers, body) =
        send(&publisher, get("publish.example.com", "/preview/acme")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, draft.as_bytes());
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert_eq!(headers["x-robots-tag"], "noindex, nofollow");

    let (status, _, _) = send(&publisher, get("acme.example.com", "/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn extra_path_segments_serve_the_site_document() {
    let (_, publisher) = memory_publisher();
    publisher
        .publish(&PublishRequest::new("acme", Mode::Publish, ACME_HTML))
        .await
        .unwrap();

    let (status, _, body) = send(&publisher, get("acme.example.com", "/about/team?ref=x")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACME_HTML.as_bytes());
}

// ---------------------------------------------------------------------------
// Host routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn apex_and_www_are_not_rewritten() {
    let (_, publisher) = memory_publisher();
    publisher
        .publish(&PublishRequest::new("www", Mode::Publish, ACME_HTML))
        .await
        .unwrap();

    for host in ["example.com", "www.example.com"] {
        let (status, json) = send_json(&publisher, get(host, "/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{host}");
        assert_eq!(json["message"], "no such route");
    }
}

#[tokio::test]
async fn api_on_site_subdomain_is_not_rewritten() {
    let (_, publisher) = memory_publisher();
    let req = Request::builder()
        .uri("/api/health")
        .header(header::HOST, "acme.example.com")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send_json(&publisher, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn preview_deployment_hosts_are_not_rewritten() {
    let (_, publisher) = memory_publisher();
    publisher
        .publish(&PublishRequest::new("acme", Mode::Publish, ACME_HTML))
        .await
        .unwrap();
    let (status, _, _) = send(&publisher, get("acme.example.com.vercel.app", "/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Pointer resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn suffixed_pointer_is_found_by_recency_scan() {
    let (store, publisher) = memory_publisher();
    let t = Utc::now();
    store.insert("sites/legacy/index-old.html", "<!doctype html><p>old</p>", t);
    store.insert("sites/legacy/index-new.html", "<!doctype html><p>new</p>", t);
    store.insert(
        "sites/legacy/latest-k2Jd9x.json",
        format!(r#"{{"url":"{}"}}"#, store.url("sites/legacy/index-old.html")),
        t,
    );
    store.insert(
        "sites/legacy/latest-Q81mzA.json",
        format!(r#"{{"url":"{}"}}"#, store.url("sites/legacy/index-new.html")),
        t + TimeDelta::seconds(30),
    );

    let resolution = publisher.resolve("legacy", Mode::Publish).await.unwrap();
    assert_eq!(resolution.source, PointerSource::Scan);
    assert_eq!(resolution.pointer_path, "sites/legacy/latest-Q81mzA.json");

    let (status, _, body) = send(&publisher, get("legacy.example.com", "/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<!doctype html><p>new</p>");

    // A later publish writes the fixed pointer, which then takes precedence.
    publisher
        .publish(&PublishRequest::new("legacy", Mode::Publish, ACME_HTML))
        .await
        .unwrap();
    let resolution = publisher.resolve("legacy", Mode::Publish).await.unwrap();
    assert_eq!(resolution.source, PointerSource::Direct);
    assert_eq!(resolution.pointer_path, "sites/legacy/latest.json");
}

#[tokio::test]
async fn resolve_is_stable_without_writes() {
    let (_, publisher) = memory_publisher();
    publisher
        .publish(&PublishRequest::new("acme", Mode::Publish, ACME_HTML))
        .await
        .unwrap();

    let first = publisher.resolve("acme", Mode::Publish).await.unwrap();
    for _ in 0..10 {
        assert_eq!(publisher.resolve("acme", Mode::Publish).await.unwrap(), first);
    }
}

#[tokio::test]
async fn concurrent_publishes_leave_a_valid_pointer() {
    let (store, publisher) = memory_publisher();
    let docs: Vec<String> = (0..8)
        .map(|i| format!("<!doctype html><p>writer {i}</p>"))
        .collect();

    let results = futures::future::join_all(docs.iter().map(|html| {
        let publisher = publisher.clone();
        let html = html.clone();
        async move {
            publisher
                .publish(&PublishRequest::new("acme", Mode::Publish, html))
                .await
        }
    }))
    .await;
    assert!(results.iter().all(|r| r.is_ok()));

    // Last writer wins; whichever it was, the pointer names one of the snapshots.
    let page = publisher.serve("acme", Mode::Publish).await.unwrap();
    assert!(docs.iter().any(|d| d.as_bytes() == page.html.as_slice()));
    assert_eq!(
        store.paths().iter().filter(|p| p.starts_with("sites/acme/index-")).count(),
        docs.len()
    );
}

// ---------------------------------------------------------------------------
// Filesystem store end-to-end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fs_store_publish_and_serve() {
    let tmp = TempDir::new().unwrap();
    let publisher = publisher_over(
        FsStorage::new(tmp.path()).with_public_base("https://static.example.com"),
    );

    let receipt = publisher
        .publish(&PublishRequest::new("acme", Mode::Publish, ACME_HTML))
        .await
        .unwrap();
    assert!(receipt.snapshot_url.starts_with("https://static.example.com/sites/acme/index-"));
    assert_eq!(receipt.pointer_url, "https://static.example.com/sites/acme/latest.json");
    assert!(tmp.path().join("sites/acme/latest.json").exists());

    let (status, _, body) = send(&publisher, get("acme.example.com", "/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACME_HTML.as_bytes());
}

#[tokio::test]
async fn fs_store_scan_fallback_after_pointer_loss() {
    let tmp = TempDir::new().unwrap();
    let store = FsStorage::new(tmp.path());
    let snapshot = store
        .put("sites/acme/index-abc.html", ACME_HTML.as_bytes(), &PutOptions::exact("text/html"))
        .await
        .unwrap();
    store
        .put(
            "sites/acme/latest.json",
            format!(r#"{{"url":"{}"}}"#, snapshot.url).as_bytes(),
            &PutOptions::uniquified("application/json"),
        )
        .await
        .unwrap();
    assert!(!tmp.path().join("sites/acme/latest.json").exists());

    let publisher = publisher_over(store);
    let resolution = publisher.resolve("acme", Mode::Publish).await.unwrap();
    assert_eq!(resolution.source, PointerSource::Scan);
    let page = publisher.serve("acme", Mode::Publish).await.unwrap();
    assert_eq!(page.html, ACME_HTML.as_bytes());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fs_store_pointer_never_torn_while_republishing() {
    let tmp = TempDir::new().unwrap();
    let publisher = publisher_over(FsStorage::new(tmp.path()));
    publisher
        .publish(&PublishRequest::new("acme", Mode::Publish, ACME_HTML))
        .await
        .unwrap();

    let writer = {
        let publisher = publisher.clone();
        tokio::spawn(async move {
            for n in 0..300 {
                let html = format!("<!doctype html><p>version {n}</p>");
                publisher
                    .publish(&PublishRequest::new("acme", Mode::Publish, html))
                    .await
                    .unwrap();
            }
        })
    };

    let mut reads = 0;
    while !writer.is_finished() {
        match publisher.resolve("acme", Mode::Publish).await {
            Ok(_) => reads += 1,
            Err(e @ PublishError::MalformedPointer { .. }) => {
                panic!("reader observed a torn pointer after {reads} reads: {e}")
            }
            Err(e) => panic!("unexpected resolve failure: {e}"),
        }
    }
    writer.await.unwrap();

    let resolution = publisher.resolve("acme", Mode::Publish).await.unwrap();
    assert_eq!(resolution.source, PointerSource::Direct);
}
