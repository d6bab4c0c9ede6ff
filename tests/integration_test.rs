//! Integration tests for Dirdex against a live mock directory server


use dirdex::server::{router, SearchResponse};
use dirdex::{CrawlProgress, Error, FormatFilter, IndexStore, Library, MatchMode, Settings};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_helpers::*;
use tokio_util::sync::CancellationToken;

fn no_progress() -> impl Fn(CrawlProgress) + Send + Sync {
    |_: CrawlProgress| {}
}

#[tokio::test]
async fn test_full_workflow() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    let library = server.library(temp.path());

    let report = library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();
    assert_eq!(report.total_files, 3);
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.pages_failed, 0);

    let root = server.url("/root/");
    let index = library.index().unwrap();
    assert_eq!(
        index.entries(),
        &[
            format!("{}a.epub", root),
            format!("{}sub/b.pdf", root),
            format!("{}sub/c.epub", root),
        ]
    );

    assert_eq!(
        library.search("b", MatchMode::All, &FormatFilter::parse("PDF")).unwrap(),
        vec![format!("{}sub/b.pdf", root)]
    );
    assert_eq!(
        library.search("epub", MatchMode::All, &FormatFilter::parse("ALL")).unwrap(),
        vec![format!("{}a.epub", root), format!("{}sub/c.epub", root)]
    );
    assert!(library.search("", MatchMode::Any, &FormatFilter::Any).unwrap().is_empty());

    // A fresh library reads the same index back without touching the network
    let requests_before = server.requested_paths().len();
    let reopened = server.library(temp.path());
    assert_eq!(reopened.load().unwrap(), 3);
    assert_eq!(reopened.index(), library.index());
    assert_eq!(server.requested_paths().len(), requests_before);
}

#[tokio::test]
async fn test_parent_and_sort_links_are_not_followed() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    let library = server.library(temp.path());

    library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();

    let mut paths = server.requested_paths();
    paths.sort();
    assert_eq!(paths, vec!["/root/", "/root/sub/"]);
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;

    let mut settings = server.settings(temp.path());
    settings.source.user_agent = "dirdex-test/1.0".to_string();
    let library = Library::open(settings, None).unwrap();
    library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();

    let agents = server.user_agents();
    assert!(!agents.is_empty());
    assert!(agents.iter().all(|ua| ua.as_deref() == Some("dirdex-test/1.0")));
}

#[tokio::test]
async fn test_missing_subdirectory_is_skipped() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    server.page("/root/", &["a.epub", "gone/", "sub/"]);

    let library = server.library(temp.path());
    let report = library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();

    assert_eq!(report.pages_failed, 1);
    assert_eq!(report.total_files, 3);
    assert!(library.index().unwrap().iter().all(|url| !url.contains("gone")));
}

#[tokio::test]
async fn test_unreachable_base_is_a_skipped_page() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    let library = server.library(temp.path());
    library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();

    server.remove_page("/root/");
    let report = library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();
    assert_eq!(report.pages_failed, 1);
    assert_eq!(report.pages_visited, 0);
    assert_eq!(report.total_files, 0);

    assert!(library.index().unwrap().is_empty());
    assert!(IndexStore::new(library.store().path()).load().unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    let library = server.library(temp.path());

    library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();
    let first = IndexStore::new(library.store().path()).load().unwrap();

    library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();
    let second = IndexStore::new(library.store().path()).load().unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_refresh_replaces_index_wholesale() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    let library = server.library(temp.path());
    library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();

    server.page("/root/sub/", &["d.mobi"]);
    library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();

    let root = server.url("/root/");
    assert_eq!(
        library.index().unwrap().entries(),
        &[format!("{}a.epub", root), format!("{}sub/d.mobi", root)]
    );
}

#[tokio::test]
async fn test_cancelled_refresh_leaves_file_untouched() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    let library = server.library(temp.path());
    library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();
    let before = std::fs::read(library.store().path()).unwrap();

    server.page("/root/", &["a.epub", "sub/", "new.epub"]);
    server.slow_down("/root/sub/", Duration::from_secs(5));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = library.refresh(&cancel, &no_progress()).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(std::fs::read(library.store().path()).unwrap(), before);
    assert_eq!(library.index().unwrap().len(), 3);
}

#[tokio::test]
async fn test_concurrent_refresh_is_rejected() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    server.slow_down("/root/sub/", Duration::from_millis(500));
    let library = server.library(temp.path());

    let cancel = CancellationToken::new();
    let progress = no_progress();
    let (first, second) = tokio::join!(
        library.refresh(&cancel, &progress),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            library.refresh(&CancellationToken::new(), &no_progress()).await
        }
    );

    assert_eq!(first.unwrap().total_files, 3);
    assert!(matches!(second, Err(Error::RefreshInProgress)));
}

#[tokio::test]
async fn test_refresh_records_last_update() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    let config = temp.path().join("config.toml");

    let mut on_disk = Settings::default();
    on_disk.search.max_results = 25;
    on_disk.save(&config).unwrap();

    let library = server.library(temp.path());
    library.refresh(&CancellationToken::new(), &no_progress()).await.unwrap();

    let stamped = Settings::load(&config).unwrap();
    assert!(stamped.state.last_update.is_some());
    assert_eq!(stamped.search.max_results, 25);
    // The test server URL was an in-memory override and must not be persisted
    assert_eq!(stamped.source.base_url, Settings::default().source.base_url);
}

#[tokio::test]
async fn test_http_api() {
    let temp = TempDir::new().unwrap();
    let server = MockDirectory::books().await;
    let library = Arc::new(server.library(temp.path()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let api = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();
    let app = router(Arc::clone(&library), shutdown.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();

    let health = client.get(format!("{}/health", api)).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let early = client.get(format!("{}/search?q=epub", api)).send().await.unwrap();
    assert_eq!(early.status(), 409);

    let refresh = client.post(format!("{}/refresh", api)).send().await.unwrap();
    assert_eq!(refresh.status(), 200);
    let report: serde_json::Value = refresh.json().await.unwrap();
    assert_eq!(report["total_files"], 3);

    let found: SearchResponse = client
        .get(format!("{}/search?q=epub&format=EPUB&limit=1", api))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found.total, 2);
    assert_eq!(found.results.len(), 1);
    assert_eq!(found.results[0].name, "a.epub");
    assert_eq!(found.results[0].extension, "EPUB");

    let unlimited: SearchResponse = client
        .get(format!("{}/search?q=epub&limit=0", api))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unlimited.total, 2);
    assert_eq!(unlimited.results.len(), 2);

    let any: SearchResponse = client
        .get(format!("{}/search?q=a.epub%20b.pdf&mode=any", api))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(any.total, 2);

    let bad_mode = client.get(format!("{}/search?q=x&mode=some", api)).send().await.unwrap();
    assert_eq!(bad_mode.status(), 400);

    let status: serde_json::Value = client
        .get(format!("{}/status", api))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["loaded"], true);
    assert_eq!(status["total_files"], 3);

    shutdown.cancel();
}
