//! HTTP fetcher and full harvest against a wiremock server

use crate::common::course_page;
use catalog_harvest::config::{
    Config, CrawlerConfig, ExtractorConfig, InputConfig, OutputConfig, UserAgentConfig,
};
use catalog_harvest::crawler::{
    load_config_catalog, run_harvest, Coordinator, FetchError, HttpFetcher, PageFetcher,
};
use catalog_harvest::ledger::{Ledger, SqliteLedger};
use catalog_harvest::shard::ShardStore;
use catalog_harvest::{Pair, Resolution};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(&user_agent(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_http_fetcher_returns_html_and_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/course/rust/"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(course_page("Rust"), "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let html = fetcher()
        .fetch(&format!("{}/course/rust/", server.uri()))
        .await
        .unwrap();
    assert!(html.contains("Rust"));
}

#[tokio::test]
async fn test_http_fetcher_classifies_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let missing = fetcher().fetch(&format!("{}/missing/", server.uri())).await;
    assert!(matches!(
        missing,
        Err(FetchError::HttpStatus {
            status_code: 404,
            ..
        })
    ));

    let json = fetcher().fetch(&format!("{}/data.json", server.uri())).await;
    assert!(matches!(json, Err(FetchError::ContentMismatch { .. })));
}

fn write_catalog(dir: &Path, base: &str) {
    let catalog = serde_json::json!({
        "main_category": "Development",
        "sub_category": "Web Development",
        "courses": [
            {"title": "Rust", "url": format!("{}/course/rust/", base)},
            {"title": "Broken", "url": format!("{}/course/broken/", base)},
            {"title": "No URL"},
            {"title": "Relative", "url": "/course/relative/"}
        ]
    });
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join("web.json"),
        serde_json::to_string_pretty(&catalog).unwrap(),
    )
    .unwrap();
}

fn config(dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            concurrency_limit: 2,
            batch_size: 2,
            shard_size: 3,
            jitter_min_ms: 0,
            jitter_max_ms: 10,
            fetch_timeout_secs: 5,
        },
        user_agent: user_agent(),
        input: InputConfig {
            catalog_dir: dir.join("catalog").to_string_lossy().into_owned(),
        },
        output: OutputConfig {
            shard_dir: dir.join("shards").to_string_lossy().into_owned(),
            ledger_path: dir.join("ledger.db").to_string_lossy().into_owned(),
            summary_path: None,
        },
        extractor: ExtractorConfig::default(),
    }
}

#[tokio::test]
async fn test_full_harvest_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/course/rust/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(course_page("Rust for Beginners"), "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/course/broken/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    write_catalog(&dir.path().join("catalog"), &server.uri());
    let config = config(dir.path());

    let summary = run_harvest(&config, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.fetched(), 1);
    assert_eq!(summary.failed(), 1);

    // a second run touches nothing; the mocks above expect one call each
    let summary = run_harvest(&config, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.pairs[0].planned, 0);

    let pair = Pair::new("Development", "Web Development");
    let shards = ShardStore::new(&config.output.shard_dir, 3);
    let records = shards.records_in_pair(&pair).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].fields()["title"],
        serde_json::json!("Rust for Beginners")
    );
    assert_eq!(records[0].fields()["bio"], serde_json::json!("A course"));

    let ledger = SqliteLedger::open(Path::new(&config.output.ledger_path)).unwrap();
    let counts = ledger.count_by_resolution().unwrap();
    assert_eq!(counts.get(&Resolution::Fetched), Some(&1));
    assert_eq!(counts.get(&Resolution::Failed), Some(&1));
}

#[test]
fn test_planning_does_not_create_the_ledger() {
    let dir = TempDir::new().unwrap();
    write_catalog(&dir.path().join("catalog"), "https://example.com");
    let config = config(dir.path());

    let catalog = load_config_catalog(&config).unwrap();
    let plan = Coordinator::for_planning(&config)
        .unwrap()
        .plan(&catalog)
        .unwrap();

    assert_eq!(plan.total_pending(), 2);
    assert!(!Path::new(&config.output.ledger_path).exists());
    assert!(!Path::new(&config.output.shard_dir).exists());
}
