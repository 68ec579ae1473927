//! End-to-end harvest properties with a scripted fetcher

use crate::common::{entries, Harness, ScriptedFetcher};
use catalog_harvest::ledger::Ledger;
use catalog_harvest::shard::{ShardFile, ShardLayout};
use catalog_harvest::{LedgerStatus, Pair, Resolution};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

fn x_y() -> Pair {
    Pair::new("X", "Y")
}

fn url_set(urls: &[&str]) -> HashSet<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

#[tokio::test]
async fn test_concrete_scenario_three_urls_two_batches() {
    let harness = Harness::new(ScriptedFetcher::new());
    let catalog = entries(&x_y(), &["https://e.com/u1", "https://e.com/u2", "https://e.com/u3"]);
    let coordinator = harness.coordinator(2, 2);

    let plan = coordinator.plan(&catalog).unwrap();
    let batches: Vec<Vec<&str>> = plan.pairs[&x_y()]
        .batches
        .iter()
        .map(|b| b.entries.iter().map(|e| e.url.as_str()).collect())
        .collect();
    assert_eq!(
        batches,
        vec![
            vec!["https://e.com/u1", "https://e.com/u2"],
            vec!["https://e.com/u3"]
        ]
    );

    let summary = coordinator
        .run(&catalog, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.fetched(), 3);
    assert_eq!(summary.failed(), 0);

    let shards = coordinator.shards();
    let last = shards.current_shard_index(&x_y()).unwrap();
    assert_eq!(last, 1);
    let shard = shards.read_shard(&x_y(), last).unwrap().unwrap();
    assert_eq!(shard.main_category, "X");
    assert_eq!(shard.sub_category, "Y");
    assert_eq!(shard.courses.len(), 3);
    let urls: HashSet<String> = shard
        .courses
        .iter()
        .map(|r| r.url().unwrap().to_string())
        .collect();
    assert_eq!(
        urls,
        url_set(&["https://e.com/u1", "https://e.com/u2", "https://e.com/u3"])
    );

    let records = coordinator.ledger().records().unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.pair == x_y()));
    assert!(records.iter().all(|r| r.resolution == Resolution::Fetched));
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let harness = Harness::new(ScriptedFetcher::new());
    let web = Pair::new("Development", "Web Development");
    let data = Pair::new("Development", "Data Science");
    let mut catalog = entries(&web, &["https://e.com/1", "https://e.com/2", "https://e.com/3"]);
    catalog.extend(entries(&data, &["https://e.com/3", "https://e.com/4"]));

    harness
        .coordinator(2, 2)
        .run(&catalog, &CancellationToken::new())
        .await
        .unwrap();

    let shards_before = harness.shard_snapshot();
    let ledger_before = harness.ledger().records().unwrap();
    let cross_before = harness.ledger().cross_references().unwrap();
    let calls_before = harness.fetcher.total_calls();

    let summary = harness
        .coordinator(2, 2)
        .run(&catalog, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.fetched(), 0);
    assert_eq!(summary.cross_referenced(), 0);
    assert_eq!(summary.reconciled, 0);
    assert!(summary.pairs.iter().all(|p| p.planned == 0 && p.complete));
    assert_eq!(harness.shard_snapshot(), shards_before);
    assert_eq!(harness.ledger().records().unwrap(), ledger_before);
    assert_eq!(harness.ledger().cross_references().unwrap(), cross_before);
    assert_eq!(harness.fetcher.total_calls(), calls_before);
}

#[tokio::test]
async fn test_each_url_fetched_at_most_once() {
    let harness = Harness::new(ScriptedFetcher::new());
    let a = Pair::new("Business", "Finance");
    let b = Pair::new("Business", "Sales");
    let c = Pair::new("Marketing", "Branding");

    let shared = ["https://e.com/s1", "https://e.com/s2"];
    let mut catalog = Vec::new();
    for pair in [&a, &b, &c] {
        catalog.extend(entries(pair, &shared));
    }
    catalog.extend(entries(&a, &["https://e.com/a1", "https://e.com/a1"]));
    catalog.extend(entries(&c, &["https://e.com/c1"]));

    for _ in 0..2 {
        harness
            .coordinator(4, 2)
            .run(&catalog, &CancellationToken::new())
            .await
            .unwrap();
    }

    assert_eq!(harness.fetcher.max_calls_per_url(), 1);
    assert_eq!(harness.fetcher.total_calls(), 4);

    let ledger = harness.ledger();
    assert_eq!(ledger.count().unwrap(), 4);
    // s1 and s2 cross-referenced under b and c
    assert_eq!(ledger.cross_references().unwrap().len(), 4);
}

#[tokio::test]
async fn test_cross_category_gets_placeholder_not_fetch() {
    let harness = Harness::new(ScriptedFetcher::new());
    let owner = Pair::new("Development", "Web Development");
    let other = Pair::new("IT & Software", "Network / Security");
    let url = "https://e.com/shared";

    harness
        .coordinator(2, 2)
        .run(&entries(&owner, &[url]), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(harness.fetcher.calls(url), 1);

    let mut catalog = entries(&owner, &[url]);
    catalog.extend(entries(&other, &[url]));
    let summary = harness
        .coordinator(2, 2)
        .run(&catalog, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.cross_referenced(), 1);
    assert_eq!(harness.fetcher.calls(url), 1);

    let ledger = harness.ledger();
    assert_eq!(ledger.owner_of(url).unwrap(), Some(owner.clone()));
    assert_eq!(ledger.status(url, &other).unwrap(), LedgerStatus::SameCategory);

    // placeholder lands under the sanitized path of the other pair
    let layout = ShardLayout::new(harness.shard_dir());
    let path = layout.shard_path(&other, 1);
    assert!(path.ends_with("IT_&_Software/Network_-_Security/IT_&_Software_Network_-_Security_1.json"));

    let shard: ShardFile =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(shard.main_category, "IT & Software");
    assert_eq!(shard.courses.len(), 1);
    assert_eq!(
        serde_json::to_value(&shard.courses[0]).unwrap(),
        serde_json::json!({
            "crawled_in_main_category": "Development",
            "crawled_in_sub_category": "Web Development",
            "url": url
        })
    );
}

#[tokio::test]
async fn test_failing_url_is_isolated() {
    let broken = "https://e.com/3";
    let harness = Harness::new(ScriptedFetcher::failing(&[broken]));
    let pair = Pair::new("Development", "Web Development");
    let catalog = entries(
        &pair,
        &["https://e.com/1", "https://e.com/2", broken, "https://e.com/4"],
    );

    let summary = harness
        .coordinator(4, 4)
        .run(&catalog, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.fetched(), 3);
    assert_eq!(summary.failed(), 1);

    let ledger = harness.ledger();
    let failed = ledger
        .records()
        .unwrap()
        .into_iter()
        .find(|r| r.url == broken)
        .unwrap();
    assert_eq!(failed.resolution, Resolution::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .contains("connection reset"));

    let in_shards = harness.shards().urls_in_pair(&pair).unwrap();
    assert_eq!(
        in_shards,
        url_set(&["https://e.com/1", "https://e.com/2", "https://e.com/4"])
    );

    // failures are not retried on later runs
    let summary = harness
        .coordinator(4, 4)
        .run(&catalog, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.pairs[0].planned, 0);
    assert_eq!(harness.fetcher.calls(broken), 1);
}

#[tokio::test]
async fn test_resume_from_partial_shard_with_empty_ledger() {
    let harness = Harness::new(ScriptedFetcher::new());
    let pair = Pair::new("Development", "Web Development");
    let urls = [
        "https://e.com/1",
        "https://e.com/2",
        "https://e.com/3",
        "https://e.com/4",
        "https://e.com/5",
    ];

    // a crash left three records in a shard and nothing in the ledger
    let layout = ShardLayout::new(harness.shard_dir());
    let path = layout.shard_path(&pair, 1);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let courses: Vec<_> = urls[..3]
        .iter()
        .map(|u| serde_json::json!({"title": "Old", "url": u}))
        .collect();
    let body = serde_json::json!({
        "main_category": pair.main_category,
        "sub_category": pair.sub_category,
        "courses": courses,
    });
    std::fs::write(&path, serde_json::to_string_pretty(&body).unwrap()).unwrap();
    let original_shard = std::fs::read_to_string(&path).unwrap();

    let catalog = entries(&pair, &urls);
    let coordinator = harness.coordinator(2, 2);

    let plan = coordinator.plan(&catalog).unwrap();
    let pending: Vec<&str> = plan.pairs[&pair]
        .batches
        .iter()
        .flat_map(|b| b.entries.iter().map(|e| e.url.as_str()))
        .collect();
    assert_eq!(pending, vec!["https://e.com/4", "https://e.com/5"]);

    let summary = coordinator
        .run(&catalog, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.reconciled, 3);
    assert_eq!(summary.fetched(), 2);
    assert_eq!(harness.fetcher.calls("https://e.com/1"), 0);

    // the earlier shard is closed and untouched
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original_shard);
    assert_eq!(
        coordinator.shards().urls_in_shard(&pair, 2).unwrap(),
        url_set(&["https://e.com/4", "https://e.com/5"])
    );
    assert_eq!(coordinator.ledger().count().unwrap(), 5);
}

#[tokio::test]
async fn test_interrupted_run_resumes_without_repeating() {
    let cancel = CancellationToken::new();
    let harness = Harness::new(ScriptedFetcher::cancelling_on(
        "https://e.com/2",
        cancel.clone(),
    ));
    let pair = Pair::new("Development", "Web Development");
    let urls = ["https://e.com/1", "https://e.com/2", "https://e.com/3", "https://e.com/4"];
    let catalog = entries(&pair, &urls);

    let summary = harness.coordinator(1, 1).run(&catalog, &cancel).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.fetched(), 2);
    assert_eq!(summary.pairs[0].not_dispatched, 2);
    assert!(!summary.pairs[0].complete);

    let summary = harness
        .coordinator(1, 1)
        .run(&catalog, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.cancelled);
    assert_eq!(summary.fetched(), 2);
    assert!(summary.pairs[0].complete);
    assert_eq!(harness.fetcher.max_calls_per_url(), 1);
    assert_eq!(
        harness.shards().urls_in_pair(&pair).unwrap(),
        url_set(&urls)
    );
}

#[tokio::test]
async fn test_batch_size_does_not_change_result() {
    let pair = Pair::new("Development", "Web Development");
    let urls: Vec<String> = (1..=7).map(|n| format!("https://e.com/{}", n)).collect();
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let catalog = entries(&pair, &refs);

    let mut results = Vec::new();
    for batch_size in [1, 3, 10] {
        let harness = Harness::new(ScriptedFetcher::new());
        harness
            .coordinator(3, batch_size)
            .run(&catalog, &CancellationToken::new())
            .await
            .unwrap();

        let ledger_urls: HashSet<String> = harness
            .ledger()
            .records()
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        results.push((ledger_urls, harness.shards().urls_in_pair(&pair).unwrap()));
    }

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0].1.len(), 7);
}
