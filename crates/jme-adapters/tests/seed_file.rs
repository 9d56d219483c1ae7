mod common;

use std::time::Duration;

use jme_adapters::{collect_items, AdapterError, SeedFileAdapter};
use jme_storage::{HttpClientConfig, HttpFetcher};

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(HttpClientConfig {
        request_delay: Duration::ZERO,
        ..HttpClientConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn seed_file_applies_freshness_window() {
    let path = common::fixture_path("seed", "jobs.json");
    let adapter = SeedFileAdapter::new(path.to_string_lossy());
    let run = collect_items(&adapter, &fetcher(), &common::context(14))
        .await
        .unwrap();

    let titles = run.items.iter().map(|i| i.title.as_str()).collect::<Vec<_>>();
    assert_eq!(
        titles,
        vec!["Junior Data Analyst", "Staff Data Engineer", "Research Engineer"]
    );
    assert_eq!(run.stale, 1);
    assert_eq!(run.failed, 0);

    let junior = &run.items[0];
    assert_eq!(junior.source, "seed");
    assert_eq!(junior.location.city.as_deref(), Some("Chicago"));
    assert_eq!(junior.salary.as_ref().and_then(|s| s.period.as_deref()), Some("hourly"));

    let staff = &run.items[1];
    assert_eq!(staff.description, "Spark and Kafka at scale.");
    assert_eq!(staff.location.city.as_deref(), Some("Lisbon"));
    assert_eq!(staff.location.region, None);
    assert_eq!(staff.location.country.as_deref(), Some("Portugal"));
    assert!(staff.salary.is_none());

    let research = &run.items[2];
    assert_eq!(research.company, None);
    assert_eq!(research.source, "seed:partner_feed");
    assert_eq!(research.location.city.as_deref(), Some("Remote"));
    assert!(research.location.remote);
    assert!(research.posted_at.is_none());
}

#[tokio::test]
async fn wider_window_keeps_older_postings() {
    let path = common::fixture_path("seed", "jobs.json");
    let adapter = SeedFileAdapter::new(path.to_string_lossy());
    let run = collect_items(&adapter, &fetcher(), &common::context(365))
        .await
        .unwrap();
    assert_eq!(run.items.len(), 4);
    assert_eq!(run.stale, 0);
}

#[tokio::test]
async fn missing_seed_file_is_an_error() {
    let adapter = SeedFileAdapter::new("/nonexistent/jme/seed.json");
    let err = collect_items(&adapter, &fetcher(), &common::context(14))
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Message(msg) if msg.contains("seed.json")));
}
