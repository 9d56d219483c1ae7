mod common;

use jme_adapters::{GreenhouseAdapter, SourceAdapter};

#[test]
fn greenhouse_board_matches_snapshot() {
    let adapter = GreenhouseAdapter::new("acme");
    let page = common::fixture_page(
        "greenhouse",
        "jobs.json",
        "https://boards-api.greenhouse.io/v1/boards/acme/jobs?content=true",
    );
    let listing = adapter.parse_listing(&page).unwrap();
    assert!(listing.details.is_empty());
    assert_eq!(common::to_golden(&listing.items), common::read_snapshot("greenhouse"));
}

#[test]
fn greenhouse_rejects_malformed_payload() {
    let adapter = GreenhouseAdapter::new("acme");
    let mut page = common::fixture_page("greenhouse", "jobs.json", "https://example.test");
    page.body = "<html>not json</html>".to_string();
    assert!(adapter.parse_listing(&page).is_err());
}
