mod common;

use chrono::{TimeZone, Utc};
use jme_adapters::{DetailTarget, HtmlListingAdapter, SourceAdapter};

fn adapter() -> HtmlListingAdapter {
    HtmlListingAdapter::new("initech", "https://careers.initech.test/openings")
}

#[test]
fn listing_discovers_unique_job_links() {
    let page = common::fixture_page(
        "html",
        "listing.html",
        "https://careers.initech.test/openings",
    );
    let listing = adapter().parse_listing(&page).unwrap();
    assert!(listing.items.is_empty());
    assert_eq!(
        listing.details,
        vec![
            DetailTarget {
                url: "https://careers.initech.test/jobs/101".into(),
                title: "Data Scientist".into(),
            },
            DetailTarget {
                url: "https://careers.initech.test/jobs/102?utm_source=board".into(),
                title: "BI Developer".into(),
            },
        ]
    );
}

#[test]
fn detail_page_yields_item() {
    let target = DetailTarget {
        url: "https://careers.initech.test/jobs/101".into(),
        title: "Data Scientist".into(),
    };
    let page = common::fixture_page("html", "detail.html", &target.url);
    let item = adapter().parse_detail(&target, &page).unwrap();

    assert_eq!(item.title, "Data Scientist");
    assert_eq!(item.url.as_deref(), Some("https://careers.initech.test/jobs/101"));
    assert_eq!(item.source, "html:initech");
    assert_eq!(item.company, None);
    assert_eq!(item.location.city.as_deref(), Some("Denver"));
    assert_eq!(item.location.region.as_deref(), Some("CO"));
    assert_eq!(
        item.posted_at,
        Some(Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap())
    );
    assert!(item.description.contains("Model churn with Python and scikit-learn."));
    assert!(item.description.contains("Spark"));
    assert!(!item.description.contains("Initech</title>"));
}
