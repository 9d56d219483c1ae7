#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use jme_adapters::{AdapterContext, FetchedPage};
use jme_core::InboundItem;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenItem {
    pub title: String,
    pub company: Option<String>,
    pub url: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub remote: bool,
    pub posted_at: Option<String>,
    pub description: String,
    pub source: String,
}

pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .expect("workspace root")
}

pub fn fixture_path(provider: &str, file: &str) -> PathBuf {
    workspace_root()
        .join("fixtures")
        .join(provider)
        .join("sample")
        .join(file)
}

pub fn fixture_page(provider: &str, file: &str, url: &str) -> FetchedPage {
    let path = fixture_path(provider, file);
    FetchedPage {
        url: url.to_string(),
        body: fs::read_to_string(&path).expect("read fixture"),
        fetched_at: fetched_at(),
    }
}

pub fn fetched_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
}

pub fn context(days: u32) -> AdapterContext {
    AdapterContext {
        run_id: Uuid::nil(),
        fetched_at: fetched_at(),
        days,
    }
}

pub fn to_golden(items: &[InboundItem]) -> Vec<GoldenItem> {
    items
        .iter()
        .map(|i| GoldenItem {
            title: i.title.clone(),
            company: i.company.clone(),
            url: i.url.clone(),
            city: i.location.city.clone(),
            region: i.location.region.clone(),
            country: i.location.country.clone(),
            remote: i.location.remote,
            posted_at: i
                .posted_at
                .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            description: i.description.clone(),
            source: i.source.clone(),
        })
        .collect()
}

pub fn read_snapshot(provider: &str) -> Vec<GoldenItem> {
    let text = fs::read_to_string(fixture_path(provider, "snapshot.json")).expect("read snapshot");
    serde_json::from_str(&text).expect("parse snapshot")
}
