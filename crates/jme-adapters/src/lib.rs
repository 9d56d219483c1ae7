//! Source adapter contracts + provider adapters (JSON APIs, allow-listed HTML, seed files).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use futures::future::join_all;
use jme_core::{InboundItem, Location, SalaryRange, MAX_DESCRIPTION_CHARS};
use jme_storage::{FetchError, FetchedResponse, HttpFetcher};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

pub const CRATE_NAME: &str = "jme-adapters";

pub const GREENHOUSE_API_BASE: &str = "https://boards-api.greenhouse.io/v1/boards";
pub const LEVER_API_BASE: &str = "https://api.lever.co/v0/postings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crawlability {
    Api,
    PublicHtml,
    StaticFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    pub fn from_response(resp: FetchedResponse, fetched_at: DateTime<Utc>) -> Self {
        Self {
            url: resp.final_url,
            body: resp.body,
            fetched_at,
        }
    }
}

/// Per-run inputs shared by every adapter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterContext {
    pub run_id: Uuid,
    pub fetched_at: DateTime<Utc>,
    pub days: u32,
}

impl AdapterContext {
    pub fn new(days: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            fetched_at: Utc::now(),
            days,
        }
    }

    /// Postings dated before this instant are stale.
    pub fn cutoff(&self) -> DateTime<Utc> {
        self.fetched_at - Duration::days(i64::from(self.days))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingTarget {
    pub url: String,
    pub query: Vec<(String, String)>,
}

/// A detail page to scrape, with whatever the listing already told us about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailTarget {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedListing {
    pub items: Vec<InboundItem>,
    pub details: Vec<DetailTarget>,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown provider `{0}`")]
    UnknownProvider(String),
    #[error("html board `{0}` is not in the source registry allow-list")]
    NotAllowListed(String),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn provider(&self) -> &'static str;
    fn board(&self) -> &str;
    fn crawlability(&self) -> Crawlability;
    fn listing_targets(&self) -> Vec<ListingTarget>;

    fn source_tag(&self) -> String {
        format!("{}:{}", self.provider(), self.board())
    }

    async fn fetch_listing(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        targets: &[ListingTarget],
    ) -> Result<Vec<FetchedPage>, AdapterError> {
        let mut pages = Vec::with_capacity(targets.len());
        for target in targets {
            let query = target
                .query
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect::<Vec<_>>();
            let resp = http.fetch_text(&target.url, &query).await?;
            pages.push(FetchedPage::from_response(resp, ctx.fetched_at));
        }
        Ok(pages)
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ParsedListing, AdapterError>;

    async fn fetch_detail(
        &self,
        http: &HttpFetcher,
        ctx: &AdapterContext,
        target: &DetailTarget,
    ) -> Result<FetchedPage, AdapterError> {
        let resp = http.fetch_text(&target.url, &[]).await?;
        Ok(FetchedPage::from_response(resp, ctx.fetched_at))
    }

    fn parse_detail(
        &self,
        _target: &DetailTarget,
        _page: &FetchedPage,
    ) -> Result<InboundItem, AdapterError> {
        Err(AdapterError::Message(format!(
            "{} does not scrape detail pages",
            self.provider()
        )))
    }
}

/// Outcome of one adapter call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterRun {
    pub items: Vec<InboundItem>,
    pub failed: usize,
    pub stale: usize,
}

/// Drive one adapter: listing fetch, bounded detail fan-out, freshness filter.
///
/// A failing detail page is logged and counted, never fatal. Detail fetches share
/// the fetcher's concurrency gate, so at most `concurrency` are in flight. Local
/// files skip the politeness pause.
pub async fn collect_items(
    adapter: &dyn SourceAdapter,
    http: &HttpFetcher,
    ctx: &AdapterContext,
) -> Result<AdapterRun, AdapterError> {
    let targets = adapter.listing_targets();
    let pages = adapter.fetch_listing(http, ctx, &targets).await?;

    let mut run = AdapterRun::default();
    let mut items = Vec::new();
    let mut details = Vec::new();
    for page in &pages {
        let listing = adapter.parse_listing(page)?;
        items.extend(listing.items);
        details.extend(listing.details);
    }

    let scraped = join_all(details.iter().map(|target| async move {
        let page = adapter.fetch_detail(http, ctx, target).await?;
        adapter.parse_detail(target, &page)
    }))
    .await;
    for (target, result) in details.iter().zip(scraped) {
        match result {
            Ok(item) => items.push(item),
            Err(err) => {
                warn!(url = %target.url, error = %err, "detail fetch failed, skipping");
                run.failed += 1;
            }
        }
    }

    let cutoff = ctx.cutoff();
    for item in items {
        if item.is_older_than(cutoff) {
            run.stale += 1;
        } else {
            run.items.push(item);
        }
    }
    debug!(
        source = %adapter.source_tag(),
        kept = run.items.len(),
        stale = run.stale,
        failed = run.failed,
        "adapter call finished"
    );

    if adapter.crawlability() != Crawlability::StaticFile {
        http.polite_pause().await;
    }
    Ok(run)
}

fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_selector(selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector).map_err(|e| AdapterError::Parse(e.to_string()))
}

fn select_first_text(document: &Html, selector: &str) -> Result<Option<String>, AdapterError> {
    let sel = parse_selector(selector)?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|n| text_or_none(n.text().collect::<String>())))
}

/// Visible text of an HTML fragment, one line per non-empty text node.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Greenhouse ships entity-escaped markup; unescape before stripping tags.
fn decode_escaped_html(content: &str) -> String {
    if content.contains('<') {
        return html_to_text(content);
    }
    let unescaped = Html::parse_fragment(content)
        .root_element()
        .text()
        .collect::<String>();
    html_to_text(&unescaped)
}

pub fn clamp_description(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

/// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` (UTC assumed) or RFC 3339.
pub fn parse_posted_at(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

fn posted_on_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)posted\s+on\s+([A-Za-z]{3,9}\s+\d{1,2},\s+\d{4})")
            .expect("valid posted-on regex")
    })
}

/// Date from a "posted on March 3, 2025" phrase anywhere in the page text.
pub fn parse_posted_on_phrase(text: &str) -> Option<DateTime<Utc>> {
    let caps = posted_on_regex().captures(text)?;
    let raw = caps.get(1)?.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDate::parse_from_str(&raw, "%B %d, %Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[derive(Debug, Deserialize)]
struct GreenhouseBoard {
    #[serde(default)]
    jobs: Vec<GreenhouseJob>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseJob {
    #[serde(default)]
    title: String,
    #[serde(default)]
    absolute_url: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    location: Option<GreenhouseLocation>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseLocation {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GreenhouseAdapter {
    board: String,
}

impl GreenhouseAdapter {
    pub fn new(board: impl Into<String>) -> Self {
        Self {
            board: board.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for GreenhouseAdapter {
    fn provider(&self) -> &'static str {
        "greenhouse"
    }

    fn board(&self) -> &str {
        &self.board
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::Api
    }

    fn listing_targets(&self) -> Vec<ListingTarget> {
        vec![ListingTarget {
            url: format!("{GREENHOUSE_API_BASE}/{}/jobs", self.board),
            query: vec![("content".to_string(), "true".to_string())],
        }]
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ParsedListing, AdapterError> {
        let board: GreenhouseBoard = serde_json::from_str(&page.body)
            .map_err(|e| AdapterError::Parse(format!("greenhouse jobs payload: {e}")))?;
        let source = self.source_tag();
        let items = board
            .jobs
            .into_iter()
            .filter(|job| !job.title.trim().is_empty())
            .map(|job| {
                let location = job
                    .location
                    .and_then(|l| l.name)
                    .map(|name| Location::parse(&name))
                    .unwrap_or_default();
                InboundItem {
                    title: job.title.trim().to_string(),
                    company: job.company_name.and_then(text_or_none),
                    description: clamp_description(&decode_escaped_html(
                        job.content.as_deref().unwrap_or_default(),
                    )),
                    url: job.absolute_url.and_then(text_or_none),
                    location,
                    posted_at: job.updated_at.as_deref().and_then(parse_posted_at),
                    source: source.clone(),
                    salary: None,
                }
            })
            .collect();
        Ok(ParsedListing {
            items,
            details: Vec::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverPosting {
    #[serde(default)]
    text: String,
    #[serde(default)]
    hosted_url: Option<String>,
    #[serde(default)]
    apply_url: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    categories: LeverCategories,
    #[serde(default)]
    description_plain: Option<String>,
    #[serde(default)]
    lists: Vec<LeverList>,
    #[serde(default)]
    additional_plain: Option<String>,
    #[serde(default)]
    salary_range: Option<LeverSalary>,
    #[serde(default)]
    workplace_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LeverCategories {
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeverList {
    #[serde(default)]
    text: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct LeverSalary {
    min: Option<f64>,
    max: Option<f64>,
    currency: Option<String>,
    interval: Option<String>,
}

impl LeverPosting {
    fn description(&self) -> String {
        let mut parts = Vec::new();
        if let Some(plain) = self.description_plain.as_deref() {
            parts.push(plain.trim().to_string());
        }
        for list in &self.lists {
            parts.push(list.text.trim().to_string());
            parts.push(html_to_text(&list.content));
        }
        if let Some(extra) = self.additional_plain.as_deref() {
            parts.push(extra.trim().to_string());
        }
        parts.retain(|p| !p.is_empty());
        parts.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct LeverAdapter {
    board: String,
}

impl LeverAdapter {
    pub fn new(board: impl Into<String>) -> Self {
        Self {
            board: board.into(),
        }
    }
}

#[async_trait]
impl SourceAdapter for LeverAdapter {
    fn provider(&self) -> &'static str {
        "lever"
    }

    fn board(&self) -> &str {
        &self.board
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::Api
    }

    fn listing_targets(&self) -> Vec<ListingTarget> {
        vec![ListingTarget {
            url: format!("{LEVER_API_BASE}/{}", self.board),
            query: vec![("mode".to_string(), "json".to_string())],
        }]
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ParsedListing, AdapterError> {
        let postings: Vec<LeverPosting> = serde_json::from_str(&page.body)
            .map_err(|e| AdapterError::Parse(format!("lever postings payload: {e}")))?;
        let source = self.source_tag();
        let items = postings
            .into_iter()
            .filter(|p| !p.text.trim().is_empty())
            .map(|p| {
                let description = clamp_description(&p.description());
                let mut location = p
                    .categories
                    .location
                    .as_deref()
                    .map(Location::parse)
                    .unwrap_or_default();
                if p
                    .workplace_type
                    .as_deref()
                    .is_some_and(|w| w.eq_ignore_ascii_case("remote"))
                {
                    location.remote = true;
                }
                InboundItem {
                    title: p.text.trim().to_string(),
                    company: None,
                    description,
                    url: p.hosted_url.or(p.apply_url).and_then(text_or_none),
                    location,
                    posted_at: p.created_at.and_then(DateTime::<Utc>::from_timestamp_millis),
                    source: source.clone(),
                    salary: p.salary_range.map(|s| SalaryRange {
                        min: s.min,
                        max: s.max,
                        currency: s.currency,
                        period: s.interval,
                    }),
                }
            })
            .collect();
        Ok(ParsedListing {
            items,
            details: Vec::new(),
        })
    }
}

/// Lower-confidence fallback: discover `/jobs/` links on an allow-listed page and scrape each.
#[derive(Debug, Clone)]
pub struct HtmlListingAdapter {
    board: String,
    list_url: String,
}

impl HtmlListingAdapter {
    pub fn new(board: impl Into<String>, list_url: impl Into<String>) -> Self {
        Self {
            board: board.into(),
            list_url: list_url.into(),
        }
    }

    /// Resolve `href` against the listing page; links to other hosts are not followed.
    fn resolve_link(base: &Url, href: &str) -> Option<String> {
        let url = base.join(href).ok()?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str() != base.host_str() {
            debug!(listing = %base, href, "ignoring off-site job link");
            return None;
        }
        Some(url.to_string())
    }
}

#[async_trait]
impl SourceAdapter for HtmlListingAdapter {
    fn provider(&self) -> &'static str {
        "html"
    }

    fn board(&self) -> &str {
        &self.board
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::PublicHtml
    }

    fn listing_targets(&self) -> Vec<ListingTarget> {
        vec![ListingTarget {
            url: self.list_url.clone(),
            query: Vec::new(),
        }]
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ParsedListing, AdapterError> {
        let document = Html::parse_document(&page.body);
        let anchors = parse_selector("a[href*='/jobs/']")?;
        let base = if page.url.is_empty() {
            self.list_url.as_str()
        } else {
            page.url.as_str()
        };
        let base = Url::parse(base)
            .map_err(|e| AdapterError::Parse(format!("listing url {base}: {e}")))?;

        let mut seen = BTreeSet::new();
        let mut details = Vec::new();
        for anchor in document.select(&anchors) {
            let Some(title) = text_or_none(anchor.text().collect::<String>()) else {
                continue;
            };
            let Some(url) = anchor
                .value()
                .attr("href")
                .and_then(|href| Self::resolve_link(&base, href.trim()))
            else {
                continue;
            };
            if seen.insert(url.clone()) {
                details.push(DetailTarget { url, title });
            }
        }
        Ok(ParsedListing {
            items: Vec::new(),
            details,
        })
    }

    fn parse_detail(
        &self,
        target: &DetailTarget,
        page: &FetchedPage,
    ) -> Result<InboundItem, AdapterError> {
        let document = Html::parse_document(&page.body);
        let body = parse_selector("body")?;
        let root = document
            .select(&body)
            .next()
            .unwrap_or_else(|| document.root_element());
        let lines = root
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>();

        let location = select_first_text(
            &document,
            ".location, .job-location, [data-qa='job-location']",
        )?
        .map(|text| Location::parse(&text))
        .unwrap_or_default();

        Ok(InboundItem {
            title: target.title.clone(),
            company: None,
            description: clamp_description(&lines.join("\n")),
            url: Some(target.url.clone()),
            location,
            posted_at: parse_posted_on_phrase(&lines.join(" ")),
            source: self.source_tag(),
            salary: None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SeedRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    description_text: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    remote: Option<bool>,
    #[serde(default)]
    posted_at: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    salary_min: Option<f64>,
    #[serde(default)]
    salary_max: Option<f64>,
    #[serde(default)]
    salary_currency: Option<String>,
    #[serde(default)]
    salary_period: Option<String>,
}

/// Static JSON array of already-shaped postings; `board` is the file path.
#[derive(Debug, Clone)]
pub struct SeedFileAdapter {
    path: String,
}

impl SeedFileAdapter {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceAdapter for SeedFileAdapter {
    fn provider(&self) -> &'static str {
        "seed"
    }

    fn board(&self) -> &str {
        &self.path
    }

    fn crawlability(&self) -> Crawlability {
        Crawlability::StaticFile
    }

    fn listing_targets(&self) -> Vec<ListingTarget> {
        vec![ListingTarget {
            url: self.path.clone(),
            query: Vec::new(),
        }]
    }

    async fn fetch_listing(
        &self,
        _http: &HttpFetcher,
        ctx: &AdapterContext,
        targets: &[ListingTarget],
    ) -> Result<Vec<FetchedPage>, AdapterError> {
        let mut pages = Vec::with_capacity(targets.len());
        for target in targets {
            let body = tokio::fs::read_to_string(&target.url)
                .await
                .map_err(|e| AdapterError::Message(format!("reading {}: {e}", target.url)))?;
            pages.push(FetchedPage {
                url: target.url.clone(),
                body,
                fetched_at: ctx.fetched_at,
            });
        }
        Ok(pages)
    }

    fn parse_listing(&self, page: &FetchedPage) -> Result<ParsedListing, AdapterError> {
        let records: Vec<SeedRecord> = serde_json::from_str(&page.body)
            .map_err(|e| AdapterError::Parse(format!("seed file {}: {e}", page.url)))?;
        let items = records
            .into_iter()
            .filter_map(|r| {
                let title = r.title.and_then(text_or_none)?;
                let mut location = Location::from_parts(
                    r.location.as_deref(),
                    r.city.as_deref(),
                    r.region.as_deref(),
                    r.country.as_deref(),
                );
                location.remote |= r.remote.unwrap_or(false);
                let salary = (r.salary_min.is_some() || r.salary_max.is_some()).then(|| {
                    SalaryRange {
                        min: r.salary_min,
                        max: r.salary_max,
                        currency: r.salary_currency,
                        period: r.salary_period,
                    }
                });
                Some(InboundItem {
                    title,
                    company: r.company.and_then(text_or_none),
                    description: clamp_description(
                        r.description_text
                            .as_deref()
                            .or(r.description.as_deref())
                            .unwrap_or_default(),
                    ),
                    url: r.url.and_then(text_or_none),
                    location,
                    posted_at: r.posted_at.as_deref().and_then(parse_posted_at),
                    source: r
                        .source
                        .and_then(text_or_none)
                        .unwrap_or_else(|| "seed".to_string()),
                    salary,
                })
            })
            .collect();
        Ok(ParsedListing {
            items,
            details: Vec::new(),
        })
    }
}

/// HTML boards that may be scraped, keyed by board name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlAllowList {
    boards: BTreeMap<String, String>,
}

impl HtmlAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&mut self, board: impl Into<String>, list_url: impl Into<String>) {
        self.boards.insert(board.into(), list_url.into());
    }

    pub fn list_url(&self, board: &str) -> Option<&str> {
        self.boards.get(board).map(String::as_str)
    }
}

/// Split a `<provider>:<board>` selector.
pub fn parse_source_tag(source: &str) -> Result<(&str, &str), AdapterError> {
    let (provider, board) = source
        .split_once(':')
        .map(|(p, b)| (p.trim(), b.trim()))
        .ok_or_else(|| {
            AdapterError::Message(format!("source `{source}` must look like <provider>:<board>"))
        })?;
    if provider.is_empty() || board.is_empty() {
        return Err(AdapterError::Message(format!(
            "source `{source}` must look like <provider>:<board>"
        )));
    }
    Ok((provider, board))
}

pub fn adapter_for_source(
    source: &str,
    allow_list: &HtmlAllowList,
) -> Result<Box<dyn SourceAdapter>, AdapterError> {
    let (provider, board) = parse_source_tag(source)?;
    match provider {
        "greenhouse" => Ok(Box::new(GreenhouseAdapter::new(board))),
        "lever" => Ok(Box::new(LeverAdapter::new(board))),
        "html" => {
            let list_url = allow_list
                .list_url(board)
                .ok_or_else(|| AdapterError::NotAllowListed(board.to_string()))?;
            Ok(Box::new(HtmlListingAdapter::new(board, list_url)))
        }
        "seed" => Ok(Box::new(SeedFileAdapter::new(board))),
        other => Err(AdapterError::UnknownProvider(other.to_string())),
    }
}
