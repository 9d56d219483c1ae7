//! Core domain model for the job market ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "jme-core";

/// Hard cap on stored description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 200_000;

/// Salary information as reported by a source, before any normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
    pub period: Option<String>,
}

/// Normalized (city, region, country) triple plus the remote flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Location {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub remote: bool,
}

impl Location {
    /// Parse a free-text location by comma-splitting.
    ///
    /// One part is a city, two parts are city + region, three or more parts are
    /// city, region and the last part as country. `Remote` is recognised on its own.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        if trimmed.eq_ignore_ascii_case("remote") {
            return Self {
                city: Some("Remote".to_string()),
                region: None,
                country: None,
                remote: true,
            };
        }

        let parts = trimmed
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let remote = trimmed.to_ascii_lowercase().contains("remote");
        match parts.as_slice() {
            [] => Self::default(),
            [city] => Self {
                city: Some(city.clone()),
                remote,
                ..Self::default()
            },
            [city, region] => Self {
                city: Some(city.clone()),
                region: Some(region.clone()),
                country: None,
                remote,
            },
            [city, region, .., country] => Self {
                city: Some(city.clone()),
                region: Some(region.clone()),
                country: Some(country.clone()),
                remote,
            },
        }
    }

    /// Explicit fields win; the free-text location is only parsed when all three are absent.
    pub fn from_parts(
        location: Option<&str>,
        city: Option<&str>,
        region: Option<&str>,
        country: Option<&str>,
    ) -> Self {
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };
        let (city, region, country) = (clean(city), clean(region), clean(country));
        if city.is_some() || region.is_some() || country.is_some() {
            let remote = city
                .as_deref()
                .map(|c| c.eq_ignore_ascii_case("remote"))
                .unwrap_or(false);
            return Self {
                city,
                region,
                country,
                remote,
            };
        }
        location.map(Self::parse).unwrap_or_default()
    }
}

/// The single inter-stage contract between adapters and the ingestion pipeline.
///
/// Adapters build these once; the pipeline only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundItem {
    pub title: String,
    pub company: Option<String>,
    pub description: String,
    pub url: Option<String>,
    pub location: Location,
    pub posted_at: Option<DateTime<Utc>>,
    pub source: String,
    pub salary: Option<SalaryRange>,
}

impl InboundItem {
    /// True when the posting is older than `cutoff`. Undated postings are never stale.
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        matches!(self.posted_at, Some(posted) if posted < cutoff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    Entry,
    Mid,
    Senior,
    Lead,
    Manager,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Entry => "entry",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
            Seniority::Lead => "lead",
            Seniority::Manager => "manager",
        }
    }
}

/// Keyword-based seniority guess from a job title.
pub fn infer_seniority(title: &str) -> Option<Seniority> {
    let lower = title.to_lowercase();
    let words = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>();
    if words.is_empty() {
        return None;
    }
    let has_any = |needles: &[&str]| words.iter().any(|w| needles.contains(w));

    let seniority = if has_any(&["intern", "interns", "internship", "junior", "jr", "entry"]) {
        Seniority::Entry
    } else if has_any(&["manager", "mgr", "management", "head"]) {
        Seniority::Manager
    } else if has_any(&["lead", "principal", "staff"]) {
        Seniority::Lead
    } else if has_any(&["senior", "sr"]) {
        Seniority::Senior
    } else {
        Seniority::Mid
    };
    Some(seniority)
}

/// Annualised midpoint of a salary range, converted to USD with a fixed rate table.
///
/// Approximate by design of the rate table; not suitable for payroll arithmetic.
pub fn normalize_salary(salary: &SalaryRange) -> Option<f64> {
    let (min, max) = match (salary.min, salary.max) {
        (None, None) => return None,
        (Some(min), None) => (min, min),
        (None, Some(max)) => (max, max),
        (Some(min), Some(max)) => (min, max),
    };
    let mut value = (min + max) / 2.0;

    let period = salary
        .period
        .as_deref()
        .unwrap_or("yearly")
        .to_ascii_lowercase();
    value *= match period.as_str() {
        "hour" | "hourly" | "per-hour-wage" => 2080.0,
        "day" | "daily" | "per-day-wage" => 260.0,
        "week" | "weekly" | "per-week-salary" => 52.0,
        "month" | "monthly" | "per-month-salary" => 12.0,
        _ => 1.0,
    };

    let currency = salary
        .currency
        .as_deref()
        .unwrap_or("USD")
        .to_ascii_uppercase();
    let rate = match currency.as_str() {
        "EUR" => 1.07,
        "GBP" => 1.26,
        "CAD" => 0.73,
        "AUD" => 0.66,
        _ => 1.0,
    };
    Some((value * rate).round())
}

/// Insert payload for a genuinely new Job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub job_id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Location,
    pub salary: SalaryRange,
    pub salary_usd_annual: Option<f64>,
    pub seniority: Option<Seniority>,
    pub posted_at: Option<DateTime<Utc>>,
    pub source: String,
    pub url: Option<String>,
    pub url_hash: Option<Vec<u8>>,
    pub desc_hash: Vec<u8>,
    pub description_text: String,
}

/// Persisted Job row as far as the ingestion core needs to see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredJob {
    pub job_id: Uuid,
    pub title: String,
    pub company: String,
    pub salary: SalaryRange,
    pub salary_usd_annual: Option<f64>,
    pub seniority: Option<Seniority>,
    pub source: String,
    pub url: Option<String>,
    pub url_hash: Option<Vec<u8>>,
    pub desc_hash: Option<Vec<u8>>,
    pub description_text: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredJob {
    pub fn from_new(job: &NewJob, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job.job_id,
            title: job.title.clone(),
            company: job.company.clone(),
            salary: job.salary.clone(),
            salary_usd_annual: job.salary_usd_annual,
            seniority: job.seniority,
            source: job.source.clone(),
            url: job.url.clone(),
            url_hash: job.url_hash.clone(),
            desc_hash: Some(job.desc_hash.clone()),
            description_text: job.description_text.clone(),
            posted_at: job.posted_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Skill dictionary row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub skill_id: i32,
    pub name_canonical: String,
    pub category: Option<String>,
    pub aliases: Vec<String>,
}

/// Seed record used to (re)populate the Skill set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDictionaryEntry {
    pub name_canonical: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// (job, skill) association with confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSkillLink {
    pub job_id: Uuid,
    pub skill_id: i32,
    pub confidence: f64,
    pub source: String,
}
