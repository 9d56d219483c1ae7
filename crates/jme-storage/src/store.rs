//! Persistence seam consumed by the ingestion pipeline.
//!
//! One [`JobStoreTx`] is one session/transaction. Writes made through it become
//! visible to other sessions only after [`JobStoreTx::commit`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jme_core::{JobSkillLink, NewJob, SalaryRange, Seniority, Skill, SkillDictionaryEntry};
use thiserror::Error;
use uuid::Uuid;

/// Postgres SQLSTATE for `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Row handed to the hash backfill utility.
#[derive(Debug, Clone, PartialEq)]
pub struct HashBackfillRow {
    pub job_id: Uuid,
    pub url: Option<String>,
    pub description_text: String,
    pub url_hash: Option<Vec<u8>>,
    pub desc_hash: Option<Vec<u8>>,
}

/// Row scanned by the duplicate-URL merge.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRow {
    pub job_id: Uuid,
    pub url: String,
    pub url_hash: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

/// Row whose derived seniority or annual USD salary is still NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRow {
    pub job_id: Uuid,
    pub title: String,
    pub salary: SalaryRange,
    pub missing_seniority: bool,
    pub missing_salary_usd: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillUpsert {
    Inserted,
    Updated,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    type Tx: JobStoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

#[async_trait]
pub trait JobStoreTx: Send {
    /// Skill rows in registration order (ascending id).
    async fn load_skills(&mut self) -> Result<Vec<Skill>, StoreError>;

    async fn find_by_url_hash(&mut self, url_hash: &[u8]) -> Result<Option<Uuid>, StoreError>;

    /// Raw-URL match restricted to legacy rows that have no `url_hash` yet.
    async fn find_legacy_by_url(&mut self, url: &str) -> Result<Option<Uuid>, StoreError>;

    async fn find_by_desc_hash(&mut self, desc_hash: &[u8]) -> Result<Option<Uuid>, StoreError>;

    /// Locate the row an insert collided with, by URL hash or raw URL.
    async fn find_conflicting(
        &mut self,
        url: Option<&str>,
        url_hash: Option<&[u8]>,
    ) -> Result<Option<Uuid>, StoreError>;

    /// Fill hash columns that are still NULL; existing values are never overwritten.
    /// Returns whether any column changed. A failed backfill leaves the session usable.
    async fn backfill_hashes(
        &mut self,
        job_id: Uuid,
        url_hash: Option<&[u8]>,
        desc_hash: Option<&[u8]>,
    ) -> Result<bool, StoreError>;

    /// Insert a new Job row. On [`StoreError::UniqueViolation`] nothing is written
    /// and the session stays usable.
    async fn insert_job(&mut self, job: &NewJob) -> Result<(), StoreError>;

    /// Id of the skill with this canonical name, creating it when missing.
    async fn ensure_skill(&mut self, name_canonical: &str) -> Result<i32, StoreError>;

    /// Insert or update confidence/provenance for a (job, skill) pair.
    async fn upsert_job_skill(&mut self, link: &JobSkillLink) -> Result<(), StoreError>;

    async fn upsert_skill(&mut self, entry: &SkillDictionaryEntry)
        -> Result<SkillUpsert, StoreError>;

    /// Rows missing `url_hash` (with a URL) or `desc_hash`, ordered by job id after `after`.
    async fn rows_missing_hashes(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<HashBackfillRow>, StoreError>;

    /// Rows with a non-empty URL, ordered by job id after `after`.
    async fn rows_with_url(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<UrlRow>, StoreError>;

    /// Remove a Job row and its skill links. Returns whether the row existed.
    async fn delete_job(&mut self, job_id: Uuid) -> Result<bool, StoreError>;

    /// Rows missing `seniority` or `salary_usd_annual`, ordered by job id after `after`.
    async fn rows_missing_enrichments(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<EnrichmentRow>, StoreError>;

    /// Fill enrichment columns that are still NULL; existing values are never overwritten.
    async fn fill_enrichments(
        &mut self,
        job_id: Uuid,
        seniority: Option<Seniority>,
        salary_usd_annual: Option<f64>,
    ) -> Result<bool, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}
