//! Batched maintenance passes over rows written before the current ingestion rules.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jme_core::{infer_seniority, normalize_salary};
use jme_storage::{JobStore, JobStoreTx};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dedup::{canonicalize_url, url_hash, IdentityKeys};

pub const DEFAULT_BATCH_SIZE: i64 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub batches: usize,
    pub scanned: usize,
    pub updated: usize,
    pub url_hash_conflicts: usize,
}

/// Walk rows missing a digest with a job-id seek cursor, committing once per batch.
///
/// A `url_hash` already owned by another row is left unset on this one. Safe to re-run.
pub async fn backfill_missing_hashes<S: JobStore>(
    store: &S,
    batch_size: i64,
) -> Result<BackfillSummary> {
    let batch_size = batch_size.max(1);
    let mut summary = BackfillSummary::default();
    let mut cursor: Option<Uuid> = None;

    loop {
        let mut tx = store.begin().await.context("opening backfill batch")?;
        let rows = tx
            .rows_missing_hashes(cursor, batch_size)
            .await
            .context("selecting rows missing hashes")?;
        if rows.is_empty() {
            tx.rollback().await?;
            break;
        }

        let mut updated = 0usize;
        for row in &rows {
            let keys = IdentityKeys::compute(row.url.as_deref(), &row.description_text);

            let mut url_hash = if row.url_hash.is_none() {
                keys.url_hash
            } else {
                None
            };
            if let Some(hash) = url_hash.as_deref() {
                let owner = tx.find_by_url_hash(hash).await?;
                if owner.is_some_and(|owner| owner != row.job_id) {
                    debug!(job_id = %row.job_id, url_hash = %hex::encode(hash), "url_hash owned by another row");
                    summary.url_hash_conflicts += 1;
                    url_hash = None;
                }
            }
            let desc_hash = row.desc_hash.is_none().then_some(keys.desc_hash);
            if url_hash.is_none() && desc_hash.is_none() {
                continue;
            }

            match tx
                .backfill_hashes(row.job_id, url_hash.as_deref(), desc_hash.as_deref())
                .await
            {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(err) if err.is_unique_violation() => {
                    debug!(job_id = %row.job_id, error = %err, "backfill lost a url_hash race");
                    summary.url_hash_conflicts += 1;
                }
                Err(err) => {
                    tx.rollback().await?;
                    return Err(err).context("backfilling hashes");
                }
            }
        }

        cursor = rows.last().map(|r| r.job_id);
        tx.commit().await.context("committing backfill batch")?;

        summary.batches += 1;
        summary.scanned += rows.len();
        summary.updated += updated;
        info!(
            batch = summary.batches,
            rows = rows.len(),
            updated,
            "hash backfill batch committed"
        );

        if (rows.len() as i64) < batch_size {
            break;
        }
    }

    Ok(summary)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub scanned: usize,
    pub groups: usize,
    pub deleted: usize,
    pub rehashed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HashDiagnostics {
    /// Rows with a URL but no `url_hash`.
    pub missing_url_hash: usize,
    /// Canonical URLs held by more than one row.
    pub duplicate_groups: usize,
}

#[derive(Debug, Clone)]
struct UrlIdentity {
    job_id: Uuid,
    key: Option<Vec<u8>>,
    hashed: bool,
    created_at: DateTime<Utc>,
}

async fn scan_url_identities<S: JobStore>(store: &S, batch_size: i64) -> Result<Vec<UrlIdentity>> {
    let batch_size = batch_size.max(1);
    let mut tx = store.begin().await.context("opening url scan")?;
    let mut identities = Vec::new();
    let mut cursor: Option<Uuid> = None;
    loop {
        let rows = tx
            .rows_with_url(cursor, batch_size)
            .await
            .context("selecting rows with a url")?;
        cursor = rows.last().map(|r| r.job_id);
        let done = (rows.len() as i64) < batch_size;
        identities.extend(rows.into_iter().map(|row| UrlIdentity {
            job_id: row.job_id,
            hashed: row.url_hash.is_some(),
            key: row.url_hash.or_else(|| url_hash(&canonicalize_url(&row.url))),
            created_at: row.created_at,
        }));
        if done {
            break;
        }
    }
    tx.rollback().await?;
    Ok(identities)
}

/// Rows sharing a URL identity, newest first (`created_at`, then `job_id`).
fn duplicate_groups(identities: Vec<UrlIdentity>) -> Vec<Vec<UrlIdentity>> {
    let mut by_key: BTreeMap<Vec<u8>, Vec<UrlIdentity>> = BTreeMap::new();
    for identity in identities {
        if let Some(key) = identity.key.clone() {
            by_key.entry(key).or_default().push(identity);
        }
    }
    by_key
        .into_values()
        .filter(|group| group.len() > 1)
        .map(|mut group| {
            group.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| b.job_id.cmp(&a.job_id))
            });
            group
        })
        .collect()
}

pub async fn hash_diagnostics<S: JobStore>(store: &S, batch_size: i64) -> Result<HashDiagnostics> {
    let identities = scan_url_identities(store, batch_size).await?;
    let missing_url_hash = identities.iter().filter(|i| !i.hashed).count();
    Ok(HashDiagnostics {
        missing_url_hash,
        duplicate_groups: duplicate_groups(identities).len(),
    })
}

/// Collapse rows whose URLs canonicalize to the same identity, keeping the newest.
///
/// Older rows (and their skill links) are deleted; a surviving row without a
/// `url_hash` gets the group's hash. Groups are committed `batch_size` at a time.
pub async fn merge_duplicate_urls<S: JobStore>(store: &S, batch_size: i64) -> Result<MergeSummary> {
    let identities = scan_url_identities(store, batch_size).await?;
    let mut summary = MergeSummary {
        scanned: identities.len(),
        ..MergeSummary::default()
    };
    let groups = duplicate_groups(identities);
    let chunk = usize::try_from(batch_size.max(1)).unwrap_or(1);

    for batch in groups.chunks(chunk) {
        let mut tx = store.begin().await.context("opening merge batch")?;
        for group in batch {
            let Some((keeper, older)) = group.split_first() else {
                continue;
            };
            for row in older {
                if tx.delete_job(row.job_id).await.context("deleting duplicate row")? {
                    summary.deleted += 1;
                }
            }
            if let (false, Some(key)) = (keeper.hashed, keeper.key.as_deref()) {
                match tx.backfill_hashes(keeper.job_id, Some(key), None).await {
                    Ok(true) => summary.rehashed += 1,
                    Ok(false) => {}
                    Err(err) if err.is_unique_violation() => {
                        warn!(job_id = %keeper.job_id, error = %err, "merged row still collides on url_hash");
                    }
                    Err(err) => {
                        tx.rollback().await?;
                        return Err(err).context("hashing merged row");
                    }
                }
            }
            debug!(
                job_id = %keeper.job_id,
                url_hash = %hex::encode(keeper.key.as_deref().unwrap_or_default()),
                removed = older.len(),
                "merged duplicate url group"
            );
            summary.groups += 1;
        }
        tx.commit().await.context("committing merge batch")?;
        info!(groups = batch.len(), "duplicate url batch committed");
    }

    Ok(summary)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    pub batches: usize,
    pub scanned: usize,
    pub updated: usize,
}

/// Derive missing `seniority` (from the title) and `salary_usd_annual` (from the
/// stored salary range) with the same rules ingestion applies. Safe to re-run.
pub async fn backfill_enrichments<S: JobStore>(
    store: &S,
    batch_size: i64,
) -> Result<EnrichmentSummary> {
    let batch_size = batch_size.max(1);
    let mut summary = EnrichmentSummary::default();
    let mut cursor: Option<Uuid> = None;

    loop {
        let mut tx = store.begin().await.context("opening enrichment batch")?;
        let rows = tx
            .rows_missing_enrichments(cursor, batch_size)
            .await
            .context("selecting rows missing enrichments")?;
        if rows.is_empty() {
            tx.rollback().await?;
            break;
        }

        let mut updated = 0usize;
        for row in &rows {
            let seniority = row
                .missing_seniority
                .then(|| infer_seniority(&row.title))
                .flatten();
            let salary_usd = row
                .missing_salary_usd
                .then(|| normalize_salary(&row.salary))
                .flatten();
            if seniority.is_none() && salary_usd.is_none() {
                continue;
            }
            if tx
                .fill_enrichments(row.job_id, seniority, salary_usd)
                .await
                .context("filling enrichments")?
            {
                updated += 1;
            }
        }

        cursor = rows.last().map(|r| r.job_id);
        tx.commit().await.context("committing enrichment batch")?;

        summary.batches += 1;
        summary.scanned += rows.len();
        summary.updated += updated;
        info!(
            batch = summary.batches,
            rows = rows.len(),
            updated,
            "enrichment batch committed"
        );

        if (rows.len() as i64) < batch_size {
            break;
        }
    }

    Ok(summary)
}
