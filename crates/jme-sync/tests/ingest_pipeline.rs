use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use jme_core::{
    InboundItem, JobSkillLink, Location, NewJob, SalaryRange, Seniority, Skill,
    SkillDictionaryEntry, StoredJob,
};
use jme_storage::{
    EnrichmentRow, HashBackfillRow, JobStore, JobStoreTx, MemoryJobStore, MemoryJobStoreTx,
    SkillUpsert, StoreError, UrlRow,
};
use jme_sync::dedup::{canonicalize_url, desc_hash, url_hash};
use jme_sync::{ingest_items, seed_skills};
use uuid::Uuid;

fn item(title: &str, url: Option<&str>, description: &str) -> InboundItem {
    InboundItem {
        title: title.to_string(),
        company: Some("Acme".to_string()),
        description: description.to_string(),
        url: url.map(ToString::to_string),
        location: Location::parse("Austin, TX"),
        posted_at: Some(Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()),
        source: "greenhouse:acme".to_string(),
        salary: None,
    }
}

fn stored(url: Option<&str>, description: &str) -> StoredJob {
    let now = Utc::now();
    StoredJob {
        job_id: Uuid::new_v4(),
        title: "Existing".to_string(),
        company: "Acme".to_string(),
        salary: SalaryRange::default(),
        salary_usd_annual: None,
        seniority: None,
        source: "greenhouse:acme".to_string(),
        url: url.map(ToString::to_string),
        url_hash: None,
        desc_hash: None,
        description_text: description.to_string(),
        posted_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn dictionary() -> Vec<SkillDictionaryEntry> {
    vec![
        SkillDictionaryEntry {
            name_canonical: "python".to_string(),
            category: Some("language".to_string()),
            aliases: vec!["py".to_string()],
        },
        SkillDictionaryEntry {
            name_canonical: "sql".to_string(),
            category: Some("data".to_string()),
            aliases: Vec::new(),
        },
        SkillDictionaryEntry {
            name_canonical: "machine learning".to_string(),
            category: Some("ml".to_string()),
            aliases: vec!["ml".to_string()],
        },
    ]
}

#[tokio::test]
async fn rerunning_the_same_batch_adds_nothing() {
    let store = MemoryJobStore::new();
    let items = vec![
        item("Data Engineer", Some("https://acme.test/jobs/1"), "Pipelines"),
        item("Analyst", Some("https://acme.test/jobs/2"), "Dashboards"),
    ];

    let first = ingest_items(&store, "greenhouse:acme", &items).await.unwrap();
    assert_eq!((first.added, first.skipped), (2, 0));

    let second = ingest_items(&store, "greenhouse:acme", &items).await.unwrap();
    assert_eq!((second.added, second.skipped), (0, 2));
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(store.jobs().len(), 2);
}

#[tokio::test]
async fn tracking_variants_and_reworded_whitespace_are_duplicates() {
    let store = MemoryJobStore::new();
    let items = vec![
        item("Data Engineer", Some("https://acme.test/jobs/1?b=2&a=1"), "Build pipelines"),
        item(
            "Data Engineer",
            Some("https://acme.test/jobs/1/?a=1&utm_source=feed&b=2#apply"),
            "Something else entirely",
        ),
        item("Data Engineer (repost)", Some("https://mirror.test/x"), "  BUILD   pipelines "),
    ];

    let summary = ingest_items(&store, "greenhouse:acme", &items).await.unwrap();
    assert_eq!(summary.added, 1);
    assert_eq!(summary.skipped, 2);

    let jobs = store.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(
        jobs[0].url_hash,
        url_hash(&canonicalize_url("https://acme.test/jobs/1?a=1&b=2"))
    );
    assert_eq!(jobs[0].url.as_deref(), Some("https://acme.test/jobs/1?b=2&a=1"));
}

#[tokio::test]
async fn items_without_url_dedupe_on_description_only() {
    let store = MemoryJobStore::new();
    let items = vec![
        item("Seed Role", None, "Same text"),
        item("Seed Role Again", Some("   "), "same   TEXT"),
        item("Other", None, "Different text"),
    ];
    let summary = ingest_items(&store, "seed", &items).await.unwrap();
    assert_eq!((summary.added, summary.skipped), (2, 1));
    assert!(store.jobs().iter().all(|j| j.url_hash.is_none() && j.url.is_none()));
}

#[tokio::test]
async fn legacy_rows_get_hashes_instead_of_a_new_row() {
    let store = MemoryJobStore::new();
    let url = "https://acme.test/jobs/7?utm_source=x";
    let legacy = stored(Some(url), "Old description");
    store.insert_stored_job(legacy.clone());

    let summary = ingest_items(&store, "greenhouse:acme", &[item("Role", Some(url), "New description")])
        .await
        .unwrap();
    assert_eq!(summary.added, 0);
    assert_eq!(summary.legacy_backfills, 1);

    let jobs = store.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, legacy.job_id);
    assert_eq!(jobs[0].url_hash, url_hash(&canonicalize_url(url)));
    assert_eq!(jobs[0].desc_hash, Some(desc_hash("New description")));
}

#[tokio::test]
async fn new_jobs_get_dictionary_skill_links_once() {
    let store = MemoryJobStore::new();
    let seeded = seed_skills(&store, &dictionary()).await.unwrap();
    assert_eq!(seeded.inserted, 3);

    let items = vec![item(
        "Senior ML Engineer",
        Some("https://acme.test/jobs/ml"),
        "Python, SQL and machine learning. More Python.",
    )];
    let summary = ingest_items(&store, "greenhouse:acme", &items).await.unwrap();
    assert_eq!(summary.skill_links, 3);

    let links = store.job_skills();
    assert_eq!(links.len(), 3);
    assert!(links
        .iter()
        .all(|l| l.source == "dict_v1" && (l.confidence - 0.9).abs() < f64::EPSILON));

    ingest_items(&store, "greenhouse:acme", &items).await.unwrap();
    assert_eq!(store.job_skills().len(), 3);
    assert_eq!(store.skills().len(), 3);
}

#[tokio::test]
async fn invalid_dictionary_is_refused_before_writing() {
    let store = MemoryJobStore::new();
    let mut entries = dictionary();
    entries.push(SkillDictionaryEntry {
        name_canonical: "PyTorch".to_string(),
        category: None,
        aliases: vec!["PY".to_string()],
    });
    let err = seed_skills(&store, &entries).await.unwrap_err();
    assert!(err.to_string().contains("invalid skill dictionary"));
    assert!(store.skills().is_empty());

    let again = seed_skills(&store, &dictionary()).await.unwrap();
    assert_eq!(again.inserted, 3);
    let rerun = seed_skills(&store, &dictionary()).await.unwrap();
    assert_eq!((rerun.inserted, rerun.updated), (0, 3));
}

#[tokio::test]
async fn missing_company_falls_back_to_board_name() {
    let store = MemoryJobStore::new();
    let mut anonymous = item("Engineer", Some("https://big.test/jobs/1"), "Rust");
    anonymous.company = Some("  ".to_string());
    anonymous.source = "lever:big_data-co".to_string();
    ingest_items(&store, "lever:big_data-co", &[anonymous]).await.unwrap();
    assert_eq!(store.jobs()[0].company, "Big Data Co");
}

/// Hides committed rows from the url_hash lookup, as a concurrent writer would.
#[derive(Clone, Default)]
struct StaleReadStore {
    inner: MemoryJobStore,
}

struct StaleReadTx {
    inner: MemoryJobStoreTx,
}

/// Fails the nth insert (zero based) with a non-constraint error.
#[derive(Clone)]
struct FailingStore {
    inner: MemoryJobStore,
    fail_on: usize,
    inserts: Arc<AtomicUsize>,
}

struct FailingTx {
    inner: MemoryJobStoreTx,
    fail_on: usize,
    inserts: Arc<AtomicUsize>,
}

#[async_trait]
impl JobStore for StaleReadStore {
    type Tx = StaleReadTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(StaleReadTx {
            inner: self.inner.begin().await?,
        })
    }
}

#[async_trait]
impl JobStore for FailingStore {
    type Tx = FailingTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(FailingTx {
            inner: self.inner.begin().await?,
            fail_on: self.fail_on,
            inserts: Arc::clone(&self.inserts),
        })
    }
}

macro_rules! forward_tx {
    ($tx:ty, |$this:ident, $job:ident| $insert:block, |$fthis:ident, $hash:ident| $find:block) => {
        #[async_trait]
        impl JobStoreTx for $tx {
            async fn load_skills(&mut self) -> Result<Vec<Skill>, StoreError> {
                self.inner.load_skills().await
            }

            async fn find_by_url_hash(&mut self, $hash: &[u8]) -> Result<Option<Uuid>, StoreError> {
                let $fthis = self;
                $find
            }

            async fn find_legacy_by_url(&mut self, url: &str) -> Result<Option<Uuid>, StoreError> {
                self.inner.find_legacy_by_url(url).await
            }

            async fn find_by_desc_hash(&mut self, hash: &[u8]) -> Result<Option<Uuid>, StoreError> {
                self.inner.find_by_desc_hash(hash).await
            }

            async fn find_conflicting(
                &mut self,
                url: Option<&str>,
                hash: Option<&[u8]>,
            ) -> Result<Option<Uuid>, StoreError> {
                self.inner.find_conflicting(url, hash).await
            }

            async fn backfill_hashes(
                &mut self,
                job_id: Uuid,
                url_hash: Option<&[u8]>,
                desc_hash: Option<&[u8]>,
            ) -> Result<bool, StoreError> {
                self.inner.backfill_hashes(job_id, url_hash, desc_hash).await
            }

            async fn insert_job(&mut self, $job: &NewJob) -> Result<(), StoreError> {
                let $this = self;
                $insert
            }

            async fn ensure_skill(&mut self, name: &str) -> Result<i32, StoreError> {
                self.inner.ensure_skill(name).await
            }

            async fn upsert_job_skill(&mut self, link: &JobSkillLink) -> Result<(), StoreError> {
                self.inner.upsert_job_skill(link).await
            }

            async fn upsert_skill(
                &mut self,
                entry: &SkillDictionaryEntry,
            ) -> Result<SkillUpsert, StoreError> {
                self.inner.upsert_skill(entry).await
            }

            async fn rows_missing_hashes(
                &mut self,
                after: Option<Uuid>,
                limit: i64,
            ) -> Result<Vec<HashBackfillRow>, StoreError> {
                self.inner.rows_missing_hashes(after, limit).await
            }

            async fn rows_with_url(
                &mut self,
                after: Option<Uuid>,
                limit: i64,
            ) -> Result<Vec<UrlRow>, StoreError> {
                self.inner.rows_with_url(after, limit).await
            }

            async fn delete_job(&mut self, job_id: Uuid) -> Result<bool, StoreError> {
                self.inner.delete_job(job_id).await
            }

            async fn rows_missing_enrichments(
                &mut self,
                after: Option<Uuid>,
                limit: i64,
            ) -> Result<Vec<EnrichmentRow>, StoreError> {
                self.inner.rows_missing_enrichments(after, limit).await
            }

            async fn fill_enrichments(
                &mut self,
                job_id: Uuid,
                seniority: Option<Seniority>,
                salary_usd_annual: Option<f64>,
            ) -> Result<bool, StoreError> {
                self.inner
                    .fill_enrichments(job_id, seniority, salary_usd_annual)
                    .await
            }

            async fn commit(self) -> Result<(), StoreError> {
                self.inner.commit().await
            }

            async fn rollback(self) -> Result<(), StoreError> {
                self.inner.rollback().await
            }
        }
    };
}

forward_tx!(
    StaleReadTx,
    |this, job| { this.inner.insert_job(job).await },
    |_this, _hash| { Ok(None) }
);

forward_tx!(
    FailingTx,
    |this, job| {
        if this.inserts.fetch_add(1, Ordering::SeqCst) == this.fail_on {
            return Err(StoreError::Decode("connection reset mid-insert".to_string()));
        }
        this.inner.insert_job(job).await
    },
    |this, hash| { this.inner.find_by_url_hash(hash).await }
);

#[tokio::test]
async fn insert_race_is_recovered_by_backfilling_the_winner() {
    let store = StaleReadStore::default();
    let url = "https://acme.test/jobs/9?utm_medium=email";
    let mut winner = stored(Some("https://acme.test/jobs/9"), "Written by the other worker");
    winner.url_hash = url_hash(&canonicalize_url(url));
    store.inner.insert_stored_job(winner.clone());

    let summary = ingest_items(&store, "greenhouse:acme", &[item("Role", Some(url), "Our copy")])
        .await
        .unwrap();
    assert_eq!(summary.race_recoveries, 1);
    assert_eq!(summary.added, 0);
    assert_eq!(summary.skipped, 1);

    let jobs = store.inner.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, winner.job_id);
    assert_eq!(jobs[0].desc_hash, Some(desc_hash("Our copy")));
}

#[tokio::test]
async fn other_store_errors_roll_back_the_whole_run() {
    let store = FailingStore {
        inner: MemoryJobStore::new(),
        fail_on: 1,
        inserts: Arc::new(AtomicUsize::new(0)),
    };
    let items = vec![
        item("First", Some("https://acme.test/jobs/1"), "one"),
        item("Second", Some("https://acme.test/jobs/2"), "two"),
    ];

    let err = ingest_items(&store, "greenhouse:acme", &items).await.unwrap_err();
    assert!(format!("{err:#}").contains("connection reset"));
    assert!(store.inner.jobs().is_empty());
}
