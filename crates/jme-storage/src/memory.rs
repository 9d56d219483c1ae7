//! In-process [`JobStore`] used by `--dry-run` and the test suites.
//!
//! Single writer: a session applies its writes to the shared state directly and
//! keeps a snapshot taken at `begin` so rollback (or drop) can restore it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use jme_core::{JobSkillLink, NewJob, Seniority, Skill, SkillDictionaryEntry, StoredJob};
use uuid::Uuid;

use crate::store::{
    EnrichmentRow, HashBackfillRow, JobStore, JobStoreTx, SkillUpsert, StoreError, UrlRow,
};

pub const URL_HASH_CONSTRAINT: &str = "jobs_url_hash_uq";

#[derive(Debug, Clone, Default)]
struct MemoryState {
    jobs: Vec<StoredJob>,
    skills: Vec<Skill>,
    job_skills: BTreeMap<(Uuid, i32), JobSkillLink>,
}

impl MemoryState {
    fn job_mut(&mut self, job_id: Uuid) -> Option<&mut StoredJob> {
        self.jobs.iter_mut().find(|j| j.job_id == job_id)
    }

    fn url_hash_taken(&self, url_hash: &[u8], except: Option<Uuid>) -> bool {
        self.jobs
            .iter()
            .any(|j| Some(j.job_id) != except && j.url_hash.as_deref() == Some(url_hash))
    }

    fn next_skill_id(&self) -> i32 {
        self.skills.iter().map(|s| s.skill_id).max().unwrap_or(0) + 1
    }

    /// Jobs after the seek cursor in job-id order.
    fn page<T>(
        &self,
        after: Option<Uuid>,
        limit: i64,
        row: impl Fn(&StoredJob) -> Option<T>,
    ) -> Vec<(Uuid, T)> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let mut rows = self
            .jobs
            .iter()
            .filter(|j| after.map_or(true, |after| j.job_id > after))
            .filter_map(|j| row(j).map(|r| (j.job_id, r)))
            .collect::<Vec<_>>();
        rows.sort_by_key(|(job_id, _)| *job_id);
        rows.truncate(limit);
        rows
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    pub fn jobs(&self) -> Vec<StoredJob> {
        self.lock().jobs.clone()
    }

    pub fn skills(&self) -> Vec<Skill> {
        self.lock().skills.clone()
    }

    pub fn job_skills(&self) -> Vec<JobSkillLink> {
        self.lock().job_skills.values().cloned().collect()
    }

    /// Seed a row as-is, e.g. a legacy row written before hashes existed.
    pub fn insert_stored_job(&self, job: StoredJob) {
        self.lock().jobs.push(job);
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    // a panicked test must not poison every later assertion
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl JobStore for MemoryJobStore {
    type Tx = MemoryJobStoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let snapshot = self.lock().clone();
        Ok(MemoryJobStoreTx {
            state: self.state.clone(),
            snapshot: Some(snapshot),
        })
    }
}

#[derive(Debug)]
pub struct MemoryJobStoreTx {
    state: Arc<Mutex<MemoryState>>,
    snapshot: Option<MemoryState>,
}

impl MemoryJobStoreTx {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *lock_state(&self.state) = snapshot;
        }
    }
}

impl Drop for MemoryJobStoreTx {
    fn drop(&mut self) {
        self.restore();
    }
}

#[async_trait]
impl JobStoreTx for MemoryJobStoreTx {
    async fn load_skills(&mut self) -> Result<Vec<Skill>, StoreError> {
        let mut skills = self.lock().skills.clone();
        skills.sort_by_key(|s| s.skill_id);
        Ok(skills)
    }

    async fn find_by_url_hash(&mut self, url_hash: &[u8]) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .find(|j| j.url_hash.as_deref() == Some(url_hash))
            .map(|j| j.job_id))
    }

    async fn find_legacy_by_url(&mut self, url: &str) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .filter(|j| j.url_hash.is_none() && j.url.as_deref() == Some(url))
            .min_by_key(|j| j.created_at)
            .map(|j| j.job_id))
    }

    async fn find_by_desc_hash(&mut self, desc_hash: &[u8]) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .lock()
            .jobs
            .iter()
            .find(|j| j.desc_hash.as_deref() == Some(desc_hash))
            .map(|j| j.job_id))
    }

    async fn find_conflicting(
        &mut self,
        url: Option<&str>,
        url_hash: Option<&[u8]>,
    ) -> Result<Option<Uuid>, StoreError> {
        let state = self.lock();
        let by_hash = url_hash.and_then(|hash| {
            state
                .jobs
                .iter()
                .find(|j| j.url_hash.as_deref() == Some(hash))
                .map(|j| j.job_id)
        });
        let by_url = || {
            url.and_then(|url| {
                state
                    .jobs
                    .iter()
                    .filter(|j| j.url.as_deref() == Some(url))
                    .min_by_key(|j| j.created_at)
                    .map(|j| j.job_id)
            })
        };
        Ok(by_hash.or_else(by_url))
    }

    async fn backfill_hashes(
        &mut self,
        job_id: Uuid,
        url_hash: Option<&[u8]>,
        desc_hash: Option<&[u8]>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(current) = state.jobs.iter().find(|j| j.job_id == job_id) else {
            return Ok(false);
        };
        let fill_url = current.url_hash.is_none() && url_hash.is_some();
        let fill_desc = current.desc_hash.is_none() && desc_hash.is_some();
        if !fill_url && !fill_desc {
            return Ok(false);
        }
        if let (true, Some(hash)) = (fill_url, url_hash) {
            if state.url_hash_taken(hash, Some(job_id)) {
                return Err(StoreError::UniqueViolation {
                    constraint: URL_HASH_CONSTRAINT.to_string(),
                });
            }
        }

        let Some(job) = state.job_mut(job_id) else {
            return Ok(false);
        };
        if fill_url {
            job.url_hash = url_hash.map(<[u8]>::to_vec);
        }
        if fill_desc {
            job.desc_hash = desc_hash.map(<[u8]>::to_vec);
        }
        job.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_job(&mut self, job: &NewJob) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(hash) = job.url_hash.as_deref() {
            if state.url_hash_taken(hash, None) {
                return Err(StoreError::UniqueViolation {
                    constraint: URL_HASH_CONSTRAINT.to_string(),
                });
            }
        }
        if state.jobs.iter().any(|j| j.job_id == job.job_id) {
            return Err(StoreError::UniqueViolation {
                constraint: "jobs_pkey".to_string(),
            });
        }
        state.jobs.push(StoredJob::from_new(job, Utc::now()));
        Ok(())
    }

    async fn ensure_skill(&mut self, name_canonical: &str) -> Result<i32, StoreError> {
        let mut state = self.lock();
        if let Some(skill) = state
            .skills
            .iter()
            .find(|s| s.name_canonical == name_canonical)
        {
            return Ok(skill.skill_id);
        }
        let skill_id = state.next_skill_id();
        state.skills.push(Skill {
            skill_id,
            name_canonical: name_canonical.to_string(),
            category: None,
            aliases: Vec::new(),
        });
        Ok(skill_id)
    }

    async fn upsert_job_skill(&mut self, link: &JobSkillLink) -> Result<(), StoreError> {
        self.lock()
            .job_skills
            .insert((link.job_id, link.skill_id), link.clone());
        Ok(())
    }

    async fn upsert_skill(
        &mut self,
        entry: &SkillDictionaryEntry,
    ) -> Result<SkillUpsert, StoreError> {
        let mut state = self.lock();
        if let Some(skill) = state
            .skills
            .iter_mut()
            .find(|s| s.name_canonical == entry.name_canonical)
        {
            skill.category = entry.category.clone();
            skill.aliases = entry.aliases.clone();
            return Ok(SkillUpsert::Updated);
        }
        let skill_id = state.next_skill_id();
        state.skills.push(Skill {
            skill_id,
            name_canonical: entry.name_canonical.clone(),
            category: entry.category.clone(),
            aliases: entry.aliases.clone(),
        });
        Ok(SkillUpsert::Inserted)
    }

    async fn rows_missing_hashes(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<HashBackfillRow>, StoreError> {
        let rows = self.lock().page(after, limit, |j| {
            let has_url = j.url.as_deref().is_some_and(|u| !u.is_empty());
            ((has_url && j.url_hash.is_none()) || j.desc_hash.is_none()).then(|| HashBackfillRow {
                job_id: j.job_id,
                url: j.url.clone(),
                description_text: j.description_text.clone(),
                url_hash: j.url_hash.clone(),
                desc_hash: j.desc_hash.clone(),
            })
        });
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn rows_with_url(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<UrlRow>, StoreError> {
        let rows = self.lock().page(after, limit, |j| {
            let url = j.url.as_deref().filter(|u| !u.is_empty())?;
            Some(UrlRow {
                job_id: j.job_id,
                url: url.to_string(),
                url_hash: j.url_hash.clone(),
                created_at: j.created_at,
            })
        });
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn delete_job(&mut self, job_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let before = state.jobs.len();
        state.jobs.retain(|j| j.job_id != job_id);
        state.job_skills.retain(|(job, _), _| *job != job_id);
        Ok(state.jobs.len() != before)
    }

    async fn rows_missing_enrichments(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<EnrichmentRow>, StoreError> {
        let rows = self.lock().page(after, limit, |j| {
            (j.seniority.is_none() || j.salary_usd_annual.is_none()).then(|| EnrichmentRow {
                job_id: j.job_id,
                title: j.title.clone(),
                salary: j.salary.clone(),
                missing_seniority: j.seniority.is_none(),
                missing_salary_usd: j.salary_usd_annual.is_none(),
            })
        });
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn fill_enrichments(
        &mut self,
        job_id: Uuid,
        seniority: Option<Seniority>,
        salary_usd_annual: Option<f64>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(job) = state.job_mut(job_id) else {
            return Ok(false);
        };
        let fill_seniority = job.seniority.is_none() && seniority.is_some();
        let fill_salary = job.salary_usd_annual.is_none() && salary_usd_annual.is_some();
        if fill_seniority {
            job.seniority = seniority;
        }
        if fill_salary {
            job.salary_usd_annual = salary_usd_annual;
        }
        if fill_seniority || fill_salary {
            job.updated_at = Utc::now();
        }
        Ok(fill_seniority || fill_salary)
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.restore();
        Ok(())
    }
}
