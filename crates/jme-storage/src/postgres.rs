use async_trait::async_trait;
use jme_core::{JobSkillLink, NewJob, SalaryRange, Seniority, Skill, SkillDictionaryEntry};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Acquire, PgPool, Postgres, Row, Transaction};
use tracing::warn;
use uuid::Uuid;

use crate::store::{
    EnrichmentRow, HashBackfillRow, JobStore, JobStoreTx, SkillUpsert, StoreError, UrlRow,
};

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    type Tx = PgJobStoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(PgJobStoreTx {
            tx: self.pool.begin().await?,
        })
    }
}

pub struct PgJobStoreTx {
    tx: Transaction<'static, Postgres>,
}

fn job_id_of(row: Option<PgRow>) -> Result<Option<Uuid>, StoreError> {
    row.map(|r| r.try_get::<Uuid, _>("job_id"))
        .transpose()
        .map_err(StoreError::from)
}

fn parse_aliases(skill: &str, aliases_json: Option<&str>) -> Vec<String> {
    let raw = aliases_json.unwrap_or("[]");
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(aliases) => aliases,
        Err(err) => {
            warn!(skill, error = %err, "ignoring malformed aliases_json");
            Vec::new()
        }
    }
}

#[async_trait]
impl JobStoreTx for PgJobStoreTx {
    async fn load_skills(&mut self) -> Result<Vec<Skill>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT skill_id, name_canonical, category, aliases_json
            FROM skills
            ORDER BY skill_id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|r| {
                let name: String = r.try_get("name_canonical")?;
                let aliases_json: Option<String> = r.try_get("aliases_json")?;
                Ok(Skill {
                    skill_id: r.try_get("skill_id")?,
                    aliases: parse_aliases(&name, aliases_json.as_deref()),
                    name_canonical: name,
                    category: r.try_get("category")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn find_by_url_hash(&mut self, url_hash: &[u8]) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query("SELECT job_id FROM jobs WHERE url_hash = $1 LIMIT 1")
            .bind(url_hash)
            .fetch_optional(&mut *self.tx)
            .await?;
        job_id_of(row)
    }

    async fn find_legacy_by_url(&mut self, url: &str) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query(
            "SELECT job_id FROM jobs WHERE url = $1 AND url_hash IS NULL ORDER BY created_at LIMIT 1",
        )
        .bind(url)
        .fetch_optional(&mut *self.tx)
        .await?;
        job_id_of(row)
    }

    async fn find_by_desc_hash(&mut self, desc_hash: &[u8]) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query("SELECT job_id FROM jobs WHERE desc_hash = $1 LIMIT 1")
            .bind(desc_hash)
            .fetch_optional(&mut *self.tx)
            .await?;
        job_id_of(row)
    }

    async fn find_conflicting(
        &mut self,
        url: Option<&str>,
        url_hash: Option<&[u8]>,
    ) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT job_id
            FROM jobs
            WHERE ($1::bytea IS NOT NULL AND url_hash = $1)
               OR ($2::text IS NOT NULL AND url = $2)
            ORDER BY (url_hash = $1) DESC NULLS LAST, created_at
            LIMIT 1
            "#,
        )
        .bind(url_hash)
        .bind(url)
        .fetch_optional(&mut *self.tx)
        .await?;
        job_id_of(row)
    }

    async fn backfill_hashes(
        &mut self,
        job_id: Uuid,
        url_hash: Option<&[u8]>,
        desc_hash: Option<&[u8]>,
    ) -> Result<bool, StoreError> {
        let mut savepoint = Acquire::begin(&mut self.tx).await?;
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET url_hash = COALESCE(url_hash, $2),
                desc_hash = COALESCE(desc_hash, $3),
                updated_at = NOW()
            WHERE job_id = $1
              AND ((url_hash IS NULL AND $2::bytea IS NOT NULL)
                OR (desc_hash IS NULL AND $3::bytea IS NOT NULL))
            "#,
        )
        .bind(job_id)
        .bind(url_hash)
        .bind(desc_hash)
        .execute(&mut *savepoint)
        .await;

        match result {
            Ok(done) => {
                savepoint.commit().await?;
                Ok(done.rows_affected() > 0)
            }
            Err(err) => {
                savepoint.rollback().await?;
                Err(err.into())
            }
        }
    }

    async fn insert_job(&mut self, job: &NewJob) -> Result<(), StoreError> {
        let mut savepoint = Acquire::begin(&mut self.tx).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (
                job_id, title, company, city, region, country, remote_flag,
                salary_min, salary_max, salary_currency, salary_period,
                salary_usd_annual, seniority, posted_at, source, url,
                url_hash, desc_hash, description_text, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, NOW(), NOW())
            "#,
        )
        .bind(job.job_id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(job.location.city.as_deref())
        .bind(job.location.region.as_deref())
        .bind(job.location.country.as_deref())
        .bind(job.location.remote)
        .bind(job.salary.min)
        .bind(job.salary.max)
        .bind(job.salary.currency.as_deref())
        .bind(job.salary.period.as_deref())
        .bind(job.salary_usd_annual)
        .bind(job.seniority.map(|s| s.as_str()))
        .bind(job.posted_at)
        .bind(&job.source)
        .bind(job.url.as_deref())
        .bind(job.url_hash.as_deref())
        .bind(job.desc_hash.as_slice())
        .bind(&job.description_text)
        .execute(&mut *savepoint)
        .await;

        match result {
            Ok(_) => {
                savepoint.commit().await?;
                Ok(())
            }
            Err(err) => {
                savepoint.rollback().await?;
                Err(err.into())
            }
        }
    }

    async fn ensure_skill(&mut self, name_canonical: &str) -> Result<i32, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO skills (name_canonical, aliases_json)
            VALUES ($1, '[]')
            ON CONFLICT (name_canonical) DO UPDATE SET name_canonical = EXCLUDED.name_canonical
            RETURNING skill_id
            "#,
        )
        .bind(name_canonical)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.try_get("skill_id")?)
    }

    async fn upsert_job_skill(&mut self, link: &JobSkillLink) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO job_skills (job_id, skill_id, confidence, source)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id, skill_id) DO UPDATE SET
                confidence = EXCLUDED.confidence,
                source = EXCLUDED.source
            "#,
        )
        .bind(link.job_id)
        .bind(link.skill_id)
        .bind(link.confidence)
        .bind(&link.source)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_skill(
        &mut self,
        entry: &SkillDictionaryEntry,
    ) -> Result<SkillUpsert, StoreError> {
        let aliases_json = serde_json::to_string(&entry.aliases)
            .map_err(|e| StoreError::Decode(format!("encoding aliases: {e}")))?;
        // xmax = 0 only for freshly inserted tuples
        let row = sqlx::query(
            r#"
            INSERT INTO skills (name_canonical, category, aliases_json)
            VALUES ($1, $2, $3)
            ON CONFLICT (name_canonical) DO UPDATE SET
                category = EXCLUDED.category,
                aliases_json = EXCLUDED.aliases_json
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&entry.name_canonical)
        .bind(entry.category.as_deref())
        .bind(aliases_json)
        .fetch_one(&mut *self.tx)
        .await?;

        if row.try_get::<bool, _>("inserted")? {
            Ok(SkillUpsert::Inserted)
        } else {
            Ok(SkillUpsert::Updated)
        }
    }

    async fn rows_missing_hashes(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<HashBackfillRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, url, description_text, url_hash, desc_hash
            FROM jobs
            WHERE ((url IS NOT NULL AND url <> '' AND url_hash IS NULL) OR desc_hash IS NULL)
              AND ($1::uuid IS NULL OR job_id > $1)
            ORDER BY job_id
            LIMIT $2
            "#,
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(HashBackfillRow {
                    job_id: r.try_get("job_id")?,
                    url: r.try_get("url")?,
                    description_text: r
                        .try_get::<Option<String>, _>("description_text")?
                        .unwrap_or_default(),
                    url_hash: r.try_get("url_hash")?,
                    desc_hash: r.try_get("desc_hash")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn rows_with_url(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<UrlRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, url, url_hash, created_at
            FROM jobs
            WHERE url IS NOT NULL AND url <> ''
              AND ($1::uuid IS NULL OR job_id > $1)
            ORDER BY job_id
            LIMIT $2
            "#,
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(UrlRow {
                    job_id: r.try_get("job_id")?,
                    url: r.try_get("url")?,
                    url_hash: r.try_get("url_hash")?,
                    created_at: r.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn delete_job(&mut self, job_id: Uuid) -> Result<bool, StoreError> {
        sqlx::query("DELETE FROM job_skills WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *self.tx)
            .await?;
        let done = sqlx::query("DELETE FROM jobs WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn rows_missing_enrichments(
        &mut self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<EnrichmentRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, title, salary_min, salary_max, salary_currency, salary_period,
                   seniority IS NULL AS missing_seniority,
                   salary_usd_annual IS NULL AS missing_salary_usd
            FROM jobs
            WHERE (seniority IS NULL OR salary_usd_annual IS NULL)
              AND ($1::uuid IS NULL OR job_id > $1)
            ORDER BY job_id
            LIMIT $2
            "#,
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(EnrichmentRow {
                    job_id: r.try_get("job_id")?,
                    title: r.try_get("title")?,
                    salary: SalaryRange {
                        min: r.try_get("salary_min")?,
                        max: r.try_get("salary_max")?,
                        currency: r.try_get("salary_currency")?,
                        period: r.try_get("salary_period")?,
                    },
                    missing_seniority: r.try_get("missing_seniority")?,
                    missing_salary_usd: r.try_get("missing_salary_usd")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn fill_enrichments(
        &mut self,
        job_id: Uuid,
        seniority: Option<Seniority>,
        salary_usd_annual: Option<f64>,
    ) -> Result<bool, StoreError> {
        let done = sqlx::query(
            r#"
            UPDATE jobs
            SET seniority = COALESCE(seniority, $2),
                salary_usd_annual = COALESCE(salary_usd_annual, $3),
                updated_at = NOW()
            WHERE job_id = $1
              AND ((seniority IS NULL AND $2::text IS NOT NULL)
                OR (salary_usd_annual IS NULL AND $3::float8 IS NOT NULL))
            "#,
        )
        .bind(job_id)
        .bind(seniority.map(|s| s.as_str()))
        .bind(salary_usd_annual)
        .execute(&mut *self.tx)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
