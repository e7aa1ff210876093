//! PostgreSQL-backed store
//!
//! Records are kept whole in a JSONB `body` column; the columns next to it
//! exist only for filtering and ordering.

use std::time::Duration;

use async_trait::async_trait;
use dproc_common::types::{InvalidRecord, ValidationResultSummary};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::info;

use super::{InvalidRecordStore, Page, RecordFilter, StoreError};
use crate::config::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;

        info!("Invalid-record store connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &RecordFilter) {
        builder.push(" WHERE TRUE");
        if let Some(ds) = &filter.data_source_id {
            builder.push(" AND data_source_id = ").push_bind(ds.clone());
        }
        if let Some(state) = filter.review_state {
            builder.push(" AND review_state = ").push_bind(state.to_string());
        }
        if let Some(rule) = filter.error_type {
            builder
                .push(" AND body->'errors'->0->>'rule' = ")
                .push_bind(rule.code().to_string());
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search);
            builder
                .push(" AND (body->>'fileName' ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR (body->'originalRecord')::text ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

fn as_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl InvalidRecordStore for PgStore {
    async fn save_result(&self, summary: ValidationResultSummary) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO validation_results (id, data_source_id, correlation_id, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET body = EXCLUDED.body
            "#,
        )
        .bind(&summary.id)
        .bind(&summary.data_source_id)
        .bind(&summary.correlation_id)
        .bind(Json(&summary))
        .bind(summary.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_result(&self, id: &str) -> Result<Option<ValidationResultSummary>, StoreError> {
        let row = sqlx::query("SELECT body FROM validation_results WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get::<Json<ValidationResultSummary>, _>("body")?.0),
            None => None,
        })
    }

    async fn insert_many(&self, records: Vec<InvalidRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO invalid_records
                    (id, data_source_id, validation_result_id, review_state, record_index, body, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&record.id)
            .bind(&record.data_source_id)
            .bind(&record.validation_result_id)
            .bind(record.review_state.to_string())
            .bind(record.record_index.map(as_i64))
            .bind(Json(record))
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<InvalidRecord>, StoreError> {
        let row = sqlx::query("SELECT body FROM invalid_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get::<Json<InvalidRecord>, _>("body")?.0),
            None => None,
        })
    }

    async fn update(&self, record: InvalidRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE invalid_records SET review_state = $2, body = $3 WHERE id = $1",
        )
        .bind(&record.id)
        .bind(record.review_state.to_string())
        .bind(Json(&record))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(record.id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM invalid_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<InvalidRecord>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM invalid_records");
        Self::push_filter(&mut count, filter);
        let total: i64 = count.build().fetch_one(&self.pool).await?.try_get(0)?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT body FROM invalid_records");
        Self::push_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, record_index ASC, id ASC LIMIT ")
            .push_bind(as_i64(limit))
            .push(" OFFSET ")
            .push_bind(as_i64(offset));

        let rows = select.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(|row| row.try_get::<Json<InvalidRecord>, _>("body").map(|j| j.0))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: usize::try_from(total).unwrap_or(0),
        })
    }

    async fn by_validation_result(&self, result_id: &str) -> Result<Vec<InvalidRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT body FROM invalid_records WHERE validation_result_id = $1 ORDER BY record_index ASC",
        )
        .bind(result_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| row.try_get::<Json<InvalidRecord>, _>("body").map(|j| j.0))
            .collect::<Result<Vec<_>, _>>()?)
    }
}
