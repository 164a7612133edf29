// src/db/triage_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::triage::TriageQueueItem};

#[derive(Clone)]
pub struct TriageRepository {
    pool: PgPool,
}

impl TriageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_open_for_lead<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<TriageQueueItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, TriageQueueItem>(
            r#"
            SELECT * FROM triage_queue_items
            WHERE tenant_id = $1 AND lead_id = $2 AND status = 'OPEN'
            LIMIT 1
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .fetch_optional(executor)
            .await?;

        Ok(item)
    }

    pub async fn open_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        reason: &str,
    ) -> Result<TriageQueueItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, TriageQueueItem>(
            r#"
            INSERT INTO triage_queue_items (tenant_id, lead_id, status, reason)
            VALUES ($1, $2, 'OPEN', $3)
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(reason)
            .fetch_one(executor)
            .await?;

        Ok(item)
    }

    /// Fecha os itens abertos do lead; retorna quantos foram fechados.
    pub async fn close_open_for_lead<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE triage_queue_items
            SET status = 'CLOSED', updated_at = NOW()
            WHERE tenant_id = $1 AND lead_id = $2 AND status = 'OPEN'
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
