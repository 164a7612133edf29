// src/db/salesman_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::salesman::{
        AssignmentConfig, LeaderboardEntry, Salesman, SalesmanLoad, SalesmanPoints, SuccessEvent,
        SuccessEventType,
    },
};

#[derive(Clone)]
pub struct SalesmanRepository {
    pool: PgPool,
}

impl SalesmanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  DIRETÓRIO (vendedores + carga ativa)
    // =========================================================================

    /// Vendedores ativos com a carga calculada numa única agregação.
    /// `limit` mantém a varredura limitada.
    pub async fn list_active_with_load<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<SalesmanLoad>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, SalesmanLoad>(
            r#"
            SELECT
                s.id, s.tenant_id, s.user_id, s.is_active, s.score, s.capacity, s.created_at,
                COALESCE(l.active_load, 0) AS active_load
            FROM salesmen s
            LEFT JOIN (
                SELECT assigned_to_salesman_id, COUNT(*) AS active_load
                FROM leads
                WHERE tenant_id = $1
                  AND assigned_to_salesman_id IS NOT NULL
                  AND status NOT IN ('WON', 'LOST')
                GROUP BY assigned_to_salesman_id
            ) l ON l.assigned_to_salesman_id = s.id
            WHERE s.tenant_id = $1 AND s.is_active = true
            ORDER BY s.created_at ASC
            LIMIT $2
            "#,
        )
            .bind(tenant_id)
            .bind(limit)
            .fetch_all(executor)
            .await?;

        Ok(rows)
    }

    /// Trava a linha do vendedor (FOR UPDATE) até o fim da transação.
    /// Serializa atribuições concorrentes ao mesmo vendedor. A carga é lida
    /// depois, em outra query, para enxergar o que o concorrente já gravou.
    pub async fn lock_for_assignment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        salesman_id: Uuid,
    ) -> Result<Option<Salesman>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let salesman = sqlx::query_as::<_, Salesman>(
            "SELECT * FROM salesmen WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
            .bind(tenant_id)
            .bind(salesman_id)
            .fetch_optional(executor)
            .await?;

        Ok(salesman)
    }

    /// Leads atribuídos fora de WON/LOST.
    pub async fn count_active_load<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        salesman_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let load = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM leads
            WHERE tenant_id = $1
              AND assigned_to_salesman_id = $2
              AND status NOT IN ('WON', 'LOST')
            "#,
        )
            .bind(tenant_id)
            .bind(salesman_id)
            .fetch_one(executor)
            .await?;

        Ok(load)
    }

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        salesman_id: Uuid,
    ) -> Result<Option<Salesman>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let salesman = sqlx::query_as::<_, Salesman>(
            "SELECT * FROM salesmen WHERE tenant_id = $1 AND id = $2",
        )
            .bind(tenant_id)
            .bind(salesman_id)
            .fetch_optional(executor)
            .await?;

        Ok(salesman)
    }

    pub async fn find_assignment_config<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Option<AssignmentConfig>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let config = sqlx::query_as::<_, AssignmentConfig>(
            r#"
            SELECT tenant_id, auto_assign, strategy, consider_score
            FROM assignment_configs
            WHERE tenant_id = $1
            "#,
        )
            .bind(tenant_id)
            .fetch_optional(executor)
            .await?;

        Ok(config)
    }

    // =========================================================================
    //  SCORE
    // =========================================================================

    /// Todos os vendedores do tenant (inclusive inativos) entram no ranking.
    pub async fn list_ids<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM salesmen WHERE tenant_id = $1 ORDER BY created_at ASC",
        )
            .bind(tenant_id)
            .fetch_all(executor)
            .await?;

        Ok(ids)
    }

    /// Soma de pesos por vendedor em [since, until]. Eventos sem vendedor ficam de fora.
    pub async fn sum_points<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SalesmanPoints>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, SalesmanPoints>(
            r#"
            SELECT salesman_id, COALESCE(SUM(weight), 0)::float8 AS points
            FROM success_events
            WHERE tenant_id = $1
              AND salesman_id IS NOT NULL
              AND created_at >= $2
              AND created_at <= $3
            GROUP BY salesman_id
            "#,
        )
            .bind(tenant_id)
            .bind(since)
            .bind(until)
            .fetch_all(executor)
            .await?;

        Ok(rows)
    }

    pub async fn update_score<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        salesman_id: Uuid,
        score: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE salesmen SET score = $3 WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(salesman_id)
            .bind(score)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn leaderboard<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT
                s.id AS salesman_id,
                u.display_name,
                u.email,
                COUNT(e.id) AS events,
                COALESCE(SUM(e.weight), 0)::float8 AS weight
            FROM success_events e
            JOIN salesmen s ON s.id = e.salesman_id
            JOIN users u ON u.id = s.user_id
            WHERE e.tenant_id = $1 AND e.created_at >= $2
            GROUP BY s.id, u.display_name, u.email
            ORDER BY weight DESC
            LIMIT $3
            "#,
        )
            .bind(tenant_id)
            .bind(since)
            .bind(limit)
            .fetch_all(executor)
            .await?;

        Ok(rows)
    }

    // =========================================================================
    //  EVENTOS DE SUCESSO
    // =========================================================================

    pub async fn insert_success_event<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        salesman_id: Option<Uuid>,
        event_type: SuccessEventType,
        weight: f64,
        note: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<SuccessEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let event = sqlx::query_as::<_, SuccessEvent>(
            r#"
            INSERT INTO success_events (tenant_id, lead_id, salesman_id, event_type, weight, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(salesman_id)
            .bind(event_type)
            .bind(weight)
            .bind(note)
            .bind(created_at)
            .fetch_one(executor)
            .await?;

        Ok(event)
    }
}
