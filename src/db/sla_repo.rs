// src/db/sla_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::sla::{NewSlaRule, SlaCounts, SlaRule, SlaTrigger, SlaViolation},
};

#[derive(Clone)]
pub struct SlaRepository {
    pool: PgPool,
}

impl SlaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  REGRAS
    // =========================================================================

    pub async fn create_rule<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        rule: &NewSlaRule,
    ) -> Result<SlaRule, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, SlaRule>(
            r#"
            INSERT INTO sla_rules (
                tenant_id, name, description, trigger_on,
                lead_status, lead_heat, channel,
                response_time_minutes, escalation_time_minutes,
                notify_roles, escalate_to_role, auto_reassign
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(&rule.name)
            .bind(rule.description.as_deref())
            .bind(rule.trigger_on)
            .bind(rule.lead_status)
            .bind(rule.lead_heat)
            .bind(rule.channel)
            .bind(rule.response_time_minutes)
            .bind(rule.escalation_time_minutes)
            .bind(&rule.notify_roles)
            .bind(rule.escalate_to_role)
            .bind(rule.auto_reassign)
            .fetch_one(executor)
            .await?;

        Ok(created)
    }

    pub async fn list_rules<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<SlaRule>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rules = sqlx::query_as::<_, SlaRule>(
            "SELECT * FROM sla_rules WHERE tenant_id = $1 ORDER BY created_at ASC",
        )
            .bind(tenant_id)
            .fetch_all(executor)
            .await?;

        Ok(rules)
    }

    pub async fn set_rule_active<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        rule_id: Uuid,
        is_active: bool,
    ) -> Result<Option<SlaRule>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rule = sqlx::query_as::<_, SlaRule>(
            r#"
            UPDATE sla_rules SET is_active = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(rule_id)
            .bind(is_active)
            .fetch_optional(executor)
            .await?;

        Ok(rule)
    }

    /// Regras ativas do tenant para um evento. Os filtros de lead são
    /// aplicados depois, em memória.
    pub async fn list_active_rules_for<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        event: SlaTrigger,
    ) -> Result<Vec<SlaRule>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rules = sqlx::query_as::<_, SlaRule>(
            r#"
            SELECT * FROM sla_rules
            WHERE tenant_id = $1 AND trigger_on = $2 AND is_active = true
            ORDER BY created_at ASC
            "#,
        )
            .bind(tenant_id)
            .bind(event)
            .fetch_all(executor)
            .await?;

        Ok(rules)
    }

    pub async fn find_rules_by_ids<'e, E>(&self, executor: E, ids: &[Uuid]) -> Result<Vec<SlaRule>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rules = sqlx::query_as::<_, SlaRule>("SELECT * FROM sla_rules WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(executor)
            .await?;

        Ok(rules)
    }

    // =========================================================================
    //  VIOLAÇÕES
    // =========================================================================

    pub async fn insert_violation<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        rule_id: Uuid,
        lead_id: Uuid,
        triggered_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> Result<SlaViolation, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let violation = sqlx::query_as::<_, SlaViolation>(
            r#"
            INSERT INTO sla_violations (tenant_id, sla_rule_id, lead_id, triggered_at, due_at, status)
            VALUES ($1, $2, $3, $4, $5, 'PENDING')
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(rule_id)
            .bind(lead_id)
            .bind(triggered_at)
            .bind(due_at)
            .fetch_one(executor)
            .await?;

        Ok(violation)
    }

    /// Candidatas da varredura (todos os tenants): PENDING vencidas e
    /// BREACHED cuja janela de escalonamento já passou.
    pub async fn list_sweep_candidates<'e, E>(
        &self,
        executor: E,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SlaViolation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, SlaViolation>(
            r#"
            SELECT v.*
            FROM sla_violations v
            JOIN sla_rules r ON r.id = v.sla_rule_id
            WHERE (v.status = 'PENDING' AND v.due_at <= $1)
               OR (
                    v.status = 'BREACHED'
                    AND r.escalation_time_minutes IS NOT NULL
                    AND v.due_at + make_interval(mins => r.escalation_time_minutes) <= $1
               )
            ORDER BY v.due_at ASC
            LIMIT $2
            "#,
        )
            .bind(now)
            .bind(limit)
            .fetch_all(executor)
            .await?;

        Ok(rows)
    }

    /// PENDING -> BREACHED. Condicional: só uma varredura vence.
    pub async fn mark_breached<'e, E>(
        &self,
        executor: E,
        violation_id: Uuid,
        breach_minutes: i32,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE sla_violations
            SET status = 'BREACHED', breach_minutes = $2
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
            .bind(violation_id)
            .bind(breach_minutes)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// BREACHED -> ESCALATED. Condicional como o anterior.
    pub async fn mark_escalated<'e, E>(
        &self,
        executor: E,
        violation_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE sla_violations
            SET status = 'ESCALATED', escalated_at = $2
            WHERE id = $1 AND status = 'BREACHED'
            "#,
        )
            .bind(violation_id)
            .bind(at)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn increment_notifications<'e, E>(&self, executor: E, violation_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE sla_violations SET notifications_sent = notifications_sent + 1 WHERE id = $1")
            .bind(violation_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Só PENDING vira RESPONDED; um estouro já registrado não é apagado.
    pub async fn mark_responded<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE sla_violations
            SET status = 'RESPONDED', responded_at = $3
            WHERE tenant_id = $1 AND lead_id = $2 AND status = 'PENDING'
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(at)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn mark_resolved<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE sla_violations
            SET status = 'RESOLVED', resolved_at = $3
            WHERE tenant_id = $1
              AND lead_id = $2
              AND status IN ('PENDING', 'BREACHED', 'ESCALATED')
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(at)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  CONSULTAS
    // =========================================================================

    pub async fn list_for_lead<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Vec<SlaViolation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, SlaViolation>(
            r#"
            SELECT * FROM sla_violations
            WHERE tenant_id = $1 AND lead_id = $2
            ORDER BY created_at DESC
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .fetch_all(executor)
            .await?;

        Ok(rows)
    }

    pub async fn counts_since<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<SlaCounts, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let counts = sqlx::query_as::<_, SlaCounts>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'PENDING') AS pending,
                COUNT(*) FILTER (WHERE status = 'BREACHED') AS breached,
                COUNT(*) FILTER (WHERE status = 'ESCALATED') AS escalated,
                COUNT(*) FILTER (WHERE status IN ('RESPONDED', 'RESOLVED')) AS resolved,
                (AVG(breach_minutes) FILTER (
                    WHERE status IN ('BREACHED', 'ESCALATED') AND breach_minutes IS NOT NULL
                ))::float8 AS avg_breach_minutes
            FROM sla_violations
            WHERE tenant_id = $1 AND triggered_at >= $2
            "#,
        )
            .bind(tenant_id)
            .bind(since)
            .fetch_one(executor)
            .await?;

        Ok(counts)
    }
}
