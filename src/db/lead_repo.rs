// src/db/lead_repo.rs

use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::lead::{Lead, LeadChannel, LeadEvent, LeadEventKind, LeadHeat, LeadStatus, Message, MessageDirection},
    models::triage::InboundMessage,
};

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(lead_id)
            .fetch_optional(executor)
            .await?;

        Ok(lead)
    }

    /// Procura o lead de uma mensagem de entrada. Prioridade:
    /// canal + external_id, depois telefone, depois e-mail.
    pub async fn find_for_inbound<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        inbound: &InboundMessage,
    ) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE tenant_id = $1
              AND (
                (channel = $2 AND external_id = $3)
                OR phone = $4
                OR email = $5
              )
            ORDER BY
                CASE
                    WHEN channel = $2 AND external_id = $3 THEN 0
                    WHEN phone = $4 THEN 1
                    ELSE 2
                END,
                created_at ASC
            LIMIT 1
            "#,
        )
            .bind(tenant_id)
            .bind(inbound.channel)
            .bind(inbound.external_id.as_deref())
            .bind(inbound.phone.as_deref())
            .bind(inbound.email.as_deref())
            .fetch_optional(executor)
            .await?;

        Ok(lead)
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        inbound: &InboundMessage,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (tenant_id, channel, external_id, full_name, phone, email, language)
            VALUES ($1, $2, $3, $4, $5, $6, 'en')
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(inbound.channel)
            .bind(inbound.external_id.as_deref())
            .bind(inbound.full_name.as_deref())
            .bind(inbound.phone.as_deref())
            .bind(inbound.email.as_deref())
            .fetch_one(executor)
            .await?;

        Ok(lead)
    }

    pub async fn update_triage<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        language: &str,
        heat: LeadHeat,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads SET language = $3, heat = $4, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(language)
            .bind(heat)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::LeadNotFound)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        status: LeadStatus,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads SET status = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(status)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::LeadNotFound)
    }

    /// Compare-and-swap do responsável: só grava se o atual ainda for
    /// `expected`. Retorna `false` quando outro processo chegou antes.
    pub async fn swap_assignee<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        expected: Option<Uuid>,
        new_assignee: Option<Uuid>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET assigned_to_salesman_id = $4, updated_at = NOW()
            WHERE tenant_id = $1
              AND id = $2
              AND assigned_to_salesman_id IS NOT DISTINCT FROM $3
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(expected)
            .bind(new_assignee)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    //  MENSAGENS & TIMELINE
    // =========================================================================

    pub async fn insert_message<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        direction: MessageDirection,
        channel: LeadChannel,
        body: &str,
    ) -> Result<Message, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (tenant_id, lead_id, direction, channel, body)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(direction)
            .bind(channel)
            .bind(body)
            .fetch_one(executor)
            .await?;

        Ok(message)
    }

    pub async fn append_event<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        kind: LeadEventKind,
        payload: Value,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "INSERT INTO lead_events (tenant_id, lead_id, event_type, payload) VALUES ($1, $2, $3, $4)",
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(kind.as_str())
            .bind(payload)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Timeline do lead, mais recente primeiro.
    pub async fn list_events<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        lead_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LeadEvent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let events = sqlx::query_as::<_, LeadEvent>(
            r#"
            SELECT * FROM lead_events
            WHERE tenant_id = $1 AND lead_id = $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
            .bind(tenant_id)
            .bind(lead_id)
            .bind(limit)
            .fetch_all(executor)
            .await?;

        Ok(events)
    }
}
