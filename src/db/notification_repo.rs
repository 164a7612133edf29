// src/db/notification_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::notification::{Notification, NotificationDraft, UserRole},
};

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Usuários ativos do tenant com algum dos papéis.
    pub async fn list_recipients(&self, tenant_id: Uuid, roles: &[UserRole]) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM users
            WHERE tenant_id = $1 AND active = true AND role = ANY($2)
            ORDER BY created_at ASC
            "#,
        )
            .bind(tenant_id)
            .bind(roles)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    pub async fn user_id_of_salesman(&self, tenant_id: Uuid, salesman_id: Uuid) -> Result<Option<Uuid>, AppError> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM salesmen WHERE tenant_id = $1 AND id = $2",
        )
            .bind(tenant_id)
            .bind(salesman_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user_id)
    }

    pub async fn insert(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        draft: &NotificationDraft,
    ) -> Result<Notification, AppError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                tenant_id, user_id, notification_type, title, body, entity_type, entity_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
            .bind(tenant_id)
            .bind(user_id)
            .bind(draft.kind.as_str())
            .bind(&draft.title)
            .bind(draft.body.as_deref())
            .bind(draft.entity_type)
            .bind(draft.entity_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(notification)
    }
}
