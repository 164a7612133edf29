// src/models/notification.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// Papel do usuário dentro do tenant. Enum fechado: um typo em notify_roles
// não compila.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Owner,
    Admin,
    Manager,
    Salesman,
}

impl UserRole {
    /// Quem recebe os alertas de escalonamento da triagem.
    pub const SUPERVISORS: [UserRole; 3] = [UserRole::Owner, UserRole::Admin, UserRole::Manager];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    LeadAssigned,
    TriageEscalated,
    SlaViolated,
    SlaEscalated,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::LeadAssigned => "LEAD_ASSIGNED",
            NotificationKind::TriageEscalated => "TRIAGE_ESCALATED",
            NotificationKind::SlaViolated => "SLA_VIOLATED",
            NotificationKind::SlaEscalated => "SLA_ESCALATED",
        }
    }
}

/// O que o chamador quer notificar; o destinatário é resolvido depois.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub title: String,
    pub body: Option<String>,
    pub entity_type: Option<&'static str>,
    pub entity_id: Option<Uuid>,
}

impl NotificationDraft {
    pub fn about_lead(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>, lead_id: Uuid) -> Self {
        Self {
            kind,
            title: title.into(),
            body: Some(body.into()),
            entity_type: Some("Lead"),
            entity_id: Some(lead_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub body: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
