// src/models/triage.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::lead::{LeadChannel, LeadHeat};

// --- SAÍDAS DO GATEWAY DE IA ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriageResult {
    pub language: String,
    pub heat: LeadHeat,
    pub reason: String,
    // 0..1
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyDraft {
    pub language: String,
    pub message: String,
    pub confidence: f32,
    pub should_escalate: bool,
    pub escalation_reason: Option<String>,
}

// --- FILA DE TRIAGEM HUMANA ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "triage_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TriageStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriageQueueItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lead_id: Uuid,
    pub status: TriageStatus,
    pub reason: String,
    pub suggested_salesman_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- INGESTÃO ---

/// Mensagem de cliente já validada, vinda de qualquer canal.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel: LeadChannel,
    pub external_id: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub lead_id: Uuid,
    pub lead_created: bool,
    pub triage: TriageResult,
    pub draft: ReplyDraft,
    pub escalated: bool,
    pub assigned_salesman_id: Option<Uuid>,
}
