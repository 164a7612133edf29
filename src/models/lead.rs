// src/models/lead.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- ENUMS ---

// Mapeia o CREATE TYPE lead_status do banco
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "lead_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Quoted,
    Won,
    Lost,
    OnHold,
}

impl LeadStatus {
    /// WON e LOST saem da carga ativa do vendedor.
    pub fn is_closed(self) -> bool {
        matches!(self, LeadStatus::Won | LeadStatus::Lost)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "lead_heat", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadHeat {
    Cold,
    Warm,
    Hot,
    VeryHot,
    OnFire,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "lead_channel", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadChannel {
    Manual,
    Whatsapp,
    Facebook,
    Instagram,
    Indiamart,
    Email,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "message_direction", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageDirection {
    In,
    Out,
}

// --- LEAD ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub channel: LeadChannel,
    pub external_id: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub language: String,
    pub status: LeadStatus,
    pub heat: LeadHeat,

    // No máximo um vendedor por vez
    pub assigned_to_salesman_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Nome amigável para títulos de notificação.
    pub fn display_label(&self) -> String {
        self.full_name
            .clone()
            .or_else(|| self.phone.clone())
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.to_string())
    }

    pub fn snapshot(&self) -> LeadSnapshot {
        LeadSnapshot {
            id: self.id,
            tenant_id: self.tenant_id,
            status: self.status,
            heat: self.heat,
            channel: self.channel,
            assigned_to_salesman_id: self.assigned_to_salesman_id,
        }
    }
}

/// Visão mínima do lead consumida pelo motor de SLA e pelo roteador.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadSnapshot {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: LeadStatus,
    pub heat: LeadHeat,
    pub channel: LeadChannel,
    pub assigned_to_salesman_id: Option<Uuid>,
}

// --- MENSAGENS ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lead_id: Uuid,
    pub direction: MessageDirection,
    pub channel: LeadChannel,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// --- TIMELINE ---

/// Tipos de evento gravados na timeline do lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadEventKind {
    AiTriage,
    AiDraftReply,
    AutoAssigned,
    Assigned,
    StatusChanged,
    TriageEscalated,
    TriageAutoClosed,
    SuccessRecorded,
    ReplySent,
    SlaAutoReassigned,
    SlaAutoReassignSkipped,
}

impl LeadEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LeadEventKind::AiTriage => "AI_TRIAGE",
            LeadEventKind::AiDraftReply => "AI_DRAFT_REPLY",
            LeadEventKind::AutoAssigned => "AUTO_ASSIGNED",
            LeadEventKind::Assigned => "ASSIGNED",
            LeadEventKind::StatusChanged => "STATUS_CHANGED",
            LeadEventKind::TriageEscalated => "TRIAGE_ESCALATED",
            LeadEventKind::TriageAutoClosed => "TRIAGE_AUTO_CLOSED",
            LeadEventKind::SuccessRecorded => "SUCCESS_RECORDED",
            LeadEventKind::ReplySent => "REPLY_SENT",
            LeadEventKind::SlaAutoReassigned => "SLA_AUTO_REASSIGNED",
            LeadEventKind::SlaAutoReassignSkipped => "SLA_AUTO_REASSIGN_SKIPPED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lead_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead() -> Lead {
        let now = Utc::now();
        Lead {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            channel: LeadChannel::Whatsapp,
            external_id: None,
            full_name: None,
            phone: Some("+971500000001".into()),
            email: None,
            language: "en".into(),
            status: LeadStatus::New,
            heat: LeadHeat::Hot,
            assigned_to_salesman_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn closed_statuses_are_won_and_lost() {
        assert!(LeadStatus::Won.is_closed());
        assert!(LeadStatus::Lost.is_closed());
        assert!(!LeadStatus::OnHold.is_closed());
        assert!(!LeadStatus::New.is_closed());
    }

    #[test]
    fn display_label_falls_back_to_phone() {
        assert_eq!(lead().display_label(), "+971500000001");
    }

    #[test]
    fn snapshot_copies_routing_fields() {
        let l = lead();
        let s = l.snapshot();
        assert_eq!(s.id, l.id);
        assert_eq!(s.heat, LeadHeat::Hot);
        assert_eq!(s.channel, LeadChannel::Whatsapp);
        assert_eq!(s.assigned_to_salesman_id, None);
    }

    #[test]
    fn heat_serializes_screaming_snake() {
        let json = serde_json::to_string(&LeadHeat::VeryHot).unwrap();
        assert_eq!(json, "\"VERY_HOT\"");
    }
}
