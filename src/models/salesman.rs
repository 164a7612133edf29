// src/models/salesman.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- VENDEDOR ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Salesman {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub is_active: bool,

    // Sempre em [0, 100], recalculado pelo ScoreRecomputer
    pub score: i32,

    // 0 = sem limite
    pub capacity: i32,

    pub created_at: DateTime<Utc>,
}

impl Salesman {
    pub fn has_headroom(&self, active_load: i64) -> bool {
        within_capacity(self.capacity, active_load)
    }
}

/// Capacidade > 0 é um teto rígido; 0 = sem limite.
fn within_capacity(capacity: i32, active_load: i64) -> bool {
    capacity <= 0 || active_load < i64::from(capacity)
}

/// Vendedor + carga ativa (leads atribuídos fora de WON/LOST),
/// lido numa única query agregada.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesmanLoad {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub is_active: bool,
    pub score: i32,
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
    pub active_load: i64,
}

impl SalesmanLoad {
    pub fn has_headroom(&self) -> bool {
        within_capacity(self.capacity, self.active_load)
    }

    pub fn into_salesman(self) -> Salesman {
        Salesman {
            id: self.id,
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            is_active: self.is_active,
            score: self.score,
            capacity: self.capacity,
            created_at: self.created_at,
        }
    }
}

// --- CONFIGURAÇÃO DE ATRIBUIÇÃO ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "assignment_strategy", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStrategy {
    Weighted,
    LeastActive,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentConfig {
    pub tenant_id: Uuid,
    pub auto_assign: bool,
    pub strategy: AssignmentStrategy,
    pub consider_score: bool,
}

impl AssignmentConfig {
    /// Usado quando o tenant ainda não tem linha em assignment_configs.
    pub fn default_for(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            auto_assign: true,
            strategy: AssignmentStrategy::Weighted,
            consider_score: true,
        }
    }
}

// --- SCORE / LEADERBOARD ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdate {
    pub salesman_id: Uuid,
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub salesman_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub events: i64,
    pub weight: f64,
}

// --- EVENTOS DE SUCESSO ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "success_event_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuccessEventType {
    DemoBooked,
    PaymentReceived,
    OrderReceived,
    ContractSigned,
    Custom,
}

/// Imutável depois de criado.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuccessEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lead_id: Uuid,
    pub salesman_id: Option<Uuid>,
    pub event_type: SuccessEventType,
    pub weight: f64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Pontos somados por vendedor dentro da janela.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct SalesmanPoints {
    pub salesman_id: Uuid,
    pub points: f64,
}
