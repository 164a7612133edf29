// src/common/test_fixtures.rs
// Dados mínimos para os testes com banco (#[sqlx::test]).

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::clock::FixedClock,
    config::{AppState, Settings},
    models::{
        lead::{Lead, LeadHeat},
        notification::UserRole,
    },
    services::ai_gateway::MockAiGateway,
};

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, 0).unwrap()
}

/// Estado completo sobre o pool do teste, com o relógio parado em `clock`.
pub fn app(pool: &PgPool, clock: &FixedClock) -> AppState {
    let settings = Settings::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://test".to_string()),
        _ => None,
    })
    .unwrap();

    AppState::build(pool.clone(), settings, Arc::new(clock.clone()), Arc::new(MockAiGateway))
}

pub async fn tenant(pool: &PgPool) -> Uuid {
    sqlx::query_scalar("INSERT INTO tenants (name) VALUES ('Loja Teste') RETURNING id")
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn user(pool: &PgPool, tenant_id: Uuid, role: UserRole, active: bool) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO users (tenant_id, email, display_name, role, active)
        VALUES ($1, $2, 'Usuário Teste', $3, $4)
        RETURNING id
        "#,
    )
    .bind(tenant_id)
    .bind(format!("{}@teste.dev", Uuid::new_v4()))
    .bind(role)
    .bind(active)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn salesman(pool: &PgPool, tenant_id: Uuid, score: i32, capacity: i32) -> Uuid {
    let user_id = user(pool, tenant_id, UserRole::Salesman, true).await;
    sqlx::query_scalar(
        "INSERT INTO salesmen (tenant_id, user_id, score, capacity) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(tenant_id)
    .bind(user_id)
    .bind(score)
    .bind(capacity)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn lead(pool: &PgPool, tenant_id: Uuid, heat: LeadHeat, assigned_to: Option<Uuid>) -> Lead {
    sqlx::query_as::<_, Lead>(
        r#"
        INSERT INTO leads (tenant_id, channel, full_name, heat, assigned_to_salesman_id)
        VALUES ($1, 'WHATSAPP', 'Cliente Teste', $2, $3)
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(heat)
    .bind(assigned_to)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn active_load(pool: &PgPool, salesman_id: Uuid) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM leads WHERE assigned_to_salesman_id = $1 AND status NOT IN ('WON', 'LOST')",
    )
    .bind(salesman_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn notifications_of(pool: &PgPool, kind: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE notification_type = $1")
        .bind(kind)
        .fetch_one(pool)
        .await
        .unwrap()
}
