// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::clock::{Clock, SystemClock},
    db::{LeadRepository, NotificationRepository, SalesmanRepository, SlaRepository, TriageRepository},
    services::{
        ai_gateway::{AiGateway, MockAiGateway},
        assignment_service::AssignmentService,
        lead_service::LeadService,
        notification_service::NotificationService,
        scoring_service::ScoringService,
        sla_service::SlaEngine,
        triage_service::TriageOrchestrator,
    },
};

// =============================================================================
//  CONFIGURAÇÃO (variáveis de ambiente)
// =============================================================================

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub sla_sweep_interval: Duration,
    pub score_lookback_days: i64,
    pub assignment_scan_limit: i64,
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} inválida: {value:?}")),
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Lê as chaves de qualquer fonte; `from_env` usa o ambiente do processo.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;

        let score_lookback_days: i64 = parse_or("SCORE_LOOKBACK_DAYS", lookup("SCORE_LOOKBACK_DAYS"), 30)?;
        anyhow::ensure!(score_lookback_days > 0, "SCORE_LOOKBACK_DAYS deve ser positivo");

        let assignment_scan_limit: i64 = parse_or("ASSIGNMENT_SCAN_LIMIT", lookup("ASSIGNMENT_SCAN_LIMIT"), 200)?;
        anyhow::ensure!(assignment_scan_limit > 0, "ASSIGNMENT_SCAN_LIMIT deve ser positivo");

        Ok(Self {
            database_url,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 5)?,
            db_acquire_timeout: Duration::from_secs(parse_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                lookup("DB_ACQUIRE_TIMEOUT_SECS"),
                3,
            )?),
            sla_sweep_interval: Duration::from_secs(parse_or(
                "SLA_SWEEP_INTERVAL_SECS",
                lookup("SLA_SWEEP_INTERVAL_SECS"),
                60,
            )?),
            score_lookback_days,
            assignment_scan_limit,
        })
    }
}

// =============================================================================
//  ESTADO COMPARTILHADO
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Arc<Settings>,
    pub assignment_service: AssignmentService,
    pub scoring_service: ScoringService,
    pub sla_engine: SlaEngine,
    pub triage_orchestrator: TriageOrchestrator,
    pub lead_service: LeadService,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .acquire_timeout(settings.db_acquire_timeout)
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::build(db_pool, settings, Arc::new(SystemClock), Arc::new(MockAiGateway)))
    }

    /// Monta o gráfico de dependências sobre um pool já aberto.
    pub fn build(db_pool: PgPool, settings: Settings, clock: Arc<dyn Clock>, ai: Arc<dyn AiGateway>) -> Self {
        let lead_repo = LeadRepository::new(db_pool.clone());
        let salesman_repo = SalesmanRepository::new(db_pool.clone());
        let sla_repo = SlaRepository::new(db_pool.clone());
        let triage_repo = TriageRepository::new(db_pool.clone());
        let notification_service = NotificationService::new(NotificationRepository::new(db_pool.clone()));

        let assignment_service = AssignmentService::new(
            db_pool.clone(),
            salesman_repo.clone(),
            lead_repo.clone(),
            settings.assignment_scan_limit,
        );

        let scoring_service = ScoringService::new(
            db_pool.clone(),
            salesman_repo.clone(),
            lead_repo.clone(),
            triage_repo.clone(),
            clock.clone(),
            settings.score_lookback_days,
        );

        let sla_engine = SlaEngine::new(
            db_pool.clone(),
            sla_repo,
            lead_repo.clone(),
            notification_service.clone(),
            assignment_service.clone(),
            clock,
        );

        let triage_orchestrator = TriageOrchestrator::new(
            db_pool.clone(),
            lead_repo.clone(),
            triage_repo,
            ai,
            assignment_service.clone(),
            sla_engine.clone(),
            notification_service.clone(),
        );

        let lead_service = LeadService::new(
            db_pool.clone(),
            lead_repo,
            salesman_repo,
            sla_engine.clone(),
            notification_service,
        );

        Self {
            db_pool,
            settings: Arc::new(settings),
            assignment_service,
            scoring_service,
            sla_engine,
            triage_orchestrator,
            lead_service,
        }
    }
}
