// src/main.rs

use anyhow::Context;
use axum::{
    routing::{get, patch, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Settings};
use crate::docs::ApiDoc;
use crate::services::sla_scheduler::spawn_sla_sweeper;

fn router(app_state: AppState) -> Router {
    let lead_routes = Router::new()
        .route("/{id}/reply", post(handlers::leads::send_reply))
        .route("/{id}/assign", post(handlers::leads::assign_lead))
        .route("/{id}/status", post(handlers::leads::update_status))
        .route("/{id}/success", post(handlers::leads::record_success))
        .route("/{id}/events", get(handlers::leads::list_events))
        .route("/{id}/sla", get(handlers::leads::get_lead_sla))
        .route("/{id}/sla/resolve", post(handlers::leads::resolve_lead_sla));

    let salesman_routes = Router::new()
        .route("/recompute", post(handlers::salesmen::recompute_scores))
        .route("/leaderboard", get(handlers::salesmen::leaderboard))
        .route("/pick", get(handlers::salesmen::preview_pick));

    let sla_routes = Router::new()
        .route(
            "/rules",
            post(handlers::sla::create_rule).get(handlers::sla::list_rules),
        )
        .route("/rules/{id}", patch(handlers::sla::set_rule_active))
        .route("/analytics", get(handlers::sla::analytics))
        .route("/sweep", post(handlers::sla::run_sweep));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/api/ingest/message", post(handlers::leads::ingest_message))
        .nest("/api/leads", lead_routes)
        .nest("/api/salesmen", salesman_routes)
        .nest("/api/sla", sla_routes)
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Configuração inválida impede a subida: nada roda meio configurado.
    let settings = Settings::from_env().context("Falha ao ler a configuração")?;
    let bind_addr = settings.bind_addr.clone();
    let sweep_interval = settings.sla_sweep_interval;

    let app_state = AppState::new(settings)
        .await
        .context("Falha ao inicializar o estado da aplicação.")?;

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados.")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    spawn_sla_sweeper(app_state.sla_engine.clone(), sweep_interval);

    let app = router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Falha ao iniciar o listener TCP em {bind_addr}"))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Erro no servidor Axum")?;
    Ok(())
}
