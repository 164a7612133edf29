// src/services/sla_scheduler.rs

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::services::sla_service::SlaEngine;

/// Varredura periódica de SLA em segundo plano. Intervalo zero desliga.
pub fn spawn_sla_sweeper(engine: SlaEngine, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        tracing::info!("Varredura automática de SLA desligada");
        return None;
    }

    tracing::info!(interval_secs = every.as_secs(), "⏱️ Iniciando varredura periódica de SLA");

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // Uma varredura lenta não deve gerar rajadas de execuções atrasadas.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let report = engine.sweep().await;
            if report.failed > 0 {
                tracing::warn!(failed = report.failed, "Varredura de SLA terminou com falhas");
            }
        }
    }))
}
