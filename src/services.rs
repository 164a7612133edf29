pub mod ai_gateway;
pub mod assignment_service;
pub mod lead_service;
pub mod notification_service;
pub mod scoring_service;
pub mod sla_scheduler;
pub mod sla_service;
pub mod triage_service;
