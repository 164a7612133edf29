pub mod lead_repo;
pub use lead_repo::LeadRepository;
pub mod salesman_repo;
pub use salesman_repo::SalesmanRepository;
pub mod sla_repo;
pub use sla_repo::SlaRepository;
pub mod notification_repo;
pub use notification_repo::NotificationRepository;
pub mod triage_repo;
pub use triage_repo::TriageRepository;
