pub mod lead;
pub mod notification;
pub mod salesman;
pub mod sla;
pub mod triage;
