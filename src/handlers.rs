pub mod leads;
pub mod salesmen;
pub mod sla;
