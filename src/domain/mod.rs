pub mod models;
pub mod reconciliation;
