///! The renewal workflow: login, hostname discovery, per-host renewal,
///! expiration rescrape, and next-run scheduling.

pub mod orchestrator;
pub mod reporter;
pub mod schedule;
pub mod scraper;
pub mod types;

pub use orchestrator::RenewalOrchestrator;
pub use types::{Host, RenewError, RunOutcome};
