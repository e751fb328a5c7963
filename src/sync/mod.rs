//! Synchronization pipeline: identity resolution, match discovery, match
//! ingestion and the profile refresh orchestrating them.

mod discovery;
mod ingestor;
mod profile;
mod resolver;

pub use discovery::MatchDiscovery;
pub use ingestor::{FailedMatch, IngestOutcome, MatchIngestor, MatchLedger};
pub use profile::{ProfileSynchronizer, SyncReport, UnitOutcome};
pub use resolver::AccountResolver;
