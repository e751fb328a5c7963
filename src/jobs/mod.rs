//! Durable job queue and the single worker draining it.

mod handler;
mod payload;
mod queue;
mod scheduler;

pub use handler::{JobHandler, SyncJobHandler};
pub use payload::JobPayload;
pub use queue::{JobAck, JobQueue};
pub use scheduler::{Scheduler, SchedulerMetrics};
