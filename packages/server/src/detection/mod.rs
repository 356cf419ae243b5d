//! Change-detection alerting: classification, deduplication, persistence,
//! and the manual and scheduled entry points.

pub mod dedup;
pub mod manual;
pub mod pipeline;
pub mod repository;
pub mod schedule;
pub mod severity;
pub mod sweep;

pub use dedup::{AlertDeduplicator, AlertGate};
pub use pipeline::{DetectionError, DetectionOutcome, DetectionPipeline, Disposition};
pub use repository::{AlertCandidate, AlertFilter, AlertRepository, StatusChange};
pub use schedule::{SchedulerHandle, SweepScheduler};
pub use severity::classify;
pub use sweep::{SweepContext, SweepReport, run_sweep};
