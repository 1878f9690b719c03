// Domain Layer - Job vocabulary and strategy selection

pub mod job;
pub mod strategy;

// Re-exports
pub use job::{new_job_id, CandidateOrigin, JobId, JobKind, JobStep};
pub use strategy::AcquisitionStrategy;
