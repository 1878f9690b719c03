// Application Layer - Handler, jobs and the scheduler that runs them

mod acquisition;
pub mod cancel;
pub mod constants;
pub mod handler;
pub mod operation;
pub mod scheduler;
mod slot;

// Re-exports
pub use cancel::{cancel_channel, CancelSender, CancelToken};
pub use handler::ResourceHandler;
pub use operation::OperationJob;
pub use scheduler::{JobContext, JobScheduler};
