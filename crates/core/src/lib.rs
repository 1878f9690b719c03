// Resource Handler Core - acquisition, validation and retry for one shared resource
// NO I/O of its own: the concrete resource comes from a ResourceOwner implementation

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{OperationJob, ResourceHandler};
pub use config::HandlerConfig;
pub use domain::AcquisitionStrategy;
pub use error::{ErrorKind, HandlerError, Result};
pub use port::{MethodTable, ResourceOwner};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
