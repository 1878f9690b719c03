// Port Layer - Interfaces the concrete resource type implements

pub mod method_table;
pub mod owner;

// Re-exports
pub use method_table::{Method, MethodFuture, MethodTable};
pub use owner::ResourceOwner;

#[cfg(any(test, feature = "mocks"))]
pub use owner::mocks;
