// Resource Handler Infrastructure - TCP Adapter
// Implements: ResourceOwner for line-oriented TCP services

pub mod tcp_owner;

pub use tcp_owner::{TcpConnection, TcpLineOwner, TcpOptions};
