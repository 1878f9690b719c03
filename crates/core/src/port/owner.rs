// Resource Owner Port
// The three operations a concrete resource type supplies, plus the methods it exposes

use crate::error::{HandlerError, Result};
use crate::port::MethodTable;
use async_trait::async_trait;

/// Resource Owner contract
///
/// Implementations:
/// - TcpLineOwner (probe binary): TCP connection per resource
/// - MockResourceOwner: scripted owner for tests
///
/// Every contract operation has a default that fails with `NOT_IMPLEMENTED`,
/// naming the operation and the concrete type. A missing operation fails the
/// job that needed it; it is never retried.
#[async_trait]
pub trait ResourceOwner: Send + Sync + Sized + 'static {
    /// Handle to the managed resource. Cloning must be cheap (Arc, id, token).
    type Resource: Clone + Send + Sync + 'static;

    /// Opaque configuration passed to every acquisition
    type Options: Send + Sync + 'static;

    /// Produce a new resource instance from configuration
    ///
    /// # Errors
    /// - HandlerError::Acquisition if the resource cannot be obtained
    async fn acquire_resource(&self, _options: &Self::Options) -> Result<Self::Resource> {
        Err(HandlerError::not_implemented(
            "acquire_resource",
            std::any::type_name::<Self>(),
        ))
    }

    /// Synchronous health check on an existing resource
    fn is_resource_usable(&self, _resource: &Self::Resource) -> Result<bool> {
        Err(HandlerError::not_implemented(
            "is_resource_usable",
            std::any::type_name::<Self>(),
        ))
    }

    /// Release the resource's underlying handle
    ///
    /// Called on resources that already failed validation, so it must tolerate
    /// a dead handle.
    async fn destroy_resource(&self, _resource: Self::Resource) -> Result<()> {
        Err(HandlerError::not_implemented(
            "destroy_resource",
            std::any::type_name::<Self>(),
        ))
    }

    /// Declare the named methods callable through `resource_handling_job`
    fn register_methods(_methods: &mut MethodTable<Self>) {}
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

#[cfg(any(test, feature = "mocks"))]
pub mod mocks {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::{HashSet, VecDeque};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Resource handed out by the mock owner
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct MockResource {
        pub id: u32,
    }

    /// Options passed through to acquisition (recorded, otherwise unused)
    #[derive(Debug, Clone, Default)]
    pub struct MockOptions {
        pub endpoint: String,
    }

    /// One recorded method invocation
    #[derive(Debug, Clone)]
    pub struct Invocation {
        pub method: String,
        pub resource_id: u32,
        pub args: Vec<Value>,
        /// Whether the resource was usable at the moment of the call
        pub usable: bool,
    }

    #[derive(Default)]
    struct MockState {
        usable_script: VecDeque<bool>,
        acquire_delay: Duration,
        acquire_failure: Option<String>,
        stale: HashSet<u32>,
        next_id: u32,
        acquire_calls: usize,
        seen_endpoints: Vec<String>,
        destroyed: Vec<u32>,
        invocations: Vec<Invocation>,
    }

    /// Scripted owner
    ///
    /// Clones share state, so a test keeps one clone for inspection and hands
    /// the other to the handler.
    #[derive(Clone, Default)]
    pub struct MockResourceOwner {
        state: Arc<Mutex<MockState>>,
    }

    impl MockResourceOwner {
        /// Every acquired resource is usable
        pub fn new() -> Self {
            Self::default()
        }

        /// Usability of the first acquisitions, in order; later ones are usable
        pub fn with_script(script: impl IntoIterator<Item = bool>) -> Self {
            let owner = Self::new();
            owner.state.lock().unwrap().usable_script = script.into_iter().collect();
            owner
        }

        /// Every acquired resource is unusable
        pub fn never_usable() -> Self {
            Self::with_script(std::iter::repeat(false).take(10_000))
        }

        pub fn with_acquire_delay(self, delay: Duration) -> Self {
            self.state.lock().unwrap().acquire_delay = delay;
            self
        }

        pub fn fail_acquire(&self, message: impl Into<String>) {
            self.state.lock().unwrap().acquire_failure = Some(message.into());
        }

        pub fn mark_stale(&self, id: u32) {
            self.state.lock().unwrap().stale.insert(id);
        }

        pub fn acquire_calls(&self) -> usize {
            self.state.lock().unwrap().acquire_calls
        }

        pub fn destroyed(&self) -> Vec<u32> {
            self.state.lock().unwrap().destroyed.clone()
        }

        pub fn destroy_calls(&self) -> usize {
            self.state.lock().unwrap().destroyed.len()
        }

        pub fn invocations(&self) -> Vec<Invocation> {
            self.state.lock().unwrap().invocations.clone()
        }

        pub fn seen_endpoints(&self) -> Vec<String> {
            self.state.lock().unwrap().seen_endpoints.clone()
        }

        fn record(&self, method: &str, resource: &MockResource, args: &[Value]) {
            let mut state = self.state.lock().unwrap();
            let usable = !state.stale.contains(&resource.id);
            state.invocations.push(Invocation {
                method: method.to_string(),
                resource_id: resource.id,
                args: args.to_vec(),
                usable,
            });
        }
    }

    #[async_trait]
    impl ResourceOwner for MockResourceOwner {
        type Resource = MockResource;
        type Options = MockOptions;

        async fn acquire_resource(&self, options: &MockOptions) -> Result<MockResource> {
            let delay = {
                let mut state = self.state.lock().unwrap();
                state.acquire_calls += 1;
                state.seen_endpoints.push(options.endpoint.clone());
                state.acquire_delay
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock().unwrap();
            if let Some(message) = state.acquire_failure.clone() {
                return Err(HandlerError::Acquisition(message));
            }
            state.next_id += 1;
            let id = state.next_id;
            if !state.usable_script.pop_front().unwrap_or(true) {
                state.stale.insert(id);
            }
            Ok(MockResource { id })
        }

        fn is_resource_usable(&self, resource: &MockResource) -> Result<bool> {
            Ok(!self.state.lock().unwrap().stale.contains(&resource.id))
        }

        async fn destroy_resource(&self, resource: MockResource) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.stale.insert(resource.id);
            state.destroyed.push(resource.id);
            Ok(())
        }

        fn register_methods(methods: &mut MethodTable<Self>) {
            methods
                .register("ping", |owner: Arc<Self>, resource: MockResource, args| async move {
                    owner.record("ping", &resource, &args);
                    Ok(json!({ "resource": resource.id, "args": args }))
                })
                .register("fail", |owner: Arc<Self>, resource: MockResource, args| async move {
                    owner.record("fail", &resource, &args);
                    Err(HandlerError::Operation("mock failure".to_string()))
                });
        }
    }
}
