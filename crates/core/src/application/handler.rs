// Resource Handler - owns the resource slot and hands out jobs

use crate::application::acquisition::{self, release};
use crate::application::cancel::{cancel_channel, CancelSender};
use crate::application::operation::OperationJob;
use crate::application::scheduler::JobScheduler;
use crate::application::slot::ResourceSlot;
use crate::config::HandlerConfig;
use crate::domain::{AcquisitionStrategy, JobKind};
use crate::error::{HandlerError, Result};
use crate::port::{MethodTable, ResourceOwner};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// State shared with jobs; jobs only ever hold a `Weak` to it
pub(crate) struct HandlerShared<O: ResourceOwner> {
    pub(crate) owner: Arc<O>,
    pub(crate) options: RwLock<Option<Arc<O::Options>>>,
    pub(crate) slot: Mutex<ResourceSlot<O::Resource>>,
    pub(crate) methods: MethodTable<O>,
    pub(crate) scheduler: JobScheduler<O::Resource>,
    pub(crate) config: HandlerConfig,
}

impl<O: ResourceOwner> HandlerShared<O> {
    /// Empty the slot, clear options and destroy whatever was held
    async fn teardown(&self) -> Result<()> {
        let held = self.slot.lock().await.take();
        self.options.write().await.take();
        match held {
            Some(resource) => {
                info!(handler = %self.config.label, "Destroying held resource");
                release(self, resource).await
            }
            None => Ok(()),
        }
    }
}

/// Resource Handler
///
/// Manages one lazily acquired resource shared by any number of concurrent
/// callers. Callers never see an unvalidated resource; a stale one is
/// destroyed and replaced transparently.
///
/// # Example
/// ```text
/// let handler = ResourceHandler::new(PgOwner::default(), pg_options);
/// let rows = handler.call("query", json!(["SELECT 1"])).await?;
/// handler.destroy().await?;
/// ```
pub struct ResourceHandler<O: ResourceOwner> {
    shared: Arc<HandlerShared<O>>,
    cancel: CancelSender,
}

impl<O: ResourceOwner> ResourceHandler<O> {
    /// Create a handler with the default configuration (serialized acquisition)
    pub fn new(owner: O, options: O::Options) -> Self {
        Self::with_config(owner, options, HandlerConfig::default())
    }

    pub fn with_config(owner: O, options: O::Options, config: HandlerConfig) -> Self {
        let (cancel, token) = cancel_channel();
        let mut methods = MethodTable::new();
        O::register_methods(&mut methods);

        info!(
            handler = %config.label,
            strategy = %config.strategy,
            methods = ?methods.names(),
            "Resource handler created"
        );

        let shared = HandlerShared {
            owner: Arc::new(owner),
            options: RwLock::new(Some(Arc::new(options))),
            slot: Mutex::new(ResourceSlot::new()),
            methods,
            scheduler: JobScheduler::new(config.label.clone(), token),
            config,
        };

        Self {
            shared: Arc::new(shared),
            cancel,
        }
    }

    pub fn owner(&self) -> &O {
        &self.shared.owner
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.shared.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether a resource is currently held (validated or not yet re-checked)
    pub async fn has_resource(&self) -> bool {
        !self.shared.slot.lock().await.is_empty()
    }

    /// Obtain a validated resource using the handler's configured strategy
    ///
    /// Serialized: concurrent callers share one in-flight acquisition and
    /// observe the same resource or the same failure. Inline: the caller reads
    /// or acquires on its own, exactly as an inline handling job does.
    pub async fn get_hold_of_resource(&self) -> Result<O::Resource> {
        if self.is_destroyed() {
            return Err(HandlerError::NoResourceHandler);
        }
        match self.shared.config.strategy {
            AcquisitionStrategy::Serialized => {
                acquisition::get_hold_of_resource(&self.shared).await
            }
            AcquisitionStrategy::Inline => {
                let weak = Arc::downgrade(&self.shared);
                let ctx = self.shared.scheduler.context(JobKind::Acquisition);
                acquisition::acquire_inline(&weak, &ctx, "get_hold_of_resource").await
            }
        }
    }

    /// Build a job invoking `method(resource, ...args)`
    ///
    /// Validation happens here, before any acquisition.
    ///
    /// # Errors
    /// - HandlerError::NotImplemented if the owner registered no such method
    /// - HandlerError::NotAnArray if `args` is not a JSON array
    pub fn resource_handling_job(&self, method: &str, args: Value) -> Result<OperationJob<O>> {
        OperationJob::named(&self.shared, method, args).map_err(|e| {
            debug!(handler = %self.shared.config.label, method = %method, error = %e, "Rejected handling job");
            e
        })
    }

    /// Build and run a handling job
    pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
        self.resource_handling_job(method, args)?.run().await
    }

    /// Build a job running a typed closure against the validated resource
    ///
    /// # Example
    /// ```text
    /// let len = handler
    ///     .with_resource(|_owner, conn| async move { conn.queue_len().await })?
    ///     .run()
    ///     .await?;
    /// ```
    pub fn with_resource<F, Fut, T>(&self, f: F) -> Result<OperationJob<O, T>>
    where
        F: FnOnce(Arc<O>, O::Resource) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        OperationJob::closure(&self.shared, f)
    }

    /// Destroy the handler: abort in-flight jobs, destroy the held resource, clear options
    ///
    /// Only the first call does anything.
    ///
    /// # Errors
    /// - HandlerError::NotImplemented if the owner lacks `destroy_resource`
    pub async fn destroy(&self) -> Result<()> {
        if !self.cancel.cancel() {
            debug!(handler = %self.shared.config.label, "Resource handler already destroyed");
            return Ok(());
        }
        info!(handler = %self.shared.config.label, "Destroying resource handler");
        self.shared.teardown().await
    }
}

impl<O: ResourceOwner> Drop for ResourceHandler<O> {
    fn drop(&mut self) {
        if !self.cancel.cancel() {
            return;
        }

        // Dropped without destroy(): jobs are already cancelled, release the slot in the background
        let shared = Arc::clone(&self.shared);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = shared.teardown().await {
                        warn!(handler = %shared.config.label, error = %e, "Teardown of dropped handler failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    handler = %self.shared.config.label,
                    "Resource handler dropped outside a runtime; held resource not destroyed"
                );
            }
        }
    }
}

impl<O: ResourceOwner> std::fmt::Debug for ResourceHandler<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandler")
            .field("config", &self.shared.config)
            .field("methods", &self.shared.methods)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::port::mocks::{MockOptions, MockResourceOwner};
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn handler(owner: &MockResourceOwner) -> ResourceHandler<MockResourceOwner> {
        ResourceHandler::new(
            owner.clone(),
            MockOptions {
                endpoint: "mock://primary".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_call_acquires_lazily() {
        let owner = MockResourceOwner::new();
        let handler = handler(&owner);
        assert_eq!(owner.acquire_calls(), 0);
        assert!(!handler.has_resource().await);

        let out = assert_ok!(handler.call("ping", json!(["a"])).await);
        assert_eq!(out, json!({ "resource": 1, "args": ["a"] }));
        assert_eq!(owner.acquire_calls(), 1);
        assert_eq!(owner.seen_endpoints(), vec!["mock://primary".to_string()]);
        assert!(handler.has_resource().await);
    }

    #[tokio::test]
    async fn test_held_resource_is_reused() {
        let owner = MockResourceOwner::new();
        let handler = handler(&owner);

        for _ in 0..3 {
            assert_ok!(handler.call("ping", json!([])).await);
        }
        assert_eq!(owner.acquire_calls(), 1);
        assert!(owner.invocations().iter().all(|i| i.resource_id == 1));
    }

    #[test]
    fn test_args_must_be_array() {
        let owner = MockResourceOwner::new();
        let handler = handler(&owner);

        let err = assert_err!(handler.resource_handling_job("ping", json!({ "a": 1 })));
        assert_eq!(err.kind(), ErrorKind::NotAnArray);
        assert!(err.to_string().contains("object"));
        assert_eq!(owner.acquire_calls(), 0);
    }

    #[test]
    fn test_unknown_method_checked_before_args() {
        let owner = MockResourceOwner::new();
        let handler = handler(&owner);

        let err = assert_err!(handler.resource_handling_job("missingMethod", json!("x")));
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
        assert!(err.to_string().contains("missingMethod"));
    }

    #[tokio::test]
    async fn test_operation_error_is_returned_and_resource_kept() {
        let owner = MockResourceOwner::new();
        let handler = handler(&owner);

        let err = assert_err!(handler.call("fail", json!([])).await);
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert!(handler.has_resource().await);
        assert_eq!(owner.destroy_calls(), 0);
    }

    #[tokio::test]
    async fn test_with_resource_returns_typed_value() {
        let owner = MockResourceOwner::new();
        let handler = handler(&owner);

        let id = assert_ok!(
            assert_ok!(handler.with_resource(|_owner, resource| async move { Ok(resource.id * 10) }))
                .run()
                .await
        );
        assert_eq!(id, 10);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let owner = MockResourceOwner::new();
        let handler = handler(&owner);
        assert_ok!(handler.call("ping", json!([])).await);

        assert_ok!(handler.destroy().await);
        assert_ok!(handler.destroy().await);
        assert_eq!(owner.destroyed(), vec![1]);
        assert!(handler.is_destroyed());
        assert!(!handler.has_resource().await);

        let err = assert_err!(handler.call("ping", json!([])).await);
        assert_eq!(err.kind(), ErrorKind::NoResourceHandler);
        assert_eq!(
            assert_err!(handler.get_hold_of_resource().await),
            HandlerError::NoResourceHandler
        );
    }

    #[tokio::test]
    async fn test_destroy_without_resource_is_noop() {
        let owner = MockResourceOwner::new();
        let handler = handler(&owner);
        assert_ok!(handler.destroy().await);
        assert_eq!(owner.destroy_calls(), 0);
        assert_eq!(owner.acquire_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_held_resource() {
        let owner = MockResourceOwner::new();
        {
            let handler = handler(&owner);
            assert_ok!(handler.call("ping", json!([])).await);
        }
        // Teardown runs on a spawned task
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(owner.destroyed(), vec![1]);
    }
}
