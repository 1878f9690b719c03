//! Operation Job - runs one method against a validated resource
//!
//! Steps: init -> get_resource -> on_resource
//!
//! `init` runs while the job is constructed, so a bad method name or malformed
//! arguments fail the call before any acquisition happens.

use crate::application::acquisition::{acquire_inline, get_hold_of_resource, upgrade};
use crate::application::handler::HandlerShared;
use crate::application::scheduler::JobContext;
use crate::domain::{AcquisitionStrategy, JobKind, JobStep};
use crate::error::{HandlerError, Result};
use crate::port::ResourceOwner;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Weak};
use tracing::debug;

type Payload<O, T> = Box<
    dyn FnOnce(Arc<O>, <O as ResourceOwner>::Resource) -> BoxFuture<'static, Result<T>> + Send,
>;

/// Label used in logs for closure payloads
const CLOSURE_METHOD: &str = "<closure>";

/// A single call waiting to run against the handler's resource
pub struct OperationJob<O: ResourceOwner, T = Value> {
    handler: Weak<HandlerShared<O>>,
    ctx: JobContext,
    method: String,
    strategy: AcquisitionStrategy,
    payload: Payload<O, T>,
}

impl<O: ResourceOwner> OperationJob<O, Value> {
    /// Build a job invoking the registered method `method` with `args`
    ///
    /// # Errors
    /// - HandlerError::NotImplemented if `method` is not registered on the owner
    /// - HandlerError::NotAnArray if `args` is not a JSON array
    /// - HandlerError::NoResourceHandler if the handler is already destroyed
    pub(crate) fn named(handler: &Arc<HandlerShared<O>>, method: &str, args: Value) -> Result<Self> {
        let ctx = handler.scheduler.context(JobKind::Operation);
        ctx.checkpoint(JobStep::Init)?;

        let invoke = handler.methods.get(method).ok_or_else(|| {
            HandlerError::not_implemented(method, std::any::type_name::<O>())
        })?;
        let args = match args {
            Value::Array(args) => args,
            other => {
                return Err(HandlerError::NotAnArray(format!(
                    "arguments for {method} must be an array, got {}",
                    json_type(&other)
                )))
            }
        };

        Ok(Self {
            handler: Arc::downgrade(handler),
            ctx,
            method: method.to_string(),
            strategy: handler.config.strategy,
            payload: Box::new(move |owner, resource| invoke(owner, resource, args)),
        })
    }
}

impl<O: ResourceOwner, T: Send + 'static> OperationJob<O, T> {
    /// Build a job whose payload is a typed closure
    pub(crate) fn closure<F, Fut>(handler: &Arc<HandlerShared<O>>, f: F) -> Result<Self>
    where
        F: FnOnce(Arc<O>, O::Resource) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let ctx = handler.scheduler.context(JobKind::Operation);
        ctx.checkpoint(JobStep::Init)?;

        Ok(Self {
            handler: Arc::downgrade(handler),
            ctx,
            method: CLOSURE_METHOD.to_string(),
            strategy: handler.config.strategy,
            payload: Box::new(move |owner, resource| f(owner, resource).boxed()),
        })
    }

    pub fn id(&self) -> &str {
        self.ctx.id()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Run the remaining steps and return the method's result
    pub async fn run(self) -> Result<T> {
        // Payload is Send but not Sync, so it must not be borrowed across awaits
        let OperationJob {
            handler,
            ctx,
            method,
            strategy,
            payload,
        } = self;

        let resource = match strategy {
            AcquisitionStrategy::Serialized => resource_serialized(&handler, &ctx).await?,
            AcquisitionStrategy::Inline => acquire_inline(&handler, &ctx, &method).await?,
        };

        let owner = Arc::clone(&upgrade(&handler)?.owner);
        debug!(job_id = %ctx.id(), method = %method, "Invoking method");
        payload(owner, resource).await
    }
}

/// get_resource through the shared state machine; on_resource trusts its validation
async fn resource_serialized<O: ResourceOwner>(
    handler: &Weak<HandlerShared<O>>,
    ctx: &JobContext,
) -> Result<O::Resource> {
    ctx.checkpoint(JobStep::GetResource)?;
    let shared = upgrade(handler)?;
    let resource = get_hold_of_resource(&shared).await?;
    drop(shared);

    ctx.checkpoint(JobStep::OnResource)?;
    Ok(resource)
}

impl<O: ResourceOwner, T> std::fmt::Debug for OperationJob<O, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationJob")
            .field("id", &self.ctx.id())
            .field("method", &self.method)
            .field("strategy", &self.strategy)
            .finish()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
