// Named operations an owner exposes to handling jobs

use crate::error::Result;
use crate::port::ResourceOwner;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a registered method
pub type MethodFuture = BoxFuture<'static, Result<Value>>;

/// A registered method: receives the owner, the validated resource and the call arguments
pub type Method<O> = Arc<
    dyn Fn(Arc<O>, <O as ResourceOwner>::Resource, Vec<Value>) -> MethodFuture + Send + Sync,
>;

/// Method registry, filled once by `ResourceOwner::register_methods`
pub struct MethodTable<O: ResourceOwner> {
    methods: HashMap<String, Method<O>>,
}

impl<O: ResourceOwner> MethodTable<O> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Register `f` under `name`, replacing any earlier registration
    ///
    /// # Example
    /// ```text
    /// methods.register("ping", |owner, conn, args| async move {
    ///     owner.ping(&conn, args).await
    /// });
    /// ```
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Arc<O>, O::Resource, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let method: Method<O> = Arc::new(move |owner, resource, args| {
            f(owner, resource, args).boxed()
        });
        self.methods.insert(name.into(), method);
        self
    }

    pub fn get(&self, name: &str) -> Option<Method<O>> {
        self.methods.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<O: ResourceOwner> Default for MethodTable<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ResourceOwner> std::fmt::Debug for MethodTable<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.names())
            .finish()
    }
}
