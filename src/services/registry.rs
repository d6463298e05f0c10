//! Named service registry.
//!
//! Two-level namespace: service name → method name → handler. Built once at
//! startup and shared read-only (`Arc<ServiceRegistry>`).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::services::context::RequestContext;
use crate::JsonMap;

/// A callable service method.
///
/// Must resolve to a JSON object; anything else is rejected by the dispatcher.
#[async_trait]
pub trait ServiceMethod: Send + Sync {
    async fn call(&self, params: JsonMap, ctx: RequestContext) -> Result<Value, PipelineError>;
}

#[async_trait]
impl<F, Fut> ServiceMethod for F
where
    F: Fn(JsonMap, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, PipelineError>> + Send + 'static,
{
    async fn call(&self, params: JsonMap, ctx: RequestContext) -> Result<Value, PipelineError> {
        (self)(params, ctx).await
    }
}

type Methods = HashMap<String, Arc<dyn ServiceMethod>>;

#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Methods>,
}

impl ServiceRegistry {
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    pub fn contains_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn method(&self, service: &str, method: &str) -> Option<Arc<dyn ServiceMethod>> {
        self.services.get(service)?.get(method).cloned()
    }

    /// Sorted `service.method` names.
    pub fn describe(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .iter()
            .flat_map(|(service, methods)| {
                methods.keys().map(move |method| format!("{service}.{method}"))
            })
            .collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("methods", &self.describe())
            .finish()
    }
}

#[derive(Default)]
pub struct ServiceRegistryBuilder {
    services: HashMap<String, Methods>,
}

impl ServiceRegistryBuilder {
    /// Register `service.method`. A later registration replaces an earlier one.
    pub fn method(
        mut self,
        service: impl Into<String>,
        method: impl Into<String>,
        handler: impl ServiceMethod + 'static,
    ) -> Self {
        self.services
            .entry(service.into())
            .or_default()
            .insert(method.into(), Arc::new(handler));
        self
    }

    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            services: self.services,
        }
    }
}
