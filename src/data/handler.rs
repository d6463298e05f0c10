//! Route data handlers.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use crate::error::PipelineError;
use crate::routing::Params;
use crate::services::RequestContext;

/// Produces a route's initial data, or a service descriptor to resolve it.
///
/// The returned value is classified by [`DataResult::classify`](crate::data::DataResult::classify).
#[async_trait]
pub trait DataHandler: Send + Sync {
    async fn fetch(&self, params: Params, ctx: RequestContext) -> Result<Value, PipelineError>;
}

#[async_trait]
impl<F, Fut> DataHandler for F
where
    F: Fn(Params, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, PipelineError>> + Send + 'static,
{
    async fn fetch(&self, params: Params, ctx: RequestContext) -> Result<Value, PipelineError> {
        (self)(params, ctx).await
    }
}
