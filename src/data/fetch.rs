//! Initial data fetch for a matched route.
//!
//! # Responsibilities
//! - Skip entirely when the route has no data handler
//! - Run the handler and classify its result
//! - Delegate service descriptors to the dispatcher
//! - Log failures with route context and hand them back to the orchestrator

use serde_json::json;

use crate::data::descriptor::DataResult;
use crate::error::{ErrorKind, PipelineError};
use crate::routing::{Params, Route};
use crate::services::{call_service_method, RequestContext, ServiceRegistry};
use crate::JsonMap;

/// Resolve the initial data for `route`.
pub async fn fetch_initial_data(
    route: &Route,
    params: &Params,
    registry: &ServiceRegistry,
    ctx: &RequestContext,
) -> Result<JsonMap, PipelineError> {
    let Some(handler) = route.data_handler() else {
        return Ok(JsonMap::new());
    };

    let result = async {
        let value = handler
            .fetch(params.clone(), ctx.clone())
            .await
            .map_err(|e| PipelineError::from_unknown(e, ErrorKind::Infra))?;

        match DataResult::classify(value) {
            Some(DataResult::Literal(data)) => Ok(data),
            Some(DataResult::Descriptor(descriptor)) => {
                call_service_method(
                    registry,
                    &descriptor.service_name,
                    &descriptor.method_name,
                    descriptor.args.unwrap_or_default(),
                    ctx,
                )
                .await
            }
            None => Err(PipelineError::bad_request(
                "data handler must return an object or a service descriptor",
            )),
        }
    }
    .await;

    if let Err(err) = &result {
        tracing::error!(
            parent: &ctx.span,
            route = %route.path,
            params = %json!(params),
            error = %err.to_log_value(),
            "Initial data fetch failed"
        );
    }
    result
}
