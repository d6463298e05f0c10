//! Service call dispatch.
//!
//! # Responsibilities
//! - Look up `service.method` in the registry
//! - Invoke it with the request context
//! - Enforce the object-result contract
//! - Time, log and normalize every failure
//!
//! # Design Decisions
//! - No retries here; retry policy belongs to the individual method
//! - An already-canceled request never reaches the method

use serde_json::{json, Value};
use std::time::Instant;

use crate::error::{ErrorKind, PipelineError};
use crate::observability::metrics;
use crate::services::context::RequestContext;
use crate::services::registry::ServiceRegistry;
use crate::JsonMap;

/// Call a registered service method and return its object result.
pub async fn call_service_method(
    registry: &ServiceRegistry,
    service_name: &str,
    method_name: &str,
    params: JsonMap,
    ctx: &RequestContext,
) -> Result<JsonMap, PipelineError> {
    if ctx.is_canceled() {
        tracing::debug!(
            parent: &ctx.span,
            service = %service_name,
            method = %method_name,
            "Service call skipped, request already canceled"
        );
        return Err(PipelineError::canceled("request canceled before service call")
            .with_details(json!({ "service": service_name, "method": method_name })));
    }

    let start = Instant::now();
    let result = invoke(registry, service_name, method_name, params, ctx).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    match &result {
        Ok(_) => {
            tracing::debug!(
                parent: &ctx.span,
                service = %service_name,
                method = %method_name,
                elapsed_ms,
                "Service call completed"
            );
            metrics::record_service_call(service_name, method_name, "ok", start);
        }
        Err(err) => {
            tracing::error!(
                parent: &ctx.span,
                service = %service_name,
                method = %method_name,
                trace_id = %ctx.trace_id,
                elapsed_ms,
                error = %err.to_log_value(),
                "Service call failed"
            );
            metrics::record_service_call(service_name, method_name, err.kind().as_str(), start);
        }
    }

    result
}

async fn invoke(
    registry: &ServiceRegistry,
    service_name: &str,
    method_name: &str,
    params: JsonMap,
    ctx: &RequestContext,
) -> Result<JsonMap, PipelineError> {
    if !registry.contains_service(service_name) {
        return Err(PipelineError::not_found(format!("unknown service '{service_name}'")));
    }
    let method = registry.method(service_name, method_name).ok_or_else(|| {
        PipelineError::not_found(format!("unknown method '{service_name}.{method_name}'"))
    })?;

    let value = method
        .call(params, ctx.clone())
        .await
        .map_err(|e| PipelineError::from_unknown(e, ErrorKind::Infra))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(PipelineError::infra(format!(
            "service method '{service_name}.{method_name}' returned a non-object result ({})",
            json_type(&other)
        ))),
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
