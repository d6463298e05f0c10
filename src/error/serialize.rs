//! Rendering errors for logs and untrusted clients.

use serde_json::{json, Map, Value};
use std::error::Error as StdError;

use crate::error::record::PipelineError;

/// Marker substituted when a cause chain loops back on itself.
pub const CIRCULAR: &str = "[Circular]";
/// Marker substituted when a cause chain is deeper than we follow.
pub const TRUNCATED: &str = "[Truncated]";

const MAX_CAUSE_DEPTH: usize = 8;

impl PipelineError {
    /// Full diagnostic rendering including the cause chain. Log sinks only.
    pub fn to_log_value(&self) -> Value {
        let mut seen: Vec<*const ()> = vec![self as *const Self as *const ()];
        let mut chain: Vec<Value> = Vec::new();
        let mut current = self.source();

        while let Some(err) = current {
            let addr = err as *const dyn StdError as *const ();
            if seen.contains(&addr) {
                chain.push(Value::String(CIRCULAR.to_string()));
                break;
            }
            if chain.len() >= MAX_CAUSE_DEPTH {
                chain.push(Value::String(TRUNCATED.to_string()));
                break;
            }
            seen.push(addr);
            chain.push(describe(err));
            current = err.source();
        }

        let mut root = describe_record(self);
        // Fold the flat chain into nested `cause` objects, innermost last.
        let nested = chain.into_iter().rev().fold(None, |inner, mut node| {
            if let (Some(inner), Value::Object(map)) = (inner, &mut node) {
                map.insert("cause".to_string(), inner);
            }
            Some(node)
        });
        if let (Some(cause), Value::Object(map)) = (nested, &mut root) {
            map.insert("cause".to_string(), cause);
        }
        root
    }

    /// What an untrusted client may see.
    pub fn to_client_value(&self, trace_id: Option<&str>) -> Value {
        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(self.safe_message().to_string()));
        body.insert("kind".to_string(), Value::String(self.kind().to_string()));
        if let Some(trace_id) = trace_id {
            body.insert("traceId".to_string(), Value::String(trace_id.to_string()));
        }
        Value::Object(body)
    }
}

fn describe(err: &(dyn StdError + 'static)) -> Value {
    match err.downcast_ref::<PipelineError>() {
        Some(record) => describe_record(record),
        None => json!({ "message": err.to_string() }),
    }
}

fn describe_record(record: &PipelineError) -> Value {
    let mut map = Map::new();
    map.insert("kind".to_string(), Value::String(record.kind().to_string()));
    map.insert("message".to_string(), Value::String(record.message().to_string()));
    map.insert("httpStatus".to_string(), Value::from(record.http_status()));
    if let Some(details) = record.details() {
        map.insert("details".to_string(), details.clone());
    }
    Value::Object(map)
}
