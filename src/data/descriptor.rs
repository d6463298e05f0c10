//! Data handler results.
//!
//! A handler either returns the data itself or names a service method to call.
//! The two are told apart by shape, not by type.

use serde_json::Value;

use crate::JsonMap;

/// A request to call `service_name.method_name` with `args`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    pub service_name: String,
    pub method_name: String,
    pub args: Option<JsonMap>,
}

impl ServiceDescriptor {
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            args: None,
        }
    }

    pub fn with_args(mut self, args: JsonMap) -> Self {
        self.args = Some(args);
        self
    }

    /// The wire shape a handler would return for this descriptor.
    pub fn to_value(&self) -> Value {
        let mut map = JsonMap::new();
        map.insert("serviceName".into(), Value::String(self.service_name.clone()));
        map.insert("methodName".into(), Value::String(self.method_name.clone()));
        if let Some(args) = &self.args {
            map.insert("args".into(), Value::Object(args.clone()));
        }
        Value::Object(map)
    }
}

/// What a data handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DataResult {
    /// Final data, used as-is.
    Literal(JsonMap),
    /// Resolve through the service registry.
    Descriptor(ServiceDescriptor),
}

impl DataResult {
    /// Classify a handler result by shape.
    ///
    /// An object is a descriptor iff `serviceName` and `methodName` are strings
    /// and `args`, when present, is an object. Any other object is literal
    /// data. Non-objects yield `None`.
    pub fn classify(value: Value) -> Option<DataResult> {
        let map = match value {
            Value::Object(map) => map,
            _ => return None,
        };

        let is_descriptor = matches!(map.get("serviceName"), Some(Value::String(_)))
            && matches!(map.get("methodName"), Some(Value::String(_)))
            && matches!(map.get("args"), None | Some(Value::Object(_)));

        if !is_descriptor {
            return Some(DataResult::Literal(map));
        }

        let mut map = map;
        let take_string = |map: &mut JsonMap, key: &str| match map.remove(key) {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        let service_name = take_string(&mut map, "serviceName");
        let method_name = take_string(&mut map, "methodName");
        let args = match map.remove("args") {
            Some(Value::Object(args)) => Some(args),
            _ => None,
        };

        Some(DataResult::Descriptor(ServiceDescriptor {
            service_name,
            method_name,
            args,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_shape() {
        let value = json!({ "serviceName": "users", "methodName": "get", "args": { "id": "42" } });
        match DataResult::classify(value) {
            Some(DataResult::Descriptor(d)) => {
                assert_eq!(d.service_name, "users");
                assert_eq!(d.method_name, "get");
                assert_eq!(d.args.unwrap()["id"], "42");
            }
            other => panic!("expected descriptor, got {other:?}"),
        }
    }

    #[test]
    fn test_descriptor_without_args() {
        let value = json!({ "serviceName": "users", "methodName": "list" });
        assert!(matches!(
            DataResult::classify(value),
            Some(DataResult::Descriptor(ServiceDescriptor { args: None, .. }))
        ));
    }

    #[test]
    fn test_near_misses_are_literal() {
        for value in [
            json!({ "serviceName": "users" }),
            json!({ "serviceName": 1, "methodName": "get" }),
            json!({ "serviceName": "users", "methodName": "get", "args": [1] }),
            json!({ "title": "hello" }),
        ] {
            assert!(matches!(DataResult::classify(value), Some(DataResult::Literal(_))));
        }
    }

    #[test]
    fn test_non_objects_rejected() {
        assert!(DataResult::classify(json!([1, 2])).is_none());
        assert!(DataResult::classify(json!("x")).is_none());
        assert!(DataResult::classify(Value::Null).is_none());
    }

    #[test]
    fn test_to_value_classifies_back() {
        let mut args = JsonMap::new();
        args.insert("id".into(), json!(7));
        let d = ServiceDescriptor::new("users", "get").with_args(args);
        assert_eq!(DataResult::classify(d.to_value()), Some(DataResult::Descriptor(d)));
    }
}
