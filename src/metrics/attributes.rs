//! Attribute helpers: resource key derivation and attribute-set hashing.

use crate::metrics::types::ResourceKey;
use opentelemetry_proto::tonic::{
    common::v1::{any_value::Value, AnyValue, KeyValue},
    resource::v1::Resource,
};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

const SERVICE_INSTANCE_ID: &str = "service.instance.id";
const SERVICE_NAME: &str = "service.name";
const UNKNOWN_RESOURCE: &str = "Unknown";

/// Canonical hash of a data point's attribute set, independent of attribute order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeSetHash(pub u64);

impl AttributeSetHash {
    pub fn of(attributes: &[KeyValue]) -> Self {
        // Value hashes break ties between repeated keys.
        let mut sorted: Vec<(&str, u64)> = attributes
            .iter()
            .map(|attribute| {
                let mut value_hasher = FxHasher::default();
                hash_any_value(attribute.value.as_ref(), &mut value_hasher);
                (attribute.key.as_str(), value_hasher.finish())
            })
            .collect();
        sorted.sort_unstable();

        let mut hasher = FxHasher::default();
        sorted.len().hash(&mut hasher);
        for (key, value_hash) in sorted {
            key.hash(&mut hasher);
            value_hash.hash(&mut hasher);
        }
        Self(hasher.finish())
    }
}

fn hash_any_value<H: Hasher>(value: Option<&AnyValue>, hasher: &mut H) {
    match value.and_then(|v| v.value.as_ref()) {
        None => 0u8.hash(hasher),
        Some(Value::StringValue(s)) => {
            1u8.hash(hasher);
            s.hash(hasher);
        },
        Some(Value::BoolValue(b)) => {
            2u8.hash(hasher);
            b.hash(hasher);
        },
        Some(Value::IntValue(i)) => {
            3u8.hash(hasher);
            i.hash(hasher);
        },
        Some(Value::DoubleValue(d)) => {
            4u8.hash(hasher);
            d.to_bits().hash(hasher);
        },
        Some(Value::ArrayValue(array)) => {
            5u8.hash(hasher);
            array.values.len().hash(hasher);
            for item in &array.values {
                hash_any_value(Some(item), hasher);
            }
        },
        Some(Value::KvlistValue(list)) => {
            6u8.hash(hasher);
            AttributeSetHash::of(&list.values).hash(hasher);
        },
        Some(Value::BytesValue(bytes)) => {
            7u8.hash(hasher);
            bytes.hash(hasher);
        },
    }
}

/// Render an attribute value as the string used for identity purposes.
pub fn any_value_to_string(value: &AnyValue) -> String {
    match &value.value {
        Some(Value::StringValue(s)) => s.clone(),
        Some(Value::BoolValue(b)) => b.to_string(),
        Some(Value::IntValue(i)) => i.to_string(),
        Some(Value::DoubleValue(d)) => d.to_string(),
        Some(other) => format!("{:?}", other),
        None => String::new(),
    }
}

/// Derive the resource key from resource attributes.
pub fn resource_key(resource: Option<&Resource>) -> ResourceKey {
    let mut service_name = None;
    let mut instance_id = None;

    for attribute in resource.map(|r| r.attributes.as_slice()).unwrap_or_default() {
        let Some(value) = attribute.value.as_ref() else {
            continue;
        };
        match attribute.key.as_str() {
            SERVICE_INSTANCE_ID => instance_id = Some(any_value_to_string(value)),
            SERVICE_NAME => service_name = Some(any_value_to_string(value)),
            _ => {},
        }
    }

    instance_id
        .or(service_name)
        .unwrap_or_else(|| UNKNOWN_RESOURCE.to_string())
}
