//! Layered merging of configuration documents.
//!
//! Each tier contributes a JSON document (YAML files are read into
//! `serde_json::Value`). Mappings merge key by key; any other value, arrays
//! included, replaces what lower tiers said. A `null` means "unset" and leaves
//! the lower tier in place.

use super::loader::ConfigTier;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One tier's configuration document.
#[derive(Debug, Clone)]
pub struct Layer {
    pub tier: ConfigTier,
    pub value: Value,
}

impl Layer {
    pub fn new(tier: ConfigTier, value: Value) -> Self {
        Self { tier, value }
    }
}

/// Merge `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            Value::Object(merge_maps(base_map, overlay_map))
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

fn merge_maps(mut base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in overlay {
        let merged = match base.remove(&key) {
            Some(existing) => deep_merge(existing, value),
            None => value,
        };
        if !merged.is_null() {
            base.insert(key, merged);
        }
    }
    base
}

/// Merged document plus, for every dotted leaf path, the tier that set it.
#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub value: Value,
    pub provenance: BTreeMap<String, ConfigTier>,
}

/// Merge layers lowest tier first.
pub fn merge_layers(layers: Vec<Layer>) -> Merged {
    let mut merged = Merged {
        value: Value::Object(Map::new()),
        provenance: BTreeMap::new(),
    };
    for layer in layers {
        record_leaves(&layer.value, String::new(), layer.tier, &mut merged.provenance);
        merged.value = deep_merge(merged.value, layer.value);
    }
    merged
}

fn record_leaves(
    value: &Value,
    prefix: String,
    tier: ConfigTier,
    out: &mut BTreeMap<String, ConfigTier>,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                record_leaves(child, path, tier, out);
            }
        }
        Value::Null => {}
        _ => {
            if !prefix.is_empty() {
                out.insert(prefix, tier);
            }
        }
    }
}
