//! String-keyed engine configuration with typed getters.
//!
//! Keys are slash-separated paths (`ember/graphics/gamma`). Values load from
//! a JSON document and from `EMBER_*` environment variables; every read
//! supplies its own default so a missing key is never an error.
//!
//! Environment variables map onto keys by replacing `/` with `_` and
//! upper-casing: `ember/graphics/gamma` reads `EMBER_GRAPHICS_GAMMA`.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::errors::Result;

/// Keys consumed by the rendering core.
pub mod keys {
    pub const RENDER_MISSING_MODELS: &str = "ember/graphics/renderMissingModels";
    pub const RENDER_SKELETON_BONES: &str = "ember/graphics/renderSkeletonBones";
    pub const VISUALIZE_BUFFER: &str = "ember/graphics/visualizeBuffer";
    pub const GAMMA: &str = "ember/graphics/gamma";
    pub const DISABLE_AMBIENT_OCCLUSION: &str = "ember/graphics/disableAmbientOcclusion";
    pub const DISABLE_BLOOM: &str = "ember/graphics/disableBloom";
    pub const ASSETS_LISTEN: &str = "ember/assets/listen";
}

/// Thread-safe configuration registry.
///
/// Cheap to clone; all clones share the same storage. Reads take a shared
/// lock and are intended for per-frame use (pipeline stages read their flags
/// once per tick, not per entity).
#[derive(Clone, Default)]
pub struct Config {
    values: Arc<RwLock<FxHashMap<String, Value>>>,
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads keys from a JSON object of the form `{"ember/graphics/gamma": 2.2}`.
    ///
    /// Nested objects are flattened with `/` separators, so
    /// `{"ember": {"graphics": {"gamma": 2.2}}}` produces the same keys.
    pub fn load_json(&self, document: &str) -> Result<()> {
        let root: Value = serde_json::from_str(document)?;
        let mut values = self.values.write();
        flatten_into(&mut values, String::new(), &root);
        Ok(())
    }

    /// Reads `EMBER_*` environment variables into the registry.
    ///
    /// Values parse as JSON scalars where possible and fall back to strings.
    pub fn load_environment(&self) {
        let mut values = self.values.write();
        for (name, value) in std::env::vars() {
            let Some(rest) = name.strip_prefix("EMBER_") else {
                continue;
            };
            let key = format!("ember/{}", rest.to_lowercase().replace('_', "/"));
            let parsed = serde_json::from_str(&value).unwrap_or(Value::String(value));
            values.insert(key, parsed);
        }
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.values.write().insert(key.to_string(), value.into());
    }

    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.read().get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
            Some(other) => warn_type(key, "bool", other, default),
            None => default,
        }
    }

    #[must_use]
    pub fn get_i32(&self, key: &str, default: i32) -> i32 {
        match self.values.read().get(key) {
            Some(Value::Number(n)) => n.as_i64().map_or(default, |v| v as i32),
            Some(other) => warn_type(key, "i32", other, default),
            None => default,
        }
    }

    #[must_use]
    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        match self.values.read().get(key) {
            Some(Value::Number(n)) => n.as_u64().map_or(default, |v| v as u32),
            Some(other) => warn_type(key, "u32", other, default),
            None => default,
        }
    }

    #[must_use]
    pub fn get_f32(&self, key: &str, default: f32) -> f32 {
        match self.values.read().get(key) {
            Some(Value::Number(n)) => n.as_f64().map_or(default, |v| v as f32),
            Some(other) => warn_type(key, "f32", other, default),
            None => default,
        }
    }

    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.values.read().get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => default.to_string(),
        }
    }
}

fn warn_type<T>(key: &str, expected: &'static str, value: &Value, default: T) -> T {
    log::warn!("config key {key} does not hold a {expected} (found {value}), using default");
    default
}

fn flatten_into(out: &mut FxHashMap<String, Value>, prefix: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}/{k}")
                };
                flatten_into(out, key, v);
            }
        }
        _ => {
            out.insert(prefix, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_with_defaults() {
        let cfg = Config::new();
        assert!(!cfg.get_bool(keys::RENDER_MISSING_MODELS, false));
        assert_eq!(cfg.get_f32(keys::GAMMA, 2.2), 2.2);

        cfg.set(keys::GAMMA, 1.8);
        cfg.set(keys::VISUALIZE_BUFFER, -1);
        assert_eq!(cfg.get_f32(keys::GAMMA, 2.2), 1.8);
        assert_eq!(cfg.get_i32(keys::VISUALIZE_BUFFER, 0), -1);
    }

    #[test]
    fn json_documents_flatten() {
        let cfg = Config::new();
        cfg.load_json(r#"{"ember": {"graphics": {"disableBloom": true}}}"#)
            .unwrap();
        assert!(cfg.get_bool(keys::DISABLE_BLOOM, false));
    }
}
