//! `package.json` model.
//!
//! Keys live in a `BTreeMap`, so the serialized form is key-sorted and
//! canonical. Only the fields the engine reads get typed accessors; every
//! other key passes through untouched.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Lifecycle hooks that npm runs automatically around installation.
pub const INSTALL_HOOKS: &[&str] = &["preinstall", "postinstall"];

/// Why bytes could not be turned into a [`Manifest`].
#[derive(Debug, thiserror::Error)]
pub enum ManifestParseError {
    #[error("not valid UTF-8: {0}")]
    Utf8(#[source] std::str::Utf8Error),
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("top-level value is not an object")]
    NotAnObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    fields: BTreeMap<String, Value>,
}

impl Manifest {
    /// Parse manifest bytes. The input must be UTF-8 JSON with an object at
    /// the top level.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestParseError> {
        let text = std::str::from_utf8(bytes).map_err(ManifestParseError::Utf8)?;
        match serde_json::from_str::<Value>(text).map_err(ManifestParseError::Json)? {
            Value::Object(map) => Ok(Self {
                fields: map.into_iter().collect(),
            }),
            _ => Err(ManifestParseError::NotAnObject),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.get("version").and_then(Value::as_str)
    }

    /// `scripts` when it is an object.
    pub fn scripts(&self) -> Option<&Map<String, Value>> {
        self.get("scripts").and_then(Value::as_object)
    }

    /// `dependencies` when it is an object.
    pub fn dependencies(&self) -> Option<&Map<String, Value>> {
        self.get("dependencies").and_then(Value::as_object)
    }

    /// `devDependencies` when it is an object.
    pub fn dev_dependencies(&self) -> Option<&Map<String, Value>> {
        self.get("devDependencies").and_then(Value::as_object)
    }

    /// Whether `scripts` declares any of [`INSTALL_HOOKS`].
    pub fn has_install_hook(&self) -> bool {
        self.scripts()
            .is_some_and(|s| INSTALL_HOOKS.iter().any(|hook| s.contains_key(*hook)))
    }

    /// Blank `name` and `version` (inserting them when absent), so that
    /// republishing the same code under another name or version is invisible.
    pub fn blank_identity(&mut self) {
        self.fields.insert("name".to_string(), Value::String(String::new()));
        self.fields.insert("version".to_string(), Value::String(String::new()));
    }

    /// Canonical serialization: keys sorted at every level, no whitespace.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(b'{');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(b',');
            }
            write_scalar(&mut out, key);
            out.push(b':');
            write_canonical(value, &mut out);
        }
        out.push(b'}');
        out
    }
}

// Nested objects are sorted here rather than trusting `Map` iteration order,
// which follows insertion order when serde_json's `preserve_order` is on.
fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<(&String, &Value)> = map.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (key, v)) in pairs.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(out, key);
                out.push(b':');
                write_canonical(v, out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(v, out);
            }
            out.push(b']');
        }
        scalar => write_scalar(out, scalar),
    }
}

fn write_scalar<T: serde::Serialize + ?Sized>(out: &mut Vec<u8>, value: &T) {
    // strings, numbers, bools and null cannot fail to serialize into a Vec
    let _ = serde_json::to_writer(&mut *out, value);
}
