//! Generic configuration tree
//!
//! A [`Tree`] is the ordered, schema-free form of a configuration file:
//! what the backend parses into and what migrations operate on before the
//! result is bound to a typed schema.

use toml::Value;

use parsek_utils::{ParsekError, Result};

/// Ordered hierarchical key/value tree
pub type Tree = toml::Table;

/// Look up a value by dotted path (`"server.port"`)
pub fn get_path<'a>(tree: &'a Tree, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = tree.get(segments.next()?)?;
    for segment in segments {
        current = current.as_table()?.get(segment)?;
    }
    Some(current)
}

/// Deep-merge `top` into `base`; values from `top` win, sub-tables merge
pub fn overlay(base: &mut Tree, top: Tree) {
    for (key, value) in top {
        if let Value::Table(incoming) = value {
            if let Some(Value::Table(existing)) = base.get_mut(&key) {
                overlay(existing, incoming);
                continue;
            }
            base.insert(key, Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Read the mandatory schema version stored under `key`
pub fn read_version(tree: &Tree, key: &str) -> Result<u32> {
    tree.get(key)
        .and_then(Value::as_integer)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| ParsekError::MissingVersion {
            key: key.to_string(),
        })
}

/// Write the schema version under `key`
pub fn stamp_version(tree: &mut Tree, key: &str, version: u32) {
    tree.insert(key.to_string(), Value::Integer(i64::from(version)));
}
