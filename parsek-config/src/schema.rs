//! Binding between trees and typed configuration
//!
//! Every scope declares its schema as a serde type. Binding drops fields the
//! type does not know about; it never fills in fields an old file lacks.
//! That is the job of migrations.

use serde::{de::DeserializeOwned, Serialize};

use parsek_utils::{ParsekError, Result};

use crate::tree::{self, Tree};

/// A typed configuration schema for one scope
pub trait ConfigSchema:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    /// Baseline values overlaid on the type's defaults for fresh installs
    fn scope_defaults() -> Tree {
        Tree::new()
    }

    /// Commented document fresh files are rendered onto
    fn template() -> Option<&'static str> {
        None
    }
}

/// Serialize a typed configuration into a tree
pub fn to_tree<T: Serialize>(value: &T) -> Result<Tree> {
    match toml::Value::try_from(value) {
        Ok(toml::Value::Table(table)) => Ok(table),
        Ok(other) => Err(ParsekError::bind(format!(
            "expected a table, found {}",
            other.type_str()
        ))),
        Err(e) => Err(ParsekError::bind(e.to_string())),
    }
}

/// Deserialize a tree into a typed configuration
pub fn from_tree<T: DeserializeOwned>(tree: Tree) -> Result<T> {
    toml::Value::Table(tree)
        .try_into()
        .map_err(|e: toml::de::Error| ParsekError::bind(e.message()))
}

/// Tree for a brand-new configuration: type defaults, then scope defaults,
/// then the version stamp
pub fn default_tree<T: ConfigSchema>(version_key: &str, version: u32) -> Result<Tree> {
    let mut tree = to_tree(&T::default())?;
    tree::overlay(&mut tree, T::scope_defaults());
    tree::stamp_version(&mut tree, version_key, version);
    Ok(tree)
}

/// The current configuration of a scope.
///
/// Immutable once built; stores replace it wholesale.
#[derive(Debug, Clone)]
pub struct Configuration<T> {
    version: u32,
    tree: Tree,
    config: T,
}

impl<T: ConfigSchema> Configuration<T> {
    /// Bind a tree, reading its version from `version_key`
    pub fn bind(tree: Tree, version_key: &str) -> Result<Self> {
        let version = tree::read_version(&tree, version_key)?;
        let config = from_tree(tree.clone())?;
        Ok(Self {
            version,
            tree,
            config,
        })
    }

    /// Fresh configuration stamped with `version`
    pub fn defaults(version_key: &str, version: u32) -> Result<Self> {
        Self::bind(default_tree::<T>(version_key, version)?, version_key)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn config(&self) -> &T {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use toml::Value;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct SearchConfig {
        version: u32,
        index: String,
        shards: u16,
    }

    impl ConfigSchema for SearchConfig {
        fn scope_defaults() -> Tree {
            toml::from_str(r#"index = "main""#).unwrap()
        }
    }

    #[test]
    fn test_default_tree_overlays_scope_defaults() {
        let tree = default_tree::<SearchConfig>("version", 4).unwrap();
        assert_eq!(tree.get("index").and_then(Value::as_str), Some("main"));
        assert_eq!(tree.get("shards").and_then(Value::as_integer), Some(0));
        assert_eq!(tree.get("version").and_then(Value::as_integer), Some(4));
    }

    #[test]
    fn test_round_trip_typed() {
        let config = SearchConfig {
            version: 2,
            index: "products".into(),
            shards: 3,
        };
        let back: SearchConfig = from_tree(to_tree(&config).unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_unknown_fields_are_dropped() {
        let tree: Tree = toml::from_str(
            r#"
            version = 1
            index = "main"
            shards = 1
            legacy = "gone"
            "#,
        )
        .unwrap();

        let config: SearchConfig = from_tree(tree).unwrap();
        let back = to_tree(&config).unwrap();
        assert!(!back.contains_key("legacy"));
    }

    #[test]
    fn test_missing_field_is_not_defaulted() {
        let tree: Tree = toml::from_str("version = 1\nindex = \"main\"").unwrap();
        let result: Result<SearchConfig> = from_tree(tree);
        assert!(matches!(result, Err(ParsekError::Bind { .. })));
    }

    #[test]
    fn test_bind_reads_version() {
        let configuration = Configuration::<SearchConfig>::defaults("version", 3).unwrap();
        assert_eq!(configuration.version(), 3);
        assert_eq!(configuration.config().version, 3);
        assert_eq!(configuration.config().index, "main");
    }

    #[test]
    fn test_bind_requires_version() {
        let tree: Tree = toml::from_str("index = \"main\"\nshards = 1").unwrap();
        let result = Configuration::<SearchConfig>::bind(tree, "version");
        assert!(matches!(result, Err(ParsekError::MissingVersion { .. })));
    }
}
