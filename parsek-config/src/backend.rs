//! TOML file backend
//!
//! Reads and writes a scope's configuration file. The last parsed document
//! is retained so that re-saving a tree keeps the user's comments, key order
//! and formatting; only values that actually changed are rewritten.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use toml_edit::{ArrayOfTables, DocumentMut, InlineTable, Item};

use parsek_utils::{ParsekError, Result};

use crate::tree::Tree;

/// Comment-preserving reader/writer for one configuration file
#[derive(Debug)]
pub struct TomlBackend {
    path: PathBuf,
    /// Layout of the file as last read or written
    document: Mutex<Option<DocumentMut>>,
}

impl TomlBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and parse the file
    pub fn load(&self) -> Result<Tree> {
        let content = fs::read_to_string(&self.path).map_err(|e| ParsekError::FileRead {
            path: self.path.clone(),
            source: e,
        })?;

        self.parse(&content)
    }

    /// Parse text into a tree, retaining its layout for later writes
    pub fn parse(&self, content: &str) -> Result<Tree> {
        let document = content
            .parse::<DocumentMut>()
            .map_err(|e| ParsekError::parse(&self.path, e.to_string()))?;
        let tree = parse_tree(content).map_err(|e| match e {
            ParsekError::Parse { message, .. } => ParsekError::parse(&self.path, message),
            other => other,
        })?;

        *self.document.lock() = Some(document);
        Ok(tree)
    }

    /// Use `template` as the layout for the next write when no file has
    /// been read yet
    pub fn seed(&self, template: &str) -> Result<()> {
        let document = template
            .parse::<DocumentMut>()
            .map_err(|e| ParsekError::parse("<template>", e.to_string()))?;

        let mut slot = self.document.lock();
        if slot.is_none() {
            *slot = Some(document);
        }
        Ok(())
    }

    /// Render `tree` onto the retained layout
    pub fn render(&self, tree: &Tree) -> Result<String> {
        let mut document = self.document.lock().clone().unwrap_or_default();
        apply_table(document.as_table_mut(), tree)?;
        Ok(document.to_string())
    }

    /// Render `tree` and replace the file with it.
    ///
    /// Parent directories are created as needed; the content goes to a
    /// sibling temp file first and is renamed into place.
    pub fn write(&self, tree: &Tree) -> Result<()> {
        let mut document = self.document.lock().clone().unwrap_or_default();
        apply_table(document.as_table_mut(), tree)?;
        let content = document.to_string();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ParsekError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).map_err(|e| ParsekError::FileWrite {
                path: temp_path.clone(),
                source: e,
            })?;
            file.write_all(content.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|e| ParsekError::FileWrite {
                    path: temp_path.clone(),
                    source: e,
                })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| ParsekError::FileWrite {
            path: self.path.clone(),
            source: e,
        })?;

        *self.document.lock() = Some(document);
        tracing::debug!(path = %self.path.display(), "Config written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

/// Parse TOML text into a tree
pub fn parse_tree(content: &str) -> Result<Tree> {
    toml::from_str(content).map_err(|e| ParsekError::parse("<string>", e.message()))
}

/// Render a tree as a fresh TOML document
pub fn render_tree(tree: &Tree) -> Result<String> {
    let mut document = DocumentMut::new();
    apply_table(document.as_table_mut(), tree)?;
    Ok(document.to_string())
}

/// Make `target` hold exactly the entries of `source`, keeping the decor
/// (comments, whitespace) of entries that survive.
fn apply_table(target: &mut toml_edit::Table, source: &Tree) -> Result<()> {
    let stale: Vec<String> = target
        .iter()
        .map(|(key, _)| key.to_string())
        .filter(|key| !source.contains_key(key))
        .collect();
    for key in stale {
        target.remove(&key);
    }

    for (key, value) in source {
        let replacement = match (target.get_mut(key), value) {
            (Some(Item::Table(existing)), toml::Value::Table(sub)) => {
                apply_table(existing, sub)?;
                None
            }
            (Some(Item::Value(existing)), value) => {
                let mut updated = to_value(value)?;
                *updated.decor_mut() = existing.decor().clone();
                *existing = updated;
                None
            }
            (_, value) => Some(to_item(value)?),
        };

        if let Some(item) = replacement {
            target.insert(key, item);
        }
    }

    Ok(())
}

fn to_item(value: &toml::Value) -> Result<Item> {
    match value {
        toml::Value::Table(table) => {
            let mut out = toml_edit::Table::new();
            apply_table(&mut out, table)?;
            Ok(Item::Table(out))
        }
        toml::Value::Array(items) if is_table_array(items) => {
            let mut out = ArrayOfTables::new();
            for item in items {
                if let toml::Value::Table(table) = item {
                    let mut entry = toml_edit::Table::new();
                    apply_table(&mut entry, table)?;
                    out.push(entry);
                }
            }
            Ok(Item::ArrayOfTables(out))
        }
        other => Ok(Item::Value(to_value(other)?)),
    }
}

fn to_value(value: &toml::Value) -> Result<toml_edit::Value> {
    let converted = match value {
        toml::Value::String(s) => toml_edit::Value::from(s.as_str()),
        toml::Value::Integer(i) => toml_edit::Value::from(*i),
        toml::Value::Float(f) => toml_edit::Value::from(*f),
        toml::Value::Boolean(b) => toml_edit::Value::from(*b),
        toml::Value::Datetime(dt) => {
            let dt = dt
                .to_string()
                .parse::<toml_edit::Datetime>()
                .map_err(|e| ParsekError::Render {
                    message: e.to_string(),
                })?;
            toml_edit::Value::from(dt)
        }
        toml::Value::Array(items) => {
            let mut out = toml_edit::Array::new();
            for item in items {
                out.push(to_value(item)?);
            }
            toml_edit::Value::Array(out)
        }
        toml::Value::Table(table) => {
            let mut out = InlineTable::new();
            for (key, item) in table {
                out.insert(key.as_str(), to_value(item)?);
            }
            toml_edit::Value::InlineTable(out)
        }
    };
    Ok(converted)
}

fn is_table_array(items: &[toml::Value]) -> bool {
    !items.is_empty() && items.iter().all(toml::Value::is_table)
}
