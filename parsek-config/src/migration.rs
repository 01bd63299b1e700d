//! Migration steps and chain resolution
//!
//! A scope's steps are validated once, at store construction: every step
//! must strictly advance the version and no two steps may start from the
//! same version. Together these guarantee that walking the chain from any
//! version terminates after at most `len()` steps.

use std::fmt;

use parsek_utils::{ParsekError, Result};

use crate::scope::Scope;
use crate::tree::Tree;

type Transform = Box<dyn Fn(Tree) -> Result<Tree> + Send + Sync>;

/// One-way transform advancing a scope's schema from `from` to `to`
pub struct MigrationStep {
    from: u32,
    to: u32,
    description: String,
    transform: Transform,
}

impl MigrationStep {
    pub fn new<F>(from: u32, to: u32, description: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Tree) -> Result<Tree> + Send + Sync + 'static,
    {
        Self {
            from,
            to,
            description: description.into(),
            transform: Box::new(transform),
        }
    }

    pub fn from_version(&self) -> u32 {
        self.from
    }

    pub fn to_version(&self) -> u32 {
        self.to
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the transform. Does not touch the version field.
    pub fn apply(&self, tree: Tree) -> Result<Tree> {
        (self.transform)(tree).map_err(|e| match e {
            e @ ParsekError::Migration { .. } => e,
            other => ParsekError::Migration {
                from: self.from,
                to: self.to,
                message: other.to_string(),
            },
        })
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Validated, ordered set of migration steps for one scope
#[derive(Debug, Default)]
pub struct MigrationChain {
    /// Sorted by `from`, unique `from` values
    steps: Vec<MigrationStep>,
}

impl MigrationChain {
    /// Validate and sort an unordered collection of steps
    pub fn new(scope: &Scope, steps: impl IntoIterator<Item = MigrationStep>) -> Result<Self> {
        let mut steps: Vec<MigrationStep> = steps.into_iter().collect();

        if let Some(step) = steps.iter().find(|s| s.to <= s.from) {
            return Err(ParsekError::NonAdvancingMigration {
                scope: scope.to_string(),
                from: step.from,
                to: step.to,
            });
        }

        steps.sort_by_key(|s| s.from);

        if let Some(pair) = steps.windows(2).find(|w| w[0].from == w[1].from) {
            return Err(ParsekError::DuplicateMigration {
                scope: scope.to_string(),
                from: pair[0].from,
            });
        }

        Ok(Self { steps })
    }

    /// The step that starts at `version`, if any
    pub fn resolve(&self, version: u32) -> Option<&MigrationStep> {
        self.steps
            .binary_search_by_key(&version, |s| s.from)
            .ok()
            .map(|idx| &self.steps[idx])
    }

    /// Highest version any step reaches, or 1 without steps.
    ///
    /// Brand-new configurations are stamped with this version.
    pub fn latest_version(&self) -> u32 {
        self.steps.iter().map(|s| s.to).max().unwrap_or(1)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> impl Iterator<Item = &MigrationStep> {
        self.steps.iter()
    }
}

/// A step that was applied during a migration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedStep {
    pub from: u32,
    pub to: u32,
    pub description: String,
}

impl From<&MigrationStep> for AppliedStep {
    fn from(step: &MigrationStep) -> Self {
        Self {
            from: step.from,
            to: step.to,
            description: step.description.clone(),
        }
    }
}

/// Outcome of one migration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version the pass started from
    pub from: u32,
    /// Version the pass settled on
    pub to: u32,
    pub applied: Vec<AppliedStep>,
    /// Whether the migrated tree was written back to disk
    pub persisted: bool,
}

impl MigrationReport {
    /// True when no step applied (the configuration was already current)
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}
