//! Merge strategies for files contributed by several modules
//!
//! Every strategy is a pure function of the ordered contributions: the same
//! input always produces byte-identical output.

pub mod json;
pub mod markers;
pub mod text;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How contributions to one output path are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Last contributor wins
    Replace,
    /// Recursive JSON object merge
    MergeJson,
    /// Top-level JSON key merge
    MergeJsonShallow,
    Append,
    AppendUnique,
    MergeRoutes,
    MergeStores,
    MergeEntry,
    MergeEslint,
    MergeViteConfig,
}

impl MergeStrategy {
    pub const ALL: [MergeStrategy; 10] = [
        MergeStrategy::Replace,
        MergeStrategy::MergeJson,
        MergeStrategy::MergeJsonShallow,
        MergeStrategy::Append,
        MergeStrategy::AppendUnique,
        MergeStrategy::MergeRoutes,
        MergeStrategy::MergeStores,
        MergeStrategy::MergeEntry,
        MergeStrategy::MergeEslint,
        MergeStrategy::MergeViteConfig,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Replace => "replace",
            MergeStrategy::MergeJson => "merge-json",
            MergeStrategy::MergeJsonShallow => "merge-json-shallow",
            MergeStrategy::Append => "append",
            MergeStrategy::AppendUnique => "append-unique",
            MergeStrategy::MergeRoutes => "merge-routes",
            MergeStrategy::MergeStores => "merge-stores",
            MergeStrategy::MergeEntry => "merge-entry",
            MergeStrategy::MergeEslint => "merge-eslint",
            MergeStrategy::MergeViteConfig => "merge-vite-config",
        }
    }

    /// Slot that receives fragments written without markers
    pub fn default_slot(&self) -> Option<&'static str> {
        match self {
            MergeStrategy::MergeRoutes => Some("routes"),
            MergeStrategy::MergeStores => Some("stores"),
            MergeStrategy::MergeEntry => Some("plugins"),
            MergeStrategy::MergeViteConfig => Some("plugins"),
            MergeStrategy::MergeEslint => Some("extends"),
            _ => None,
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MergeStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| format!("unknown merge strategy '{}'", s))
    }
}

/// One module's (already substituted) content for a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub module: String,
    pub content: String,
}

impl Contribution {
    pub fn new(module: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            content: content.into(),
        }
    }
}

/// Errors raised by a merge function
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Invalid JSON contributed by '{module}': {source}")]
    InvalidJson {
        module: String,
        source: serde_json::Error,
    },
    #[error("Failed to render merged JSON: {0}")]
    Render(#[source] serde_json::Error),
    #[error("No contribution provides a base file with insertion markers")]
    MissingSkeleton,
    #[error("Both '{first}' and '{second}' contribute a base file")]
    MultipleSkeletons { first: String, second: String },
    #[error("'{module}' targets marker '{marker}', which the base file does not define")]
    MissingMarker { module: String, marker: String },
}

/// Combine ordered contributions with the given strategy
pub fn apply(
    strategy: MergeStrategy,
    path: &str,
    contributions: &[Contribution],
) -> Result<String, MergeError> {
    match strategy {
        MergeStrategy::Replace => Ok(contributions
            .last()
            .map(|c| c.content.clone())
            .unwrap_or_default()),
        MergeStrategy::MergeJson => json::merge_deep(contributions),
        MergeStrategy::MergeJsonShallow => json::merge_shallow(contributions),
        MergeStrategy::Append => Ok(text::append(contributions)),
        MergeStrategy::AppendUnique => Ok(text::append_unique(contributions)),
        MergeStrategy::MergeEslint if is_json_config(path, contributions) => {
            json::merge_deep(contributions)
        }
        MergeStrategy::MergeRoutes
        | MergeStrategy::MergeStores
        | MergeStrategy::MergeEntry
        | MergeStrategy::MergeEslint
        | MergeStrategy::MergeViteConfig => {
            let slot = strategy.default_slot().unwrap_or("default");
            markers::splice(contributions, slot)
        }
    }
}

/// ESLint configs may be JSON (`.eslintrc.json`, or bare `.eslintrc`)
fn is_json_config(path: &str, contributions: &[Contribution]) -> bool {
    path.ends_with(".json")
        || contributions
            .iter()
            .filter(|c| !c.content.trim().is_empty())
            .all(|c| serde_json::from_str::<serde_json::Value>(&c.content).is_ok_and(|v| v.is_object()))
}
