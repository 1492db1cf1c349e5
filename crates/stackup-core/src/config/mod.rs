//! Run configuration: template directory lookup, `--var` parsing and the
//! template context

pub mod context;

pub use context::{build_context, package_name, project_name_for, ProjectInfo};

use crate::product::ProductConfig;
use std::path::{Path, PathBuf};

/// Catalog directory: explicit flag, then the product's env var, then the
/// product default
pub fn resolve_template_dir<C: ProductConfig>(config: &C, flag: Option<&Path>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    match std::env::var_os(config.template_dir_env()) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => config.default_template_dir(),
    }
}

/// Parse a `KEY=VALUE` pair; the key must be a valid variable name
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    let valid = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(format!("invalid variable name '{}'", key));
    }
    Ok((key.to_string(), value.to_string()))
}
