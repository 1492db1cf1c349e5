//! Template variables for a new project

use crate::catalog::ModuleDescriptor;
use crate::composer::Context;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

/// Package managers in order of preference
const PACKAGE_MANAGERS: &[&str] = &["bun", "pnpm", "npm"];

/// Longest name npm accepts
const MAX_PACKAGE_NAME_LEN: usize = 214;

/// Facts about the project and the machine it is created on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub project_name: String,
    pub author: String,
    pub package_manager: String,
}

impl ProjectInfo {
    /// Fill author and package manager from the local environment
    pub fn detect(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            author: detect_author().unwrap_or_default(),
            package_manager: detect_package_manager().to_string(),
        }
    }
}

/// Build the substitution context.
///
/// `overrides` are applied last, so `--var PROJECT_NAME=...` wins.
pub fn build_context(
    info: &ProjectInfo,
    modules: &[Arc<ModuleDescriptor>],
    overrides: &[(String, String)],
) -> Context {
    let mut context = Context::new();
    context.insert("PROJECT_NAME".into(), info.project_name.clone());
    context.insert("PACKAGE_NAME".into(), package_name(&info.project_name));
    context.insert("AUTHOR".into(), info.author.clone());
    context.insert("PACKAGE_MANAGER".into(), info.package_manager.clone());
    context.insert(
        "MODULES".into(),
        modules
            .iter()
            .map(|m| m.id.as_str())
            .collect::<Vec<_>>()
            .join(","),
    );
    for (key, value) in overrides {
        context.insert(key.clone(), value.clone());
    }
    context
}

/// Project name for a target directory: its last component
pub fn project_name_for(dir: &Path) -> String {
    dir.file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("app")
        .to_string()
}

/// npm-safe package name: lower-case, `-` for anything else, no leading dot
/// or underscore
pub fn package_name(project_name: &str) -> String {
    let mut name = String::with_capacity(project_name.len());
    for c in project_name.trim().chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '-'
        };
        if c == '-' && name.ends_with('-') {
            continue;
        }
        name.push(c);
    }

    let name = name.trim_start_matches(['.', '_', '-']).trim_end_matches('-');
    let name: String = name.chars().take(MAX_PACKAGE_NAME_LEN).collect();
    if name.is_empty() {
        "app".to_string()
    } else {
        name
    }
}

/// `git config user.name`, if git is installed and the name is set
pub fn detect_author() -> Option<String> {
    Command::new("git")
        .args(["config", "user.name"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Detect the preferred available package manager
pub fn detect_package_manager() -> &'static str {
    for manager in PACKAGE_MANAGERS {
        if Command::new(manager)
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
        {
            return manager;
        }
    }
    // Default to npm if nothing detected (install step will fail with a clear error)
    "npm"
}
