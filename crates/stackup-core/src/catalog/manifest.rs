//! Template directory layout
//!
//! ```text
//! templates/
//!   catalog.yaml          root manifest, lists modules in declaration order
//!   vue-base/
//!     module.yaml         ModuleDescriptor
//!     files/...           file contributions
//! ```

use super::{Catalog, CatalogError, FileEntry, ModuleDescriptor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Root manifest file name
pub const ROOT_MANIFEST: &str = "catalog.yaml";
/// Per-module descriptor file name
pub const MODULE_MANIFEST: &str = "module.yaml";
/// Directory holding a module's file contributions
pub const FILES_DIR: &str = "files";

/// Root manifest (`catalog.yaml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Oldest CLI version able to use this catalog
    #[serde(default)]
    pub min_cli_version: Option<String>,
    /// Module ids in declaration order
    #[serde(default)]
    pub modules: Vec<String>,
}

impl Catalog {
    /// Load a catalog from a template directory
    pub fn load_dir(root: &Path) -> Result<Catalog, CatalogError> {
        let manifest_path = root.join(ROOT_MANIFEST);
        let manifest: RootManifest = read_yaml(&manifest_path)?;

        let mut descriptors = Vec::with_capacity(manifest.modules.len());
        for id in &manifest.modules {
            let module_dir = root.join(id);
            let mut descriptor: ModuleDescriptor = read_yaml(&module_dir.join(MODULE_MANIFEST))?;
            if &descriptor.id != id {
                return Err(CatalogError::IdMismatch {
                    dir: id.clone(),
                    found: descriptor.id,
                });
            }
            if descriptor.file_manifest.is_empty() {
                descriptor.file_manifest = discover_files(&module_dir.join(FILES_DIR))?;
                debug!(
                    module = %id,
                    files = descriptor.file_manifest.len(),
                    "derived file manifest from template directory"
                );
            }
            descriptors.push(descriptor);
        }

        Ok(Catalog::new(descriptors)?.with_manifest(manifest))
    }
}

/// Enumerate a module's `files/` directory as manifest entries, sorted by path
pub fn discover_files(files_dir: &Path) -> Result<Vec<FileEntry>, CatalogError> {
    if !files_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(files_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(files_dir)
            .unwrap_or(entry.path());
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push(FileEntry::new(path, true));
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| CatalogError::Parse {
        path: PathBuf::from(path),
        source,
    })
}
