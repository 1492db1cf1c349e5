//! Module catalog: descriptors for every stack module and the lookup table
//! built from them.
//!
//! The catalog is loaded once per process (see [`Catalog::load_dir`]) and is
//! never mutated afterwards. Descriptors are shared as `Arc`s so resolution
//! results can hand them out without copying.

pub mod manifest;
pub mod version;

use crate::merge::MergeStrategy;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

pub use manifest::RootManifest;

/// Module categories, declared in ordering priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    FrontendFramework,
    UiLibrary,
    BackendFramework,
    BackendService,
    AuthProvider,
    Other,
}

impl Category {
    /// All categories in priority order
    pub const ALL: [Category; 6] = [
        Category::FrontendFramework,
        Category::UiLibrary,
        Category::BackendFramework,
        Category::BackendService,
        Category::AuthProvider,
        Category::Other,
    ];

    /// Tie-break rank used when ordering resolved modules (lower sorts first)
    pub fn rank(&self) -> u8 {
        match self {
            Category::FrontendFramework => 0,
            Category::UiLibrary => 1,
            Category::BackendFramework => 2,
            Category::BackendService => 3,
            Category::AuthProvider => 4,
            Category::Other => 5,
        }
    }

    /// Tag used in descriptors and in `requires` lists
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FrontendFramework => "frontend-framework",
            Category::UiLibrary => "ui-library",
            Category::BackendFramework => "backend-framework",
            Category::BackendService => "backend-service",
            Category::AuthProvider => "auth-provider",
            Category::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::FrontendFramework => "Frontend framework",
            Category::UiLibrary => "UI library",
            Category::BackendFramework => "Backend framework",
            Category::BackendService => "Backend service",
            Category::AuthProvider => "Auth provider",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// One file a module contributes to the generated project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FileEntryRepr")]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Output path, relative to the project root, `/`-separated
    pub path: String,
    /// Whether placeholders are substituted in this file
    pub is_template: bool,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, is_template: bool) -> Self {
        Self {
            path: path.into(),
            is_template,
        }
    }
}

/// Manifest entries may be a bare path or a `{path, isTemplate}` map
#[derive(Deserialize)]
#[serde(untagged)]
enum FileEntryRepr {
    Path(String),
    Full {
        path: String,
        #[serde(default = "default_true", rename = "isTemplate", alias = "template")]
        is_template: bool,
    },
}

impl From<FileEntryRepr> for FileEntry {
    fn from(repr: FileEntryRepr) -> Self {
        match repr {
            FileEntryRepr::Path(path) => FileEntry::new(path, true),
            FileEntryRepr::Full { path, is_template } => FileEntry::new(path, is_template),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A glob pattern forcing a merge strategy for matching paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOverride {
    pub pattern: String,
    pub strategy: MergeStrategy,
}

/// Immutable description of a stack module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub provides: BTreeSet<String>,
    #[serde(default)]
    pub requires: BTreeSet<String>,
    #[serde(default)]
    pub incompatible_with: BTreeSet<String>,
    #[serde(default)]
    pub compatible_with: BTreeSet<String>,
    #[serde(default)]
    pub exclusive_category: bool,
    /// Frontend framework ids this module works with (empty means any)
    #[serde(default)]
    pub frameworks: BTreeSet<String>,
    /// Capabilities this module is the preferred provider for
    #[serde(default)]
    pub recommended_for: BTreeSet<String>,
    /// External tools the generated project needs (node, npm, ...)
    #[serde(default)]
    pub tools: BTreeSet<String>,
    #[serde(default)]
    pub file_manifest: Vec<FileEntry>,
    #[serde(
        default,
        deserialize_with = "deserialize_overrides",
        serialize_with = "serialize_overrides"
    )]
    pub merge_overrides: Vec<MergeOverride>,
}

impl ModuleDescriptor {
    /// Create a descriptor with only an id and category set
    pub fn new(id: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            category,
            provides: BTreeSet::new(),
            requires: BTreeSet::new(),
            incompatible_with: BTreeSet::new(),
            compatible_with: BTreeSet::new(),
            exclusive_category: false,
            frameworks: BTreeSet::new(),
            recommended_for: BTreeSet::new(),
            tools: BTreeSet::new(),
            file_manifest: Vec::new(),
            merge_overrides: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Whether this module satisfies a requirement, either by a `provides`
    /// tag or by its category name
    pub fn satisfies(&self, capability: &str) -> bool {
        self.provides.contains(capability) || self.category.as_str() == capability
    }

    /// Ordering key: category rank, then id
    pub fn sort_key(&self) -> (u8, &str) {
        (self.category.rank(), self.id.as_str())
    }
}

fn deserialize_overrides<'de, D>(deserializer: D) -> Result<Vec<MergeOverride>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OverridesVisitor;

    impl<'de> Visitor<'de> for OverridesVisitor {
        type Value = Vec<MergeOverride>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map from glob pattern to merge strategy")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            // Keep declaration order: the first matching pattern wins
            let mut overrides = Vec::new();
            while let Some((pattern, strategy)) = map.next_entry::<String, MergeStrategy>()? {
                overrides.push(MergeOverride { pattern, strategy });
            }
            Ok(overrides)
        }
    }

    deserializer.deserialize_map(OverridesVisitor)
}

fn serialize_overrides<S>(overrides: &[MergeOverride], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(overrides.len()))?;
    for o in overrides {
        map.serialize_entry(&o.pattern, &o.strategy)?;
    }
    map.end()
}

/// Errors raised while loading or building a catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Failed to walk template files: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Module '{0}' is declared more than once")]
    DuplicateId(String),
    #[error("A module descriptor has an empty id")]
    EmptyId,
    #[error("Module directory '{dir}' declares id '{found}'")]
    IdMismatch { dir: String, found: String },
}

/// Single-file catalog format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    min_cli_version: Option<String>,
    #[serde(default)]
    modules: Vec<ModuleDescriptor>,
}

/// Read-only lookup table of module descriptors
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    manifest: RootManifest,
    modules: Vec<Arc<ModuleDescriptor>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog; declaration order is kept and used for tie-breaks
    pub fn new(descriptors: Vec<ModuleDescriptor>) -> Result<Self, CatalogError> {
        let mut modules = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if descriptor.id.trim().is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if index.contains_key(&descriptor.id) {
                return Err(CatalogError::DuplicateId(descriptor.id));
            }
            index.insert(descriptor.id.clone(), modules.len());
            modules.push(Arc::new(descriptor));
        }

        let catalog = Self {
            manifest: RootManifest::default(),
            modules,
            index,
        };
        catalog.warn_dangling_references();
        Ok(catalog)
    }

    /// Parse a single YAML document holding a `modules:` list
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml).map_err(|source| CatalogError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        let manifest = RootManifest {
            name: file.name,
            version: file.version,
            min_cli_version: file.min_cli_version,
            modules: file.modules.iter().map(|m| m.id.clone()).collect(),
        };
        Ok(Self::new(file.modules)?.with_manifest(manifest))
    }

    pub(crate) fn with_manifest(mut self, manifest: RootManifest) -> Self {
        self.manifest = manifest;
        self
    }

    /// Root manifest the catalog was loaded with
    pub fn manifest(&self) -> &RootManifest {
        &self.manifest
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.index.get(id).map(|&i| &self.modules[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All modules in declaration order
    pub fn all(&self) -> &[Arc<ModuleDescriptor>] {
        &self.modules
    }

    pub fn by_category(&self, category: Category) -> Vec<&Arc<ModuleDescriptor>> {
        self.modules
            .iter()
            .filter(|m| m.category == category)
            .collect()
    }

    /// Modules satisfying a capability, in declaration order
    pub fn providers_of(&self, capability: &str) -> Vec<&Arc<ModuleDescriptor>> {
        self.modules
            .iter()
            .filter(|m| m.satisfies(capability))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn warn_dangling_references(&self) {
        for module in &self.modules {
            let referenced = module
                .incompatible_with
                .iter()
                .chain(module.compatible_with.iter())
                .chain(module.frameworks.iter());
            for id in referenced {
                if !self.contains(id) {
                    warn!(module = %module.id, reference = %id, "module references an unknown id");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
version: "1.0.0"
modules:
  - id: vue-base
    name: Vue 3
    category: frontend-framework
    provides: [frontend, vue]
    exclusiveCategory: true
    fileManifest:
      - package.json
      - path: public/logo.png
        isTemplate: false
  - id: vuetify
    category: ui-library
    requires: [frontend]
    frameworks: [vue-base]
    mergeOverrides:
      "src/plugins/**": append
      "*.ts": merge-entry
"#;

    #[test]
    fn test_parse_yaml_catalog() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.manifest().version.as_deref(), Some("1.0.0"));

        let vue = catalog.get("vue-base").unwrap();
        assert_eq!(vue.display_name(), "Vue 3");
        assert!(vue.exclusive_category);
        assert_eq!(
            vue.file_manifest,
            vec![
                FileEntry::new("package.json", true),
                FileEntry::new("public/logo.png", false)
            ]
        );
    }

    #[test]
    fn test_merge_overrides_keep_declaration_order() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        let vuetify = catalog.get("vuetify").unwrap();
        let patterns: Vec<_> = vuetify
            .merge_overrides
            .iter()
            .map(|o| o.pattern.as_str())
            .collect();
        assert_eq!(patterns, vec!["src/plugins/**", "*.ts"]);
        assert_eq!(vuetify.merge_overrides[1].strategy, MergeStrategy::MergeEntry);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Catalog::new(vec![
            ModuleDescriptor::new("a", Category::Other),
            ModuleDescriptor::new("a", Category::Other),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = Catalog::new(vec![ModuleDescriptor::new(" ", Category::Other)]).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyId));
    }

    #[test]
    fn test_lookup_helpers() {
        let catalog = Catalog::from_yaml_str(CATALOG).unwrap();
        assert!(catalog.get("missing").is_none());
        assert_eq!(catalog.by_category(Category::UiLibrary).len(), 1);

        let providers: Vec<_> = catalog
            .providers_of("frontend")
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(providers, vec!["vue-base"]);

        // Category names satisfy requirements too
        let by_category: Vec<_> = catalog
            .providers_of("ui-library")
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(by_category, vec!["vuetify"]);
    }

    #[test]
    fn test_category_order_and_parse() {
        let ranks: Vec<u8> = Category::ALL.iter().map(|c| c.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!("auth-provider".parse::<Category>(), Ok(Category::AuthProvider));
        assert!("database".parse::<Category>().is_err());
    }
}
