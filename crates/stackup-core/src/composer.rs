//! Template composition: fetch every contributor's content, substitute the
//! project variables and merge each path with its planned strategy.

use crate::merge::{self, Contribution, MergeError, MergeStrategy};
use crate::planner::{Contributor, MergePlan, PlanEntry, StrategySource};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Template variables, e.g. `PROJECT_NAME`
pub type Context = BTreeMap<String, String>;

/// Composed output: relative path to final content
pub type FileSet = BTreeMap<String, Vec<u8>>;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Module '{module}' has no file '{path}'")]
    NotFound { module: String, path: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Module '{module}' file '{path}' is not valid UTF-8")]
    NotUtf8 { module: String, path: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("Failed to merge {path}: {source}")]
    Merge {
        path: String,
        #[source]
        source: MergeError,
    },

    #[error("Conflicting contents for {path} from modules: {}", modules.join(", "))]
    MergeStrategyConflict { path: String, modules: Vec<String> },

    #[error("Composition task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Source of raw content for a module's file
pub trait ContentProvider: Send + Sync {
    fn read(&self, module_id: &str, path: &str) -> Result<Vec<u8>, ContentError>;
}

impl<F> ContentProvider for F
where
    F: Fn(&str, &str) -> Result<Vec<u8>, ContentError> + Send + Sync,
{
    fn read(&self, module_id: &str, path: &str) -> Result<Vec<u8>, ContentError> {
        self(module_id, path)
    }
}

/// Reads `<root>/<module>/files/<path>`
#[derive(Debug, Clone)]
pub struct TemplateDir {
    root: PathBuf,
}

impl TemplateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_path(&self, module_id: &str, path: &str) -> PathBuf {
        self.root
            .join(module_id)
            .join(crate::catalog::manifest::FILES_DIR)
            .join(path)
    }
}

impl ContentProvider for TemplateDir {
    fn read(&self, module_id: &str, path: &str) -> Result<Vec<u8>, ContentError> {
        let file = self.file_path(module_id, path);
        std::fs::read(&file).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ContentError::NotFound {
                    module: module_id.to_string(),
                    path: path.to_string(),
                }
            } else {
                ContentError::Io { path: file, source }
            }
        })
    }
}

/// In-memory content, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    files: HashMap<(String, String), Vec<u8>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, module_id: &str, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.insert(module_id, path, content);
        self
    }

    pub fn insert(&mut self, module_id: &str, path: &str, content: impl AsRef<[u8]>) {
        self.files.insert(
            (module_id.to_string(), path.to_string()),
            content.as_ref().to_vec(),
        );
    }
}

impl ContentProvider for MemoryProvider {
    fn read(&self, module_id: &str, path: &str) -> Result<Vec<u8>, ContentError> {
        self.files
            .get(&(module_id.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| ContentError::NotFound {
                module: module_id.to_string(),
                path: path.to_string(),
            })
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}|\[([A-Z][A-Z0-9_]*)\]|__([A-Z][A-Z0-9_]*?)__")
        .expect("PLACEHOLDER regex is valid")
});

/// Replace `{{VAR}}`, `[VAR]` and `__VAR__` with context values in one pass.
///
/// Unknown variables are left as written, and substituted values are never
/// expanded again.
pub fn substitute(content: &str, context: &Context) -> String {
    PLACEHOLDER
        .replace_all(content, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match context.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Compose every planned path, in path order; the first failure aborts
pub fn compose(
    plan: &MergePlan,
    provider: &dyn ContentProvider,
    context: &Context,
) -> Result<FileSet, ComposeError> {
    let mut files = FileSet::new();
    for (path, entry) in plan.iter() {
        let content = compose_path(path, entry, provider, context)?;
        files.insert(path.clone(), content);
    }
    info!(files = files.len(), "composed project files");
    Ok(files)
}

/// Like [`compose`], with one blocking task per path.
///
/// When several paths fail, the error for the smallest path is returned, so
/// the outcome matches [`compose`].
pub async fn compose_concurrent(
    plan: Arc<MergePlan>,
    provider: Arc<dyn ContentProvider>,
    context: Arc<Context>,
) -> Result<FileSet, ComposeError> {
    let mut tasks = JoinSet::new();
    for (path, entry) in plan.iter() {
        let path = path.clone();
        let entry = entry.clone();
        let provider = Arc::clone(&provider);
        let context = Arc::clone(&context);
        tasks.spawn_blocking(move || {
            let result = compose_path(&path, &entry, provider.as_ref(), &context);
            (path, result)
        });
    }

    let mut results = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (path, result) = joined?;
        results.insert(path, result);
    }

    let mut files = FileSet::new();
    for (path, result) in results {
        files.insert(path, result?);
    }
    info!(files = files.len(), "composed project files");
    Ok(files)
}

fn compose_path(
    path: &str,
    entry: &PlanEntry,
    provider: &dyn ContentProvider,
    context: &Context,
) -> Result<Vec<u8>, ComposeError> {
    if entry.strategy == MergeStrategy::Replace {
        return replace_path(path, entry, provider, context);
    }

    let mut contributions = Vec::with_capacity(entry.contributors.len());
    for contributor in &entry.contributors {
        let text = read_text(provider, contributor)?;
        let content = if contributor.is_template {
            substitute(&text, context)
        } else {
            text
        };
        contributions.push(Contribution::new(contributor.module_id.clone(), content));
    }

    debug!(path, strategy = %entry.strategy, "merging");
    merge::apply(entry.strategy, path, &contributions)
        .map(String::into_bytes)
        .map_err(|source| ComposeError::Merge {
            path: path.to_string(),
            source,
        })
}

/// `replace` never parses contents: non-template files pass through as bytes
fn replace_path(
    path: &str,
    entry: &PlanEntry,
    provider: &dyn ContentProvider,
    context: &Context,
) -> Result<Vec<u8>, ComposeError> {
    let mut contents = Vec::with_capacity(entry.contributors.len());
    for contributor in &entry.contributors {
        let content = if contributor.is_template {
            substitute(&read_text(provider, contributor)?, context).into_bytes()
        } else {
            provider.read(&contributor.module_id, &contributor.path)?
        };
        contents.push(content);
    }

    if entry.source == StrategySource::Fallback {
        if let Some(first) = contents.first() {
            if contents.iter().any(|c| c != first) {
                return Err(ComposeError::MergeStrategyConflict {
                    path: path.to_string(),
                    modules: entry.contributors.iter().map(|c| c.module_id.clone()).collect(),
                });
            }
        }
    }

    debug!(path, "taking last contributor");
    Ok(contents.pop().unwrap_or_default())
}

fn read_text(provider: &dyn ContentProvider, contributor: &Contributor) -> Result<String, ContentError> {
    let raw = provider.read(&contributor.module_id, &contributor.path)?;
    String::from_utf8(raw).map_err(|_| ContentError::NotUtf8 {
        module: contributor.module_id.clone(),
        path: contributor.path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, FileEntry, ModuleDescriptor};
    use crate::planner::plan;

    fn context() -> Context {
        Context::from([
            ("PROJECT_NAME".to_string(), "My App".to_string()),
            ("PACKAGE_NAME".to_string(), "my-app".to_string()),
        ])
    }

    fn text(files: &FileSet, path: &str) -> String {
        String::from_utf8(files[path].clone()).unwrap()
    }

    fn module(id: &str, files: &[(&str, bool)]) -> Arc<ModuleDescriptor> {
        let mut m = ModuleDescriptor::new(id, Category::Other);
        m.file_manifest = files.iter().map(|(p, t)| FileEntry::new(*p, *t)).collect();
        Arc::new(m)
    }

    #[test]
    fn test_substitute_all_forms() {
        let out = substitute(
            "{{PROJECT_NAME}} / {{ PACKAGE_NAME }} / [PACKAGE_NAME] / __PACKAGE_NAME__",
            &context(),
        );
        assert_eq!(out, "My App / my-app / my-app / my-app");
    }

    #[test]
    fn test_substitute_leaves_unknown_and_lowercase_alone() {
        let out = substitute("{{AUTHOR}} [x] __init__ arr[0] [MISSING]", &context());
        assert_eq!(out, "{{AUTHOR}} [x] __init__ arr[0] [MISSING]");
    }

    #[test]
    fn test_substitute_is_single_pass() {
        let ctx = Context::from([
            ("A".to_string(), "{{B}}".to_string()),
            ("B".to_string(), "nope".to_string()),
        ]);
        assert_eq!(substitute("{{A}}", &ctx), "{{B}}");
    }

    #[test]
    fn test_compose_merges_and_substitutes() {
        let modules = vec![
            module("vue-base", &[("package.json", true), ("logo.txt", false)]),
            module("vuetify", &[("package.json", true)]),
        ];
        let provider = MemoryProvider::new()
            .with("vue-base", "package.json", r#"{"name":"{{PACKAGE_NAME}}","dependencies":{"vue":"^3"}}"#)
            .with("vue-base", "logo.txt", "{{PROJECT_NAME}}")
            .with("vuetify", "package.json", r#"{"dependencies":{"vuetify":"^3"}}"#);

        let files = compose(&plan(&modules), &provider, &context()).unwrap();
        let package: serde_json::Value = serde_json::from_slice(&files["package.json"]).unwrap();
        assert_eq!(package["name"], "my-app");
        assert_eq!(package["dependencies"]["vue"], "^3");
        assert_eq!(package["dependencies"]["vuetify"], "^3");
        assert_eq!(text(&files, "logo.txt"), "{{PROJECT_NAME}}");
    }

    #[test]
    fn test_fallback_conflict_is_reported() {
        let modules = vec![
            module("a", &[("src/App.vue", true)]),
            module("b", &[("src/App.vue", true)]),
        ];
        let provider = MemoryProvider::new()
            .with("a", "src/App.vue", "<template>A</template>")
            .with("b", "src/App.vue", "<template>B</template>");

        let err = compose(&plan(&modules), &provider, &context()).unwrap_err();
        match err {
            ComposeError::MergeStrategyConflict { path, modules } => {
                assert_eq!(path, "src/App.vue");
                assert_eq!(modules, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_identical_fallback_contents_are_fine() {
        let modules = vec![
            module("a", &[("LICENSE", true)]),
            module("b", &[("LICENSE", true)]),
        ];
        let provider = MemoryProvider::new()
            .with("a", "LICENSE", "MIT {{PROJECT_NAME}}")
            .with("b", "LICENSE", "MIT {{PROJECT_NAME}}");
        let files = compose(&plan(&modules), &provider, &context()).unwrap();
        assert_eq!(text(&files, "LICENSE"), "MIT My App");
    }

    #[test]
    fn test_missing_content_fails_whole_composition() {
        let modules = vec![module("a", &[("a.txt", true), ("b.txt", true)])];
        let provider = MemoryProvider::new().with("a", "a.txt", "a");
        let err = compose(&plan(&modules), &provider, &context()).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Content(ContentError::NotFound { ref path, .. }) if path == "b.txt"
        ));
    }

    #[test]
    fn test_compose_is_idempotent() {
        let modules = vec![
            module("a", &[(".gitignore", true), ("package.json", true)]),
            module("b", &[(".gitignore", true), ("package.json", true)]),
        ];
        let provider = |module: &str, path: &str| -> Result<Vec<u8>, ContentError> {
            Ok(match path {
                "package.json" => format!(r#"{{"{module}": true}}"#),
                _ => format!("node_modules\n{module}\n"),
            }
            .into_bytes())
        };
        let plan = plan(&modules);
        let first = compose(&plan, &provider, &context()).unwrap();
        let second = compose(&plan, &provider, &context()).unwrap();
        assert_eq!(first, second);
        assert_eq!(text(&first, ".gitignore"), "node_modules\na\n\nb\n");
    }

    #[test]
    fn test_template_dir_reads_module_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vue-base").join("files").join("src");
        std::fs::create_dir_all(&file).unwrap();
        std::fs::write(file.join("main.ts"), "createApp(App)\n").unwrap();

        let provider = TemplateDir::new(dir.path());
        assert_eq!(provider.read("vue-base", "src/main.ts").unwrap(), b"createApp(App)\n");
        assert!(matches!(
            provider.read("vue-base", "missing.ts"),
            Err(ContentError::NotFound { .. })
        ));
    }

    #[test]
    fn test_binary_assets_pass_through_untouched() {
        const PNG: &[u8] = &[0x89, 0x50, 0x4e, 0x47, 0xff, 0xfe, 0x00];
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("a").join("files");
        std::fs::create_dir_all(&files).unwrap();
        std::fs::write(files.join("logo.png"), PNG).unwrap();
        std::fs::write(files.join("README.md"), "# {{PROJECT_NAME}}\n").unwrap();

        let modules = vec![module("a", &[("logo.png", false), ("README.md", true)])];
        let out = compose(&plan(&modules), &TemplateDir::new(dir.path()), &context()).unwrap();
        assert_eq!(out["logo.png"], PNG);
        assert_eq!(text(&out, "README.md"), "# My App\n");
    }

    #[test]
    fn test_identical_binary_assets_from_two_modules() {
        let png: &[u8] = &[0x89, 0x50, 0xff, 0x00];
        let modules = vec![
            module("a", &[("public/favicon.ico", false)]),
            module("b", &[("public/favicon.ico", false)]),
        ];
        let provider = MemoryProvider::new()
            .with("a", "public/favicon.ico", png)
            .with("b", "public/favicon.ico", png);
        let out = compose(&plan(&modules), &provider, &context()).unwrap();
        assert_eq!(out["public/favicon.ico"], png);

        let differing = MemoryProvider::new()
            .with("a", "public/favicon.ico", png)
            .with("b", "public/favicon.ico", [0xffu8, 0xfe]);
        assert!(matches!(
            compose(&plan(&modules), &differing, &context()),
            Err(ComposeError::MergeStrategyConflict { .. })
        ));
    }

    #[test]
    fn test_binary_content_in_a_merged_path_is_rejected() {
        let modules = vec![
            module("a", &[("package.json", false)]),
            module("b", &[("package.json", false)]),
        ];
        let provider = MemoryProvider::new()
            .with("a", "package.json", "{}")
            .with("b", "package.json", [0xffu8, 0xfe]);
        let err = compose(&plan(&modules), &provider, &context()).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Content(ContentError::NotUtf8 { ref module, .. }) if module == "b"
        ));
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let modules = vec![
            module("a", &[("package.json", true), ("a.txt", true), (".gitignore", true)]),
            module("b", &[("package.json", true), ("b.txt", true), (".gitignore", true)]),
        ];
        let provider = MemoryProvider::new()
            .with("a", "package.json", r#"{"name":"{{PACKAGE_NAME}}"}"#)
            .with("b", "package.json", r#"{"private":true}"#)
            .with("a", "a.txt", "A")
            .with("b", "b.txt", "B")
            .with("a", ".gitignore", "dist\n")
            .with("b", ".gitignore", "dist\n.env\n");
        let plan = plan(&modules);

        let sequential = compose(&plan, &provider, &context()).unwrap();
        let concurrent = compose_concurrent(Arc::new(plan), Arc::new(provider), Arc::new(context()))
            .await
            .unwrap();
        assert_eq!(sequential, concurrent);
    }

    #[tokio::test]
    async fn test_concurrent_reports_smallest_failing_path() {
        let modules = vec![module("a", &[("z.txt", true), ("m.txt", true), ("b.txt", true)])];
        let provider = MemoryProvider::new().with("a", "b.txt", "ok");
        let err = compose_concurrent(Arc::new(plan(&modules)), Arc::new(provider), Arc::new(context()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Content(ContentError::NotFound { ref path, .. }) if path == "m.txt"
        ));
    }
}
