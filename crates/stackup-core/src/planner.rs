//! Merge planning: decide, for every output path, which modules contribute
//! and how their contributions are combined.

use crate::catalog::ModuleDescriptor;
use crate::merge::MergeStrategy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// One module's contribution to an output path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub module_id: String,
    /// Path within the module's template files
    pub path: String,
    pub is_template: bool,
}

/// Why a strategy was chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StrategySource {
    /// Only one module contributes the path
    Single,
    /// A module's `mergeOverrides` pattern matched
    Override { module: String, pattern: String },
    /// The built-in path rule table matched
    Default,
    /// Nothing matched
    Fallback,
}

/// Plan for one output path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub strategy: MergeStrategy,
    pub source: StrategySource,
    /// In resolution order, which is merge precedence
    pub contributors: Vec<Contributor>,
}

/// Output path to plan entry, ordered by path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MergePlan {
    entries: BTreeMap<String, PlanEntry>,
}

impl MergePlan {
    pub fn get(&self, path: &str) -> Option<&PlanEntry> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PlanEntry)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths with more than one contributor
    pub fn shared_paths(&self) -> impl Iterator<Item = (&String, &PlanEntry)> {
        self.entries.iter().filter(|(_, e)| e.contributors.len() > 1)
    }
}

/// Path predicate used by the default rule table
type Predicate = fn(&str) -> bool;

/// Default strategies for shared paths, first match wins
const DEFAULT_RULES: &[(Predicate, MergeStrategy)] = &[
    (is_json_manifest, MergeStrategy::MergeJson),
    (is_line_list, MergeStrategy::AppendUnique),
    (is_readme, MergeStrategy::Replace),
    (is_router, MergeStrategy::MergeRoutes),
    (is_store, MergeStrategy::MergeStores),
    (is_entry, MergeStrategy::MergeEntry),
    (is_eslint_config, MergeStrategy::MergeEslint),
    (is_vite_config, MergeStrategy::MergeViteConfig),
];

/// Build the merge plan for modules in resolution order
pub fn plan(modules: &[Arc<ModuleDescriptor>]) -> MergePlan {
    let mut contributions: BTreeMap<String, Vec<(&ModuleDescriptor, Contributor)>> = BTreeMap::new();
    for module in modules {
        for file in &module.file_manifest {
            let path = normalize(&file.path);
            let contributors = contributions.entry(path).or_default();
            // A module listing the same path twice contributes once
            if contributors.iter().any(|(m, _)| m.id == module.id) {
                continue;
            }
            contributors.push((
                module.as_ref(),
                Contributor {
                    module_id: module.id.clone(),
                    path: file.path.clone(),
                    is_template: file.is_template,
                },
            ));
        }
    }

    let entries = contributions
        .into_iter()
        .map(|(path, contributors)| {
            let (strategy, source) = choose_strategy(&path, &contributors);
            debug!(path = %path, strategy = %strategy, contributors = contributors.len(), "planned path");
            let entry = PlanEntry {
                strategy,
                source,
                contributors: contributors.into_iter().map(|(_, c)| c).collect(),
            };
            (path, entry)
        })
        .collect();

    MergePlan { entries }
}

fn choose_strategy(
    path: &str,
    contributors: &[(&ModuleDescriptor, Contributor)],
) -> (MergeStrategy, StrategySource) {
    if contributors.len() == 1 {
        return (MergeStrategy::Replace, StrategySource::Single);
    }

    for (module, _) in contributors {
        if let Some(o) = module
            .merge_overrides
            .iter()
            .find(|o| glob_match(&o.pattern, path))
        {
            return (
                o.strategy,
                StrategySource::Override {
                    module: module.id.clone(),
                    pattern: o.pattern.clone(),
                },
            );
        }
    }

    match default_strategy(path) {
        Some(strategy) => (strategy, StrategySource::Default),
        None => (MergeStrategy::Replace, StrategySource::Fallback),
    }
}

/// Strategy from the built-in rule table, if any rule matches
pub fn default_strategy(path: &str) -> Option<MergeStrategy> {
    DEFAULT_RULES
        .iter()
        .find(|(predicate, _)| predicate(path))
        .map(|(_, strategy)| *strategy)
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Path segments, with the file's extension stripped from the last one
fn segment_stems(path: &str) -> impl Iterator<Item = &str> {
    let file = basename(path);
    let stem = file.split('.').next().unwrap_or(file);
    path.split('/')
        .take(path.split('/').count().saturating_sub(1))
        .chain(std::iter::once(stem))
}

fn is_json_manifest(path: &str) -> bool {
    matches!(basename(path), "package.json" | "tsconfig.json")
}

fn is_line_list(path: &str) -> bool {
    matches!(basename(path), ".gitignore" | ".env.example")
}

fn is_readme(path: &str) -> bool {
    basename(path) == "README.md"
}

fn is_router(path: &str) -> bool {
    segment_stems(path).any(|s| s == "router")
}

fn is_store(path: &str) -> bool {
    segment_stems(path).any(|s| s == "store" || s == "stores")
}

fn is_entry(path: &str) -> bool {
    basename(path).starts_with("main.")
}

fn is_eslint_config(path: &str) -> bool {
    basename(path).starts_with(".eslintrc")
}

fn is_vite_config(path: &str) -> bool {
    basename(path).starts_with("vite.config.")
}

/// Match a `/`-separated path against a glob.
///
/// `*` matches within a segment, `**` matches any number of segments and `?`
/// matches one character. Patterns without a `/` match the basename.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern = pattern.trim_start_matches("./");
    if !pattern.contains('/') {
        return match_segment(pattern.as_bytes(), basename(path).as_bytes());
    }
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    match_segments(&pattern_segments, &path_segments)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| match_segments(rest, &path[skip..])),
        Some((first, rest)) => match path.split_first() {
            Some((segment, path_rest)) => {
                match_segment(first.as_bytes(), segment.as_bytes()) && match_segments(rest, path_rest)
            }
            None => false,
        },
    }
}

fn match_segment(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.split_first(), text.split_first()) {
        (None, None) => true,
        (Some((&b'*', rest)), _) => {
            (0..=text.len()).any(|skip| match_segment(rest, &text[skip..]))
        }
        (Some((&b'?', rest)), Some((_, text_rest))) => match_segment(rest, text_rest),
        (Some((p, rest)), Some((t, text_rest))) => p == t && match_segment(rest, text_rest),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, FileEntry, MergeOverride};

    fn module(id: &str, files: &[&str]) -> ModuleDescriptor {
        let mut m = ModuleDescriptor::new(id, Category::Other);
        m.file_manifest = files.iter().map(|f| FileEntry::new(*f, true)).collect();
        m
    }

    fn arcs(modules: Vec<ModuleDescriptor>) -> Vec<Arc<ModuleDescriptor>> {
        modules.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn test_single_contributor_is_replace() {
        let plan = plan(&arcs(vec![
            module("a", &["package.json", "src/main.ts"]),
            module("b", &["src/b.ts"]),
        ]));
        for (_, entry) in plan.iter() {
            assert_eq!(entry.strategy, MergeStrategy::Replace);
            assert_eq!(entry.source, StrategySource::Single);
            assert_eq!(entry.contributors.len(), 1);
        }
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_default_rules_for_shared_paths() {
        let files = [
            "package.json",
            "tsconfig.json",
            ".gitignore",
            ".env.example",
            "README.md",
            "src/router/index.ts",
            "src/router.ts",
            "src/stores/index.ts",
            "src/main.ts",
            ".eslintrc.cjs",
            "vite.config.ts",
            "src/App.vue",
        ];
        let plan = plan(&arcs(vec![module("a", &files), module("b", &files)]));
        let strategy = |p: &str| plan.get(p).unwrap().strategy;

        assert_eq!(strategy("package.json"), MergeStrategy::MergeJson);
        assert_eq!(strategy("tsconfig.json"), MergeStrategy::MergeJson);
        assert_eq!(strategy(".gitignore"), MergeStrategy::AppendUnique);
        assert_eq!(strategy(".env.example"), MergeStrategy::AppendUnique);
        assert_eq!(strategy("README.md"), MergeStrategy::Replace);
        assert_eq!(strategy("src/router/index.ts"), MergeStrategy::MergeRoutes);
        assert_eq!(strategy("src/router.ts"), MergeStrategy::MergeRoutes);
        assert_eq!(strategy("src/stores/index.ts"), MergeStrategy::MergeStores);
        assert_eq!(strategy("src/main.ts"), MergeStrategy::MergeEntry);
        assert_eq!(strategy(".eslintrc.cjs"), MergeStrategy::MergeEslint);
        assert_eq!(strategy("vite.config.ts"), MergeStrategy::MergeViteConfig);
        assert_eq!(strategy("src/App.vue"), MergeStrategy::Replace);

        assert_eq!(plan.get("README.md").unwrap().source, StrategySource::Default);
        assert_eq!(plan.get("src/App.vue").unwrap().source, StrategySource::Fallback);
    }

    #[test]
    fn test_contributors_keep_resolution_order() {
        let plan = plan(&arcs(vec![
            module("vue-base", &["package.json"]),
            module("vuetify", &["package.json"]),
            module("pinia", &["./package.json"]),
        ]));
        let entry = plan.get("package.json").unwrap();
        let ids: Vec<_> = entry.contributors.iter().map(|c| c.module_id.as_str()).collect();
        assert_eq!(ids, vec!["vue-base", "vuetify", "pinia"]);
        assert_eq!(entry.contributors[2].path, "./package.json");
    }

    #[test]
    fn test_override_beats_default_and_earliest_module_wins() {
        let mut a = module("a", &["src/main.ts"]);
        a.merge_overrides = vec![MergeOverride {
            pattern: "src/*.ts".into(),
            strategy: MergeStrategy::Append,
        }];
        let mut b = module("b", &["src/main.ts"]);
        b.merge_overrides = vec![MergeOverride {
            pattern: "main.*".into(),
            strategy: MergeStrategy::Replace,
        }];

        let plan = plan(&arcs(vec![a, b]));
        let entry = plan.get("src/main.ts").unwrap();
        assert_eq!(entry.strategy, MergeStrategy::Append);
        assert_eq!(
            entry.source,
            StrategySource::Override {
                module: "a".into(),
                pattern: "src/*.ts".into()
            }
        );
    }

    #[test]
    fn test_override_ignored_for_single_contributor() {
        let mut a = module("a", &["styles.css"]);
        a.merge_overrides = vec![MergeOverride {
            pattern: "*.css".into(),
            strategy: MergeStrategy::Append,
        }];
        let plan = plan(&arcs(vec![a]));
        assert_eq!(plan.get("styles.css").unwrap().strategy, MergeStrategy::Replace);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.json", "config/app.json"));
        assert!(glob_match("src/*.ts", "src/main.ts"));
        assert!(!glob_match("src/*.ts", "src/router/index.ts"));
        assert!(glob_match("src/**/*.ts", "src/router/index.ts"));
        assert!(glob_match("src/**/*.ts", "src/main.ts"));
        assert!(glob_match("**/router/**", "src/router/index.ts"));
        assert!(glob_match("vite.config.?s", "vite.config.ts"));
        assert!(!glob_match("vite.config.?s", "vite.config.mjs"));
        assert!(glob_match("./src/*", "src/App.vue"));
        assert!(!glob_match("lib/**", "src/lib/a.ts"));
    }

    #[test]
    fn test_planning_is_deterministic() {
        let modules = arcs(vec![
            module("a", &["b.txt", "a.txt", "package.json"]),
            module("b", &["package.json", "c.txt"]),
        ]);
        assert_eq!(plan(&modules), plan(&modules));
        let paths: Vec<_> = plan(&modules).paths().map(String::from).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt", "c.txt", "package.json"]);
    }
}
