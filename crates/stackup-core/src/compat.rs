//! Compatibility checks between a candidate module and a proposed selection
//!
//! Every module runs the base rules. Categories can add their own rules via
//! [`category_rules`]; all results are unioned into one report.

use crate::catalog::{Category, ModuleDescriptor};
use serde::Serialize;
use std::sync::Arc;

/// A resolution problem. Everything except `RecommendedMissing` is blocking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, thiserror::Error)]
#[serde(tag = "kind")]
pub enum Issue {
    #[error("Unknown module id '{id}'")]
    UnknownModuleId { id: String },

    #[error("'{module}' requires '{capability}', but no selected module provides it")]
    MissingRequirement { module: String, capability: String },

    #[error("'{module}' is incompatible with '{other}'")]
    IncompatiblePair { module: String, other: String },

    #[error("'{module}' and '{other}' are both {category} modules; only one may be selected")]
    MultipleExclusiveProviders {
        module: String,
        other: String,
        category: Category,
    },

    #[error("'{module}' does not support the '{framework}' frontend framework")]
    IncompatibleFramework { module: String, framework: String },

    #[error(
        "Unresolvable requirement cycle between {} (capabilities: {})",
        .modules.join(", "),
        .capabilities.join(", ")
    )]
    UnresolvableCycle {
        modules: Vec<String>,
        capabilities: Vec<String>,
    },

    #[error("'{module}' recommends '{recommended}', which is not selected")]
    RecommendedMissing { module: String, recommended: String },
}

impl Issue {
    /// Stable tag, identical to the serialized `kind`
    pub fn kind(&self) -> &'static str {
        match self {
            Issue::UnknownModuleId { .. } => "UnknownModuleId",
            Issue::MissingRequirement { .. } => "MissingRequirement",
            Issue::IncompatiblePair { .. } => "IncompatiblePair",
            Issue::MultipleExclusiveProviders { .. } => "MultipleExclusiveProviders",
            Issue::IncompatibleFramework { .. } => "IncompatibleFramework",
            Issue::UnresolvableCycle { .. } => "UnresolvableCycle",
            Issue::RecommendedMissing { .. } => "RecommendedMissing",
        }
    }

    pub fn is_blocking(&self) -> bool {
        !matches!(self, Issue::RecommendedMissing { .. })
    }

    /// Whether the issue names the given module id
    pub fn involves(&self, id: &str) -> bool {
        match self {
            Issue::UnknownModuleId { id: other } => other == id,
            Issue::MissingRequirement { module, .. } => module == id,
            Issue::IncompatiblePair { module, other }
            | Issue::MultipleExclusiveProviders { module, other, .. } => module == id || other == id,
            Issue::IncompatibleFramework { module, framework } => module == id || framework == id,
            Issue::UnresolvableCycle { modules, .. } => modules.iter().any(|m| m == id),
            Issue::RecommendedMissing {
                module,
                recommended,
            } => module == id || recommended == id,
        }
    }
}

/// Blocking issues and advisory warnings for one check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatibilityReport {
    pub issues: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl CompatibilityReport {
    /// Route an issue to `issues` or `warnings`, skipping exact duplicates
    pub fn push(&mut self, issue: Issue) {
        let bucket = if issue.is_blocking() {
            &mut self.issues
        } else {
            &mut self.warnings
        };
        if !bucket.contains(&issue) {
            bucket.push(issue);
        }
    }

    pub fn extend(&mut self, other: CompatibilityReport) {
        for issue in other.issues.into_iter().chain(other.warnings) {
            self.push(issue);
        }
    }

    pub fn is_compatible(&self) -> bool {
        self.issues.is_empty()
    }

    /// Capabilities reported as missing, sorted and de-duplicated
    pub fn missing_capabilities(&self) -> Vec<String> {
        let mut caps: Vec<String> = self
            .issues
            .iter()
            .filter_map(|issue| match issue {
                Issue::MissingRequirement { capability, .. } => Some(capability.clone()),
                _ => None,
            })
            .collect();
        caps.sort();
        caps.dedup();
        caps
    }
}

/// A single compatibility rule
pub type Rule = fn(&ModuleDescriptor, &[Arc<ModuleDescriptor>], &mut CompatibilityReport);

/// Rules every module is checked against
const BASE_RULES: &[Rule] = &[
    incompatible_pairs,
    missing_requirements,
    recommended_modules,
    exclusive_category,
];

const FRAMEWORK_RULES: &[Rule] = &[framework_support];

/// Extra rules contributed by a module's category
pub fn category_rules(category: Category) -> &'static [Rule] {
    match category {
        Category::UiLibrary | Category::AuthProvider => FRAMEWORK_RULES,
        Category::FrontendFramework
        | Category::BackendFramework
        | Category::BackendService
        | Category::Other => &[],
    }
}

/// Check one candidate against the proposed selection.
///
/// The candidate may itself be part of `proposed`; it is never compared with
/// itself.
pub fn check(candidate: &ModuleDescriptor, proposed: &[Arc<ModuleDescriptor>]) -> CompatibilityReport {
    let mut report = CompatibilityReport::default();
    for rule in BASE_RULES
        .iter()
        .chain(category_rules(candidate.category).iter())
    {
        rule(candidate, proposed, &mut report);
    }
    report
}

/// Check every member of a selection against the whole selection
pub fn check_all(proposed: &[Arc<ModuleDescriptor>]) -> CompatibilityReport {
    let mut report = CompatibilityReport::default();
    for candidate in proposed {
        report.extend(check(candidate, proposed));
    }
    report
}

fn others<'a>(
    candidate: &'a ModuleDescriptor,
    proposed: &'a [Arc<ModuleDescriptor>],
) -> impl Iterator<Item = &'a Arc<ModuleDescriptor>> + 'a {
    proposed.iter().filter(move |m| m.id != candidate.id)
}

fn incompatible_pairs(
    candidate: &ModuleDescriptor,
    proposed: &[Arc<ModuleDescriptor>],
    report: &mut CompatibilityReport,
) {
    for other in others(candidate, proposed) {
        if candidate.incompatible_with.contains(&other.id) {
            report.push(Issue::IncompatiblePair {
                module: candidate.id.clone(),
                other: other.id.clone(),
            });
        }
    }
}

fn missing_requirements(
    candidate: &ModuleDescriptor,
    proposed: &[Arc<ModuleDescriptor>],
    report: &mut CompatibilityReport,
) {
    for capability in &candidate.requires {
        if !others(candidate, proposed).any(|m| m.satisfies(capability)) {
            report.push(Issue::MissingRequirement {
                module: candidate.id.clone(),
                capability: capability.clone(),
            });
        }
    }
}

fn recommended_modules(
    candidate: &ModuleDescriptor,
    proposed: &[Arc<ModuleDescriptor>],
    report: &mut CompatibilityReport,
) {
    for recommended in &candidate.compatible_with {
        if !proposed.iter().any(|m| &m.id == recommended) {
            report.push(Issue::RecommendedMissing {
                module: candidate.id.clone(),
                recommended: recommended.clone(),
            });
        }
    }
}

fn exclusive_category(
    candidate: &ModuleDescriptor,
    proposed: &[Arc<ModuleDescriptor>],
    report: &mut CompatibilityReport,
) {
    if !candidate.exclusive_category {
        return;
    }
    for other in others(candidate, proposed) {
        if other.category == candidate.category {
            // One issue per unordered pair
            let (module, other) = if candidate.id < other.id {
                (candidate.id.clone(), other.id.clone())
            } else {
                (other.id.clone(), candidate.id.clone())
            };
            report.push(Issue::MultipleExclusiveProviders {
                module,
                other,
                category: candidate.category,
            });
        }
    }
}

fn framework_support(
    candidate: &ModuleDescriptor,
    proposed: &[Arc<ModuleDescriptor>],
    report: &mut CompatibilityReport,
) {
    if candidate.frameworks.is_empty() {
        return;
    }
    for framework in others(candidate, proposed)
        .filter(|m| m.category == Category::FrontendFramework)
    {
        if !candidate.frameworks.contains(&framework.id) {
            report.push(Issue::IncompatibleFramework {
                module: candidate.id.clone(),
                framework: framework.id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str, category: Category) -> ModuleDescriptor {
        ModuleDescriptor::new(id, category)
    }

    fn set(items: &[&str]) -> std::collections::BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn vue() -> ModuleDescriptor {
        let mut m = module("vue-base", Category::FrontendFramework);
        m.provides = set(&["frontend"]);
        m.exclusive_category = true;
        m
    }

    fn react() -> ModuleDescriptor {
        let mut m = module("react-base", Category::FrontendFramework);
        m.provides = set(&["frontend"]);
        m.exclusive_category = true;
        m
    }

    fn vuetify() -> ModuleDescriptor {
        let mut m = module("vuetify", Category::UiLibrary);
        m.requires = set(&["frontend"]);
        m.frameworks = set(&["vue-base"]);
        m
    }

    fn arcs(modules: Vec<ModuleDescriptor>) -> Vec<Arc<ModuleDescriptor>> {
        modules.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn test_satisfied_requirement_is_compatible() {
        let selection = arcs(vec![vue(), vuetify()]);
        let report = check_all(&selection);
        assert!(report.is_compatible(), "{:?}", report);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_requirement() {
        let selection = arcs(vec![vuetify()]);
        let report = check(&selection[0], &selection);
        assert_eq!(
            report.issues,
            vec![Issue::MissingRequirement {
                module: "vuetify".into(),
                capability: "frontend".into()
            }]
        );
        assert_eq!(report.missing_capabilities(), vec!["frontend".to_string()]);
    }

    #[test]
    fn test_own_provides_do_not_satisfy_requirement() {
        let mut m = module("loopy", Category::Other);
        m.provides = set(&["x"]);
        m.requires = set(&["x"]);
        let selection = arcs(vec![m]);
        assert!(!check_all(&selection).is_compatible());
    }

    #[test]
    fn test_category_name_satisfies_requirement() {
        let mut m = module("charts", Category::Other);
        m.requires = set(&["frontend-framework"]);
        let selection = arcs(vec![vue(), m]);
        assert!(check_all(&selection).is_compatible());
    }

    #[test]
    fn test_incompatible_pair() {
        let mut firebase = module("firebase", Category::BackendService);
        firebase.incompatible_with = set(&["supabase"]);
        let selection = arcs(vec![firebase, module("supabase", Category::BackendService)]);
        let report = check_all(&selection);
        assert_eq!(
            report.issues,
            vec![Issue::IncompatiblePair {
                module: "firebase".into(),
                other: "supabase".into()
            }]
        );
    }

    #[test]
    fn test_exclusive_category_reported_once_per_pair() {
        let selection = arcs(vec![vue(), react()]);
        let report = check_all(&selection);
        assert_eq!(
            report.issues,
            vec![Issue::MultipleExclusiveProviders {
                module: "react-base".into(),
                other: "vue-base".into(),
                category: Category::FrontendFramework,
            }]
        );
    }

    #[test]
    fn test_recommended_missing_is_warning() {
        let mut auth = module("supabase-auth", Category::AuthProvider);
        auth.compatible_with = set(&["supabase"]);
        let selection = arcs(vec![auth]);
        let report = check_all(&selection);
        assert!(report.is_compatible());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind(), "RecommendedMissing");
        assert!(!report.warnings[0].is_blocking());
    }

    #[test]
    fn test_ui_library_framework_rule() {
        let selection = arcs(vec![react(), vuetify()]);
        let report = check_all(&selection);
        assert_eq!(
            report.issues,
            vec![Issue::IncompatibleFramework {
                module: "vuetify".into(),
                framework: "react-base".into()
            }]
        );
    }

    #[test]
    fn test_framework_rule_only_for_extended_categories() {
        let mut other = module("plugin", Category::Other);
        other.frameworks = set(&["vue-base"]);
        let selection = arcs(vec![react(), other]);
        assert!(check_all(&selection).is_compatible());
    }

    #[test]
    fn test_issue_serializes_with_kind_tag() {
        let issue = Issue::MissingRequirement {
            module: "vuetify".into(),
            capability: "frontend".into(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "MissingRequirement");
        assert_eq!(json["capability"], "frontend");
        assert_eq!(issue.kind(), "MissingRequirement");
    }
}
