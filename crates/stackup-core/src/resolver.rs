//! Dependency resolution
//!
//! Turns a requested list of module ids into a complete, conflict-free,
//! dependency-ordered module set, or a complete list of problems.
//!
//! Resolution is a fixed-point iteration: each pass checks the current
//! selection and, when auto-resolve is on, adds one provider per missing
//! capability. Every pass that makes progress adds a catalog module not yet
//! selected, so the loop stops after fewer passes than the catalog has
//! modules. Requirement cycles surface while ordering the final selection.

use crate::catalog::{Catalog, ModuleDescriptor};
use crate::compat::{self, CompatibilityReport, Issue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Options for a resolution run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Add providers for missing capabilities automatically
    pub auto_resolve: bool,
    /// Downgrade blocking issues to warnings
    pub allow_conflicts: bool,
}

/// Outcome of a resolution run. Never mutated after it is returned.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionResult {
    pub success: bool,
    /// Providers before dependents; empty unless `success`
    pub modules: Vec<Arc<ModuleDescriptor>>,
    /// Ids added by auto-resolve, in the order they were added
    pub added: Vec<String>,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ResolutionResult {
    fn failed(errors: Vec<Issue>, added: Vec<String>, warnings: Vec<Issue>) -> Self {
        Self {
            success: false,
            modules: Vec::new(),
            added,
            errors,
            warnings,
        }
    }

    pub fn module_ids(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.id.as_str()).collect()
    }
}

/// Resolves module selections against a catalog
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Resolve a selection of module ids
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S], options: ResolveOptions) -> ResolutionResult {
        // Unknown ids short-circuit; nothing else is computed
        let mut unknown = Vec::new();
        let mut selected: Vec<Arc<ModuleDescriptor>> = Vec::new();
        for id in ids {
            let id = id.as_ref();
            match self.catalog.get(id) {
                Some(module) => {
                    if !selected.iter().any(|m| m.id == module.id) {
                        selected.push(Arc::clone(module));
                    }
                }
                None => {
                    let issue = Issue::UnknownModuleId { id: id.to_string() };
                    if !unknown.contains(&issue) {
                        unknown.push(issue);
                    }
                }
            }
        }
        if !unknown.is_empty() {
            return ResolutionResult::failed(unknown, Vec::new(), Vec::new());
        }

        let added = if options.auto_resolve {
            self.auto_resolve(&mut selected)
        } else {
            Vec::new()
        };

        // Definitive check, in a request-order independent order
        selected.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let mut report = compat::check_all(&selected);

        let (ordered, cycle) = order_modules(&selected);
        if let Some(issue) = cycle {
            report.push(issue);
        }

        let CompatibilityReport { issues, warnings } = report;

        if !issues.is_empty() && !options.allow_conflicts {
            info!(
                errors = issues.len(),
                warnings = warnings.len(),
                "resolution failed"
            );
            return ResolutionResult::failed(issues, added, warnings);
        }

        // allow_conflicts: blocking issues become warnings
        let mut all_warnings = issues;
        all_warnings.extend(warnings);

        info!(
            modules = ordered.len(),
            added = added.len(),
            warnings = all_warnings.len(),
            "resolution succeeded"
        );

        ResolutionResult {
            success: true,
            modules: ordered,
            added,
            errors: Vec::new(),
            warnings: all_warnings,
        }
    }

    /// Run the fixed-point loop and return the added ids
    fn auto_resolve(&self, selected: &mut Vec<Arc<ModuleDescriptor>>) -> Vec<String> {
        let mut tried: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut added = Vec::new();

        for pass in 0.. {
            let report = compat::check_all(selected);
            let missing = report.missing_capabilities();
            debug!(pass, missing = ?missing, "resolution pass");

            let mut progressed = false;
            for capability in missing {
                // A provider added earlier in this pass may already cover it
                if !requirement_unmet(selected, &capability) {
                    continue;
                }

                let tried_for = tried.entry(capability.clone()).or_default();
                match self.choose_provider(&capability, selected, tried_for) {
                    Some(provider) => {
                        debug!(
                            pass,
                            capability = %capability,
                            module = %provider.id,
                            "auto-resolved missing capability"
                        );
                        tried_for.insert(provider.id.clone());
                        added.push(provider.id.clone());
                        selected.push(provider);
                        progressed = true;
                    }
                    None => {
                        debug!(capability = %capability, "no provider left for capability");
                    }
                }
            }

            if !progressed {
                break;
            }
        }

        added
    }

    /// Pick a provider for a missing capability.
    ///
    /// Candidates are catalog modules satisfying the capability that are not
    /// selected, not yet tried for this capability, and do not conflict with
    /// the selection. Preference: recommended by a selected module
    /// (`compatibleWith`), then `recommendedFor` the capability, then
    /// catalog declaration order.
    fn choose_provider(
        &self,
        capability: &str,
        selected: &[Arc<ModuleDescriptor>],
        tried: &BTreeSet<String>,
    ) -> Option<Arc<ModuleDescriptor>> {
        let candidates: Vec<&Arc<ModuleDescriptor>> = self
            .catalog
            .providers_of(capability)
            .into_iter()
            .filter(|m| !tried.contains(&m.id))
            .filter(|m| !selected.iter().any(|s| s.id == m.id))
            .filter(|m| !conflicts_with(m, selected))
            .collect();

        candidates
            .iter()
            .find(|m| selected.iter().any(|s| s.compatible_with.contains(&m.id)))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|m| m.recommended_for.contains(capability))
            })
            .or_else(|| candidates.first())
            .map(|m| Arc::clone(m))
    }
}

/// Whether some selected module requires `capability` and no other selected
/// module satisfies it
fn requirement_unmet(selected: &[Arc<ModuleDescriptor>], capability: &str) -> bool {
    selected.iter().any(|m| {
        m.requires.contains(capability)
            && !selected
                .iter()
                .any(|other| other.id != m.id && other.satisfies(capability))
    })
}

/// Whether adding `candidate` would introduce a blocking issue other than its
/// own missing requirements
fn conflicts_with(candidate: &Arc<ModuleDescriptor>, selected: &[Arc<ModuleDescriptor>]) -> bool {
    let mut trial = selected.to_vec();
    trial.push(Arc::clone(candidate));
    compat::check_all(&trial).issues.iter().any(|issue| {
        !matches!(issue, Issue::MissingRequirement { .. }) && issue.involves(&candidate.id)
    })
}

/// Topologically order modules, providers before dependents.
///
/// Ready modules are taken by (category rank, id). A requires/provides cycle
/// is broken by taking the lowest-ranked remaining module, and reported.
fn order_modules(
    selected: &[Arc<ModuleDescriptor>],
) -> (Vec<Arc<ModuleDescriptor>>, Option<Issue>) {
    let n = selected.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (d, dependent) in selected.iter().enumerate() {
        for (p, provider) in selected.iter().enumerate() {
            if p == d {
                continue;
            }
            if dependent.requires.iter().any(|c| provider.satisfies(c)) {
                dependents[p].push(d);
                indegree[d] += 1;
            }
        }
    }

    let key = |i: usize| (selected[i].category.rank(), selected[i].id.clone(), i);
    let mut ready: BTreeSet<(u8, String, usize)> =
        (0..n).filter(|&i| indegree[i] == 0).map(key).collect();
    let mut done = vec![false; n];
    let mut ordered = Vec::with_capacity(n);
    let mut cycle_modules = BTreeSet::new();
    let mut cycle_capabilities = BTreeSet::new();

    while ordered.len() < n {
        let next = match ready.pop_first() {
            Some((_, _, i)) => i,
            None => {
                let members = cycle_members(selected, &dependents, &done);
                for &i in &members {
                    cycle_modules.insert(selected[i].id.clone());
                    for capability in &selected[i].requires {
                        if members
                            .iter()
                            .any(|&j| j != i && selected[j].satisfies(capability))
                        {
                            cycle_capabilities.insert(capability.clone());
                        }
                    }
                }
                let Some(forced) = (0..n).filter(|&i| !done[i]).min_by_key(|&i| key(i)) else {
                    break;
                };
                debug!(module = %selected[forced].id, "breaking requirement cycle");
                forced
            }
        };

        done[next] = true;
        ordered.push(Arc::clone(&selected[next]));
        for &d in &dependents[next] {
            if done[d] {
                continue;
            }
            indegree[d] = indegree[d].saturating_sub(1);
            if indegree[d] == 0 {
                ready.insert(key(d));
            }
        }
    }

    let issue = (!cycle_modules.is_empty()).then(|| Issue::UnresolvableCycle {
        modules: cycle_modules.into_iter().collect(),
        capabilities: cycle_capabilities.into_iter().collect(),
    });
    (ordered, issue)
}

/// Remaining modules that lie on a cycle: repeatedly drop modules with no
/// remaining dependents until only cyclic ones are left
fn cycle_members(
    selected: &[Arc<ModuleDescriptor>],
    dependents: &[Vec<usize>],
    done: &[bool],
) -> Vec<usize> {
    let mut remaining: BTreeSet<usize> = (0..selected.len()).filter(|&i| !done[i]).collect();
    loop {
        let sinks: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| !dependents[i].iter().any(|d| remaining.contains(d)))
            .collect();
        if sinks.is_empty() {
            return remaining.into_iter().collect();
        }
        for i in sinks {
            remaining.remove(&i);
        }
    }
}
