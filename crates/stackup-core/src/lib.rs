//! Stackup Core - module resolution and template composition for project
//! scaffolding
//!
//! A project is assembled from *modules* (a frontend framework, a UI library,
//! a backend service, ...). Each module declares the capabilities it provides
//! and requires, what it conflicts with, and a set of template files.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Core Operations** - Catalog loading, compatibility checks,
//!   dependency resolution, merge planning and composition. All pure.
//! - **Layer 2: Workflow Orchestration** - `ProductConfig` trait, template
//!   context, tool detection and the on-disk writer
//! - **Layer 3: CLI/TUI Interface** - Optional cliclack-based prompts (feature-gated)
//!
//! # Feature Flags
//!
//! - `tui` (default): Enables the cliclack-based TUI prompts module
//!
//! # Example Usage (without TUI)
//!
//! ```ignore
//! use stackup_core::{compose, plan, Catalog, Context, ResolveOptions, Resolver, TemplateDir};
//!
//! let catalog = Catalog::load_dir("templates".as_ref())?;
//! let result = Resolver::new(&catalog).resolve(&["vue-base", "vuetify"], ResolveOptions::default());
//! let plan = plan(&result.modules);
//! let files = compose(&plan, &TemplateDir::new("templates"), &Context::new())?;
//! ```

pub mod catalog;
pub mod compat;
pub mod composer;
pub mod config;
pub mod merge;
pub mod planner;
pub mod product;
pub mod resolver;
pub mod runtime;
pub mod writer;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use catalog::{Catalog, CatalogError, Category, FileEntry, ModuleDescriptor, RootManifest};
pub use compat::{CompatibilityReport, Issue};
pub use composer::{
    compose, compose_concurrent, substitute, ComposeError, ContentError, ContentProvider, Context,
    FileSet, MemoryProvider, TemplateDir,
};
pub use merge::MergeStrategy;
pub use planner::{plan, MergePlan, PlanEntry, StrategySource};
pub use product::ProductConfig;
pub use resolver::{ResolutionResult, ResolveOptions, Resolver};

#[cfg(feature = "tui")]
pub use tui::run;
