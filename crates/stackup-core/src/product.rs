//! Product configuration trait for CLI binaries
//!
//! A binary implements this trait to brand the wizard and point it at its
//! bundled module catalog.

use std::path::{Path, PathBuf};

/// Configuration trait for a scaffolding product
///
/// Each product defines:
/// - Product identity (name, display name)
/// - Where the module catalog lives
/// - Documentation links
/// - Post-setup instructions
pub trait ProductConfig: Clone + Send + Sync + 'static {
    /// Internal product name (used for CLI command, env vars)
    fn name(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// Environment variable name for overriding the catalog directory
    fn template_dir_env(&self) -> &'static str;

    /// Catalog directory used when neither flag nor env var is set
    fn default_template_dir(&self) -> PathBuf;

    /// URL for product documentation
    fn docs_url(&self) -> &'static str;

    /// Generate the "next steps" instructions after project creation
    fn next_steps(&self, dir: &Path, package_manager: &str) -> Vec<String>;

    /// CLI description shown in help text
    fn cli_description(&self) -> &'static str;

    /// Upgrade/install command shown in version warnings
    fn upgrade_command(&self) -> &'static str;
}
