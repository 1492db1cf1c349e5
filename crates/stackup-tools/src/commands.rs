//! Non-interactive subcommands: `list`, `resolve` and `plan`

use crate::{PlanArgs, ResolveArgs, StackupConfig};
use anyhow::{Context, Result};
use colored::Colorize;
use stackup_core::catalog::version;
use stackup_core::config::resolve_template_dir;
use stackup_core::{
    plan as plan_merge, Catalog, Category, Issue, ProductConfig, ResolutionResult, ResolveOptions,
    Resolver, StrategySource,
};
use std::path::Path;

fn load_catalog(config: &StackupConfig, template_dir: Option<&Path>) -> Result<Catalog> {
    let dir = resolve_template_dir(config, template_dir);
    let catalog = Catalog::load_dir(&dir)
        .with_context(|| format!("Failed to load catalog from {}", dir.display()))?;

    if let Some(warning) = version::check_compatibility(
        crate::CLI_VERSION,
        catalog.manifest().min_cli_version.as_deref(),
        config.upgrade_command(),
    ) {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
    Ok(catalog)
}

pub fn list(config: &StackupConfig, template_dir: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(config, template_dir)?;

    for category in Category::ALL {
        let modules = catalog.by_category(category);
        if modules.is_empty() {
            continue;
        }
        println!("{}", category.display_name().bold());
        for module in modules {
            let mut line = format!("  {:<16} {}", module.id.cyan(), module.description);
            if !module.requires.is_empty() {
                let requires: Vec<&str> = module.requires.iter().map(String::as_str).collect();
                line.push_str(&format!(" {}", format!("(requires {})", requires.join(", ")).dimmed()));
            }
            println!("{}", line);
        }
        println!();
    }
    Ok(())
}

pub fn resolve(config: &StackupConfig, template_dir: Option<&Path>, args: &ResolveArgs) -> Result<()> {
    let catalog = load_catalog(config, template_dir)?;
    let options = ResolveOptions {
        auto_resolve: !args.no_auto_resolve,
        allow_conflicts: args.allow_conflicts,
    };
    let result = Resolver::new(&catalog).resolve(&args.modules, options);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_resolution(&result);
    }

    if !result.success {
        anyhow::bail!(
            "Resolution failed with {} issue{}",
            result.errors.len(),
            if result.errors.len() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

pub fn plan(config: &StackupConfig, template_dir: Option<&Path>, args: &PlanArgs) -> Result<()> {
    let catalog = load_catalog(config, template_dir)?;
    let options = ResolveOptions {
        auto_resolve: true,
        allow_conflicts: false,
    };
    let result = Resolver::new(&catalog).resolve(&args.modules, options);
    if !result.success {
        print_resolution(&result);
        anyhow::bail!("Cannot plan an unresolved module selection");
    }

    let plan = plan_merge(&result.modules);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let width = plan.paths().map(str::len).max().unwrap_or(0);
    for (path, entry) in plan.iter() {
        let source = match &entry.source {
            StrategySource::Single => String::new(),
            StrategySource::Default => " (default)".to_string(),
            StrategySource::Fallback => " (fallback)".to_string(),
            StrategySource::Override { module, pattern } => {
                format!(" (override '{}' from {})", pattern, module)
            }
        };
        let contributors: Vec<&str> = entry
            .contributors
            .iter()
            .map(|c| c.module_id.as_str())
            .collect();
        println!(
            "{:<width$}  {}{}  {}",
            path,
            entry.strategy.to_string().cyan(),
            source.dimmed(),
            contributors.join(", "),
            width = width
        );
    }
    Ok(())
}

fn print_resolution(result: &ResolutionResult) {
    if result.success {
        println!("{}", "Resolved stack:".green().bold());
        for (i, module) in result.modules.iter().enumerate() {
            let added = if result.added.contains(&module.id) {
                format!(" {}", "(added)".dimmed())
            } else {
                String::new()
            };
            println!(
                "  {}. {} [{}]{}",
                i + 1,
                module.id,
                module.category,
                added
            );
        }
    } else {
        println!("{}", "Resolution failed:".red().bold());
        for issue in &result.errors {
            print_issue(issue, "error".red());
        }
        if !result.added.is_empty() {
            println!("  auto-resolve added: {}", result.added.join(", "));
        }
    }

    for issue in &result.warnings {
        print_issue(issue, "warning".yellow());
    }
}

fn print_issue(issue: &Issue, label: colored::ColoredString) {
    println!("  {}[{}] {}", label, issue.kind(), issue);
}
