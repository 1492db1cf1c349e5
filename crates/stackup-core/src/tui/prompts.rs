//! Charm-style CLI prompts using cliclack

use crate::catalog::{version, Catalog, Category};
use crate::composer::{self, TemplateDir};
use crate::config::{self, ProjectInfo};
use crate::planner;
use crate::product::ProductConfig;
use crate::resolver::{ResolutionResult, ResolveOptions, Resolver};
use crate::runtime::check;
use crate::writer;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI arguments for the create command
#[derive(Debug, Clone, Default)]
pub struct CreateArgs {
    /// Catalog directory to use instead of the product default
    pub template_dir: Option<PathBuf>,

    /// Module ids to include; prompts when absent
    pub modules: Option<Vec<String>>,

    /// Project directory to create
    pub directory: Option<PathBuf>,

    /// Project name (defaults to the directory name)
    pub name: Option<String>,

    /// Extra template variables (`--var KEY=VALUE`)
    pub vars: Vec<(String, String)>,

    /// Do not add providers for missing capabilities
    pub no_auto_resolve: bool,

    /// Continue despite blocking compatibility issues
    pub allow_conflicts: bool,

    /// Skip tool availability check
    pub skip_tool_check: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    pub yes: bool,
}

/// Run the CLI with interactive prompts
pub async fn run<C: ProductConfig>(config: &C, args: CreateArgs, cli_version: &str) -> Result<()> {
    cliclack::intro(config.display_name())?;

    // Step 1: Load the module catalog
    let template_dir = config::resolve_template_dir(config, args.template_dir.as_deref());
    let catalog = load_catalog(&template_dir)?;

    if let Some(warning) = version::check_compatibility(
        cli_version,
        catalog.manifest().min_cli_version.as_deref(),
        config.upgrade_command(),
    ) {
        cliclack::log::warning(format!(
            "Version warning: {}",
            warning.lines().next().unwrap_or(&warning)
        ))?;
    }

    // Step 2: Select directory
    let project_dir = select_directory(&args)?;

    // Step 3: Select modules
    let requested = select_modules(&catalog, &args)?;

    // Step 4: Resolve dependencies and check compatibility
    let resolution = resolve_modules(&catalog, &requested, &args)?;

    // Step 5: Check tools (advisory)
    if args.skip_tool_check {
        cliclack::log::info("Skipping tool check")?;
    } else {
        check_tools(&resolution)?;
    }

    // Step 6: Compose and write the project
    let info = ProjectInfo::detect(
        args.name
            .clone()
            .unwrap_or_else(|| config::project_name_for(&project_dir)),
    );
    create_project(&template_dir, &resolution, &info, &args, &project_dir).await?;

    // Step 7: Show next steps
    print_next_steps(config, &project_dir, &info.package_manager)?;

    Ok(())
}

fn load_catalog(template_dir: &Path) -> Result<Catalog> {
    let spinner = cliclack::spinner();
    spinner.start("Loading modules...");

    match Catalog::load_dir(template_dir) {
        Ok(catalog) if catalog.is_empty() => {
            spinner.stop("No modules found");
            anyhow::bail!("No modules found in {}", template_dir.display());
        }
        Ok(catalog) => {
            spinner.stop(format!(
                "Loaded {} modules from {}",
                catalog.len(),
                template_dir.display()
            ));
            Ok(catalog)
        }
        Err(e) => {
            spinner.stop("Failed to load modules");
            Err(e).with_context(|| format!("Failed to load catalog from {}", template_dir.display()))
        }
    }
}

fn select_directory(args: &CreateArgs) -> Result<PathBuf> {
    let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    // Use --directory flag if provided
    let path = if let Some(dir) = &args.directory {
        let p = if dir.is_absolute() {
            dir.clone()
        } else {
            current_dir.join(dir)
        };
        cliclack::log::info(format!("Using directory: {}", p.display()))?;
        p
    } else if args.yes {
        current_dir
    } else {
        let input: String = cliclack::input("Project directory")
            .placeholder(".")
            .default_input(".")
            .interact()?;

        if input.is_empty() || input == "." {
            current_dir
        } else {
            let p = PathBuf::from(&input);
            if p.is_absolute() {
                p
            } else {
                current_dir.join(p)
            }
        }
    };

    // Validate parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.exists() && parent != Path::new("") {
            anyhow::bail!("Parent directory does not exist: {}", parent.display());
        }
    }

    // Warn if directory exists and has files
    if path.is_dir() {
        if let Ok(entries) = std::fs::read_dir(&path) {
            let count = entries.count();
            if count > 0 {
                cliclack::log::warning(format!("Directory has {} existing items", count))?;

                // Auto-confirm with --yes flag
                let confirm = if args.yes {
                    true
                } else {
                    cliclack::confirm("Continue anyway?")
                        .initial_value(true)
                        .interact()?
                };

                if !confirm {
                    anyhow::bail!("Setup cancelled.");
                }
            }
        }
    }

    Ok(path)
}

fn select_modules(catalog: &Catalog, args: &CreateArgs) -> Result<Vec<String>> {
    if let Some(modules) = &args.modules {
        cliclack::log::info(format!("Modules: {}", modules.join(", ")))?;
        return Ok(modules.clone());
    }
    if args.yes {
        anyhow::bail!("--modules is required with --yes");
    }

    let mut selected: Vec<String> = Vec::new();
    for category in Category::ALL {
        let modules = catalog.by_category(category);
        if modules.is_empty() {
            continue;
        }

        if category == Category::FrontendFramework {
            let mut select = cliclack::select(format!("Select a {}", category.display_name()));
            for module in &modules {
                select = select.item(module.id.clone(), module.display_name(), &module.description);
            }
            selected.push(select.interact()?);
            continue;
        }

        let mut multi = cliclack::multiselect(format!(
            "Select {} (optional)",
            category.display_name()
        ));
        for module in &modules {
            multi = multi.item(module.id.clone(), module.display_name(), &module.description);
        }
        let picked: Vec<String> = multi.required(false).interact()?;
        selected.extend(picked);
    }

    if selected.is_empty() {
        anyhow::bail!("No modules selected.");
    }
    Ok(selected)
}

fn resolve_modules(catalog: &Catalog, requested: &[String], args: &CreateArgs) -> Result<ResolutionResult> {
    let options = ResolveOptions {
        auto_resolve: !args.no_auto_resolve,
        allow_conflicts: args.allow_conflicts,
    };
    let result = Resolver::new(catalog).resolve(requested, options);

    if !result.added.is_empty() {
        cliclack::log::info(format!(
            "Added to satisfy requirements: {}",
            result.added.join(", ")
        ))?;
    }
    for warning in &result.warnings {
        cliclack::log::warning(warning.to_string())?;
    }

    if !result.success {
        for issue in &result.errors {
            cliclack::log::error(issue.to_string())?;
        }
        anyhow::bail!(
            "The selected modules are not compatible ({} issue{}). Use --allow-conflicts to continue anyway.",
            result.errors.len(),
            if result.errors.len() == 1 { "" } else { "s" }
        );
    }

    cliclack::log::success(format!("Stack: {}", result.module_ids().join(" → ")))?;
    Ok(result)
}

fn check_tools(resolution: &ResolutionResult) -> Result<()> {
    let names: Vec<&str> = std::iter::once("git")
        .chain(
            resolution
                .modules
                .iter()
                .flat_map(|m| m.tools.iter().map(String::as_str)),
        )
        .collect();
    let (tools, unknown) = check::parse_tools(&names);
    for name in unknown {
        cliclack::log::warning(format!("Unknown tool: {}", name))?;
    }

    let spinner = cliclack::spinner();
    spinner.start("Checking tools...");

    let results = check::check_tools(&[], &tools)?;
    let tool_info: Vec<String> = results
        .iter()
        .map(|t| {
            if t.available {
                format!("{} ({})", t.tool, t.version.as_deref().unwrap_or("unknown"))
            } else {
                format!("{} (not installed)", t.tool)
            }
        })
        .collect();
    spinner.stop(format!("Detected tools: {}", tool_info.join(", ")));

    for missing in results.iter().filter(|t| !t.available) {
        cliclack::log::warning(format!(
            "{} is not installed ({})",
            missing.tool,
            missing.tool.install_hint()
        ))?;
    }
    Ok(())
}

async fn create_project(
    template_dir: &Path,
    resolution: &ResolutionResult,
    info: &ProjectInfo,
    args: &CreateArgs,
    project_dir: &Path,
) -> Result<()> {
    let spinner = cliclack::spinner();
    spinner.start("Creating project...");

    let plan = planner::plan(&resolution.modules);
    let context = config::build_context(info, &resolution.modules, &args.vars);
    let files = match composer::compose_concurrent(
        Arc::new(plan),
        Arc::new(TemplateDir::new(template_dir)),
        Arc::new(context),
    )
    .await
    {
        Ok(files) => files,
        Err(e) => {
            spinner.stop("Failed to compose project");
            return Err(e).context("Failed to compose project files");
        }
    };

    let written = writer::write_file_set(&files, project_dir).await?;

    spinner.stop(format!(
        "Created {} files in {}",
        written.len(),
        project_dir.display()
    ));

    Ok(())
}

fn print_next_steps<C: ProductConfig>(config: &C, project_dir: &Path, package_manager: &str) -> Result<()> {
    let steps = config.next_steps(project_dir, package_manager);

    println!();
    println!("  Next steps");
    println!();

    for (i, step) in steps.iter().enumerate() {
        println!("  {}.  {}", i + 1, step);
    }

    println!();
    println!("  Docs: {}", config.docs_url());

    cliclack::outro("Happy coding!")?;

    Ok(())
}
