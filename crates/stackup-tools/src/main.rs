//! Stackup CLI - Project scaffolding from composable stack modules

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use stackup_core::config::parse_var;
use stackup_core::tui::CreateArgs;
use stackup_core::ProductConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Stackup product configuration
#[derive(Clone)]
pub struct StackupConfig;

impl ProductConfig for StackupConfig {
    fn name(&self) -> &'static str {
        "stackup"
    }

    fn display_name(&self) -> &'static str {
        "Stackup"
    }

    fn template_dir_env(&self) -> &'static str {
        "STACKUP_TEMPLATE_DIR"
    }

    fn default_template_dir(&self) -> PathBuf {
        // Installed next to the binary, else the catalog in the source tree
        let beside_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("templates")));
        match beside_exe {
            Some(dir) if dir.is_dir() => dir,
            _ => PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../templates")),
        }
    }

    fn docs_url(&self) -> &'static str {
        "https://github.com/stackup-dev/stackup#readme"
    }

    fn cli_description(&self) -> &'static str {
        "CLI for scaffolding projects from composable stack modules"
    }

    fn upgrade_command(&self) -> &'static str {
        "cargo install stackup-tools --force"
    }

    fn next_steps(&self, dir: &Path, package_manager: &str) -> Vec<String> {
        let mut steps = Vec::new();
        let current = std::env::current_dir().ok();

        // Step 1: cd to directory if not current
        if current.as_deref() != Some(dir) {
            steps.push(format!("cd {}", dir.display()));
        }

        // Step 2: Install dependencies
        steps.push(format!("{} install", package_manager));

        // Step 3: Fill in environment variables
        if dir.join(".env.example").exists() {
            steps.push("cp .env.example .env  (then fill in the values)".to_string());
        }

        // Step 4: Start dev server
        steps.push(format!("{} run dev", package_manager));

        steps
    }
}

#[derive(Parser, Debug)]
#[command(name = "stackup")]
#[command(about = "CLI for scaffolding projects from composable stack modules")]
#[command(version)]
pub struct Args {
    /// Module catalog directory (overrides STACKUP_TEMPLATE_DIR)
    #[arg(long = "template-dir", global = true)]
    pub template_dir: Option<PathBuf>,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new project (default)
    Create(CliCreateArgs),
    /// List catalog modules by category
    List,
    /// Resolve a module selection and print the ordered stack
    Resolve(ResolveArgs),
    /// Resolve a module selection and print how each file is merged
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
pub struct CliCreateArgs {
    /// Modules to include (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub modules: Option<Vec<String>>,

    /// Project directory to create
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Project name (defaults to the directory name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Extra template variable, may be repeated
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Do not add modules for missing requirements
    #[arg(long = "no-auto-resolve")]
    pub no_auto_resolve: bool,

    /// Continue even if the selected modules conflict
    #[arg(long = "allow-conflicts")]
    pub allow_conflicts: bool,

    /// Skip tool availability check
    #[arg(long = "skip-tool-check")]
    pub skip_tool_check: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    #[arg(short, long)]
    pub yes: bool,
}

impl CliCreateArgs {
    fn into_create_args(self, template_dir: Option<PathBuf>) -> CreateArgs {
        CreateArgs {
            template_dir,
            modules: self.modules,
            directory: self.directory,
            name: self.name,
            vars: self.vars,
            no_auto_resolve: self.no_auto_resolve,
            allow_conflicts: self.allow_conflicts,
            skip_tool_check: self.skip_tool_check,
            yes: self.yes,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Module ids
    #[arg(required = true, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Do not add modules for missing requirements
    #[arg(long = "no-auto-resolve")]
    pub no_auto_resolve: bool,

    /// Report conflicts as warnings instead of failing
    #[arg(long = "allow-conflicts")]
    pub allow_conflicts: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Module ids
    #[arg(required = true, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Install the stderr log subscriber. `RUST_LOG` always wins.
fn init_logging(verbose: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("warn"),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_ansi(std::env::var_os("NO_COLOR").is_none()),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let args = Args::parse();
    init_logging(args.verbose);
    let config = StackupConfig;
    let template_dir = args.template_dir;
    tracing::debug!(version = CLI_VERSION, template_dir = ?template_dir, "starting");

    // Handle subcommands
    match args.command {
        Some(Command::Create(create_args)) => {
            let result =
                stackup_core::run(&config, create_args.into_create_args(template_dir), CLI_VERSION)
                    .await;

            // Ensure cursor is visible on normal exit
            let _ = console::Term::stderr().show_cursor();

            result
        }
        Some(Command::List) => commands::list(&config, template_dir.as_deref()),
        Some(Command::Resolve(resolve_args)) => {
            commands::resolve(&config, template_dir.as_deref(), &resolve_args)
        }
        Some(Command::Plan(plan_args)) => commands::plan(&config, template_dir.as_deref(), &plan_args),
        None => {
            // No subcommand provided, default to create behavior (interactive mode)
            let create_args = CreateArgs {
                template_dir,
                ..CreateArgs::default()
            };
            let result = stackup_core::run(&config, create_args, CLI_VERSION).await;

            // Ensure cursor is visible on normal exit
            let _ = console::Term::stderr().show_cursor();

            result
        }
    }
}
