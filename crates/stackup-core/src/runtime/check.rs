//! Detection of the command-line tools a generated project relies on

use anyhow::Result;
use std::fmt;
use std::process::Command;
use std::str::FromStr;

/// Tools a module can declare in its `tools` list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    Git,
    Gh,
    Node,
    Npm,
    Bun,
}

impl Tool {
    pub const ALL: [Tool; 5] = [Tool::Git, Tool::Gh, Tool::Node, Tool::Npm, Tool::Bun];

    /// Binary probed with `--version`
    pub fn binary(&self) -> &'static str {
        match self {
            Tool::Git => "git",
            Tool::Gh => "gh",
            Tool::Node => "node",
            Tool::Npm => "npm",
            Tool::Bun => "bun",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Tool::Git => "Git",
            Tool::Gh => "GitHub CLI",
            Tool::Node => "Node.js",
            Tool::Npm => "npm",
            Tool::Bun => "Bun",
        }
    }

    pub fn install_hint(&self) -> &'static str {
        match self {
            Tool::Git => "install from https://git-scm.com",
            Tool::Gh => "install from https://cli.github.com",
            Tool::Node => "install from https://nodejs.org",
            Tool::Npm => "ships with Node.js, https://nodejs.org",
            Tool::Bun => "install from https://bun.sh",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "git" => Ok(Tool::Git),
            "gh" | "github-cli" => Ok(Tool::Gh),
            "node" | "nodejs" => Ok(Tool::Node),
            "npm" => Ok(Tool::Npm),
            "bun" => Ok(Tool::Bun),
            _ => Err(format!("unknown tool '{}'", s)),
        }
    }
}

/// Tool detection result
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub tool: Tool,
    pub version: Option<String>,
    pub available: bool,
}

/// Run `<tool> --version`
pub fn probe(tool: Tool) -> ToolInfo {
    match Command::new(tool.binary()).arg("--version").output() {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout)
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            ToolInfo {
                tool,
                version: Some(version),
                available: true,
            }
        }
        _ => ToolInfo {
            tool,
            version: None,
            available: false,
        },
    }
}

/// Parse tool names, returning the known tools and the unknown names
pub fn parse_tools<S: AsRef<str>>(names: &[S]) -> (Vec<Tool>, Vec<String>) {
    let mut tools = Vec::new();
    let mut unknown = Vec::new();
    for name in names {
        match name.as_ref().parse::<Tool>() {
            Ok(tool) if !tools.contains(&tool) => tools.push(tool),
            Ok(_) => {}
            Err(_) => unknown.push(name.as_ref().to_string()),
        }
    }
    (tools, unknown)
}

/// Check tools; those in `advisory` get availability reported but don't cause failure.
pub fn check_tools(required: &[Tool], advisory: &[Tool]) -> Result<Vec<ToolInfo>> {
    let mut results = Vec::new();
    let mut missing = Vec::new();

    let mut tools: Vec<Tool> = required.iter().chain(advisory).copied().collect();
    tools.sort();
    tools.dedup();

    for tool in tools {
        let info = probe(tool);
        if !info.available && required.contains(&tool) {
            missing.push(format!("{} ({})", tool.display_name(), tool.install_hint()));
            continue;
        }
        results.push(info);
    }

    if !missing.is_empty() {
        anyhow::bail!(
            "Missing required tools:\n{}",
            missing
                .iter()
                .map(|m| format!("  - {}", m))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    Ok(results)
}
