//! Tool detection
//!
//! Probes the command-line tools (git, Node.js, package managers) that the
//! selected modules expect to be installed.

pub mod check;

pub use check::{check_tools, parse_tools, probe, Tool, ToolInfo};
