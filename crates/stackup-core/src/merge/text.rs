//! Line-oriented merge strategies (`.gitignore`, `.env.example`, ...)

use super::Contribution;
use std::collections::HashSet;

/// Concatenate contributions in order, one newline-terminated block each
pub fn append(contributions: &[Contribution]) -> String {
    let mut out = String::new();
    for contribution in contributions {
        if contribution.content.is_empty() {
            continue;
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&contribution.content);
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Like [`append`], but drops non-blank lines already emitted and collapses
/// runs of blank lines
pub fn append_unique(contributions: &[Contribution]) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut lines: Vec<&str> = Vec::new();

    for contribution in contributions {
        for line in contribution.content.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                if lines.last().is_some_and(|last| !last.is_empty()) {
                    lines.push(line);
                }
                continue;
            }
            if seen.insert(line) {
                lines.push(line);
            }
        }
        // Keep blocks from different modules apart
        if lines.last().is_some_and(|last| !last.is_empty()) {
            lines.push("");
        }
    }

    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
