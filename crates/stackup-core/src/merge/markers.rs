//! Marker-based splicing for router, store, entry and build config files.
//!
//! One contribution is the *skeleton*: a regular source file containing
//! insertion markers such as `// @stack:imports`. Every other contribution is
//! a *fragment*: sections introduced by the same markers, or plain lines that
//! go to the strategy's default slot.
//!
//! ```text
//! // @stack:imports
//! import vuetify from './plugins/vuetify'
//! // @stack:plugins
//! app.use(vuetify)
//! ```
//!
//! Fragment sections are spliced right after the matching skeleton marker, in
//! contribution order. Markers stay in the output.

use super::{Contribution, MergeError};

/// Prefix identifying a marker inside a comment
pub const MARKER_PREFIX: &str = "@stack:";

/// Extract the marker name from a line such as `// @stack:routes`.
///
/// Recognised comment forms: `//`, `#`, `/* */`, `{/* */}` and `<!-- -->`.
pub fn marker_name(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("//") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix('#') {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("{/*") {
        rest.strip_suffix("*/}")?
    } else if let Some(rest) = trimmed.strip_prefix("/*") {
        rest.strip_suffix("*/")?
    } else if let Some(rest) = trimmed.strip_prefix("<!--") {
        rest.strip_suffix("-->")?
    } else {
        return None;
    };

    let name = inner.trim().strip_prefix(MARKER_PREFIX)?.trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(name)
}

/// Whether content is a skeleton: it has markers, but does not start with one
pub fn is_skeleton(content: &str) -> bool {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    match lines.next() {
        Some(first) if marker_name(first).is_none() => {
            content.lines().any(|l| marker_name(l).is_some())
        }
        _ => false,
    }
}

/// A fragment section: target marker plus the lines to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub marker: &'a str,
    pub lines: Vec<&'a str>,
}

/// Split fragment content into sections; lines before the first marker go to
/// `default_slot`
pub fn parse_fragment<'a>(content: &'a str, default_slot: &'a str) -> Vec<Section<'a>> {
    let mut sections: Vec<Section<'a>> = Vec::new();
    for line in content.lines() {
        if let Some(name) = marker_name(line) {
            sections.push(Section {
                marker: name,
                lines: Vec::new(),
            });
            continue;
        }
        match sections.last_mut() {
            Some(section) => section.lines.push(line),
            None if line.trim().is_empty() => {}
            None => sections.push(Section {
                marker: default_slot,
                lines: vec![line],
            }),
        }
    }
    for section in &mut sections {
        while section.lines.last().is_some_and(|l| l.trim().is_empty()) {
            section.lines.pop();
        }
    }
    sections
}

/// Skeleton line or insertion slot following a marker line
enum Segment<'a> {
    Line(&'a str),
    Slot {
        marker: &'a str,
        entries: Vec<Vec<&'a str>>,
    },
}

/// Splice all fragments into the single skeleton
pub fn splice(contributions: &[Contribution], default_slot: &str) -> Result<String, MergeError> {
    let mut skeleton: Option<&Contribution> = None;
    let mut fragments = Vec::new();
    for contribution in contributions {
        if contribution.content.trim().is_empty() {
            continue;
        }
        if is_skeleton(&contribution.content) {
            if let Some(first) = skeleton {
                return Err(MergeError::MultipleSkeletons {
                    first: first.module.clone(),
                    second: contribution.module.clone(),
                });
            }
            skeleton = Some(contribution);
        } else {
            fragments.push(contribution);
        }
    }
    let skeleton = skeleton.ok_or(MergeError::MissingSkeleton)?;

    let mut segments = Vec::new();
    for line in skeleton.content.lines() {
        segments.push(Segment::Line(line));
        if let Some(marker) = marker_name(line) {
            segments.push(Segment::Slot {
                marker,
                entries: Vec::new(),
            });
        }
    }
    let skeleton_lines: Vec<&str> = skeleton.content.lines().map(str::trim).collect();

    for fragment in fragments {
        for section in parse_fragment(&fragment.content, default_slot) {
            let Some(entries) = segments.iter_mut().find_map(|segment| match segment {
                Segment::Slot { marker, entries } if *marker == section.marker => Some(entries),
                _ => None,
            }) else {
                return Err(MergeError::MissingMarker {
                    module: fragment.module.clone(),
                    marker: section.marker.to_string(),
                });
            };

            for entry in split_entries(&section.lines) {
                let duplicate = entries.iter().any(|e| same_entry(e, &entry))
                    || (entry.len() == 1 && skeleton_lines.contains(&entry[0].trim()));
                if !duplicate {
                    entries.push(entry);
                }
            }
        }
    }

    let mut out = String::new();
    for segment in &segments {
        match segment {
            Segment::Line(line) => {
                out.push_str(line);
                out.push('\n');
            }
            Segment::Slot { entries, .. } => {
                for line in entries.iter().flatten() {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
    Ok(out)
}

/// Split section lines into de-duplication units.
///
/// Blank lines separate blocks. A block without bracket structure (imports,
/// `app.use(...)` calls) is split further into single lines.
fn split_entries<'a>(lines: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut blocks: Vec<Vec<&'a str>> = vec![Vec::new()];
    for &line in lines {
        if line.trim().is_empty() {
            if blocks.last().is_some_and(|b| !b.is_empty()) {
                blocks.push(Vec::new());
            }
        } else if let Some(block) = blocks.last_mut() {
            block.push(line);
        }
    }
    blocks.retain(|b| !b.is_empty());

    let mut entries = Vec::new();
    for block in blocks {
        if block.iter().all(|l| is_standalone(l)) {
            entries.extend(block.into_iter().map(|l| vec![l]));
        } else {
            entries.push(block);
        }
    }
    entries
}

fn is_standalone(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.ends_with(['{', '[', '('])
        && !trimmed.starts_with(['}', ']', ')'])
}

fn same_entry(a: &[&str], b: &[&str]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.trim() == y.trim())
}
