//! Manual Indexer (C1): enumerates installed commands via the system's
//! keyword-search facility and extracts synopsis/description from each
//! command's manual page.

use std::process::Command;

use regex::Regex;
use tracing::{debug, warn};

const MAX_DESCRIPTION_BYTES: usize = 2048;

/// Raw, unembedded extraction from one manual page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManPageExtract {
    pub name: String,
    pub section: String,
    pub synopsis: String,
    pub description: String,
}

/// Lists installed commands via `man -k .` (a.k.a. `apropos .`), the
/// standard Unix keyword-search facility; each line has the shape
/// `name(section) - short description`.
///
/// Grounded on `tools::shell::run_command`'s `Command::new("bash").args(["-lc", ..])`
/// idiom for shelling out and capturing combined output, applied here to a
/// fixed, read-only introspection command instead of an LLM-chosen one.
pub fn list_commands() -> anyhow::Result<Vec<(String, String)>> {
    let output = Command::new("bash").args(["-lc", "man -k ."]).output()?;
    if !output.status.success() {
        anyhow::bail!(
            "man -k . exited with status {:?}",
            output.status.code()
        );
    }
    let text = String::from_utf8_lossy(&output.stdout);
    Ok(parse_apropos_output(&text))
}

fn parse_apropos_output(text: &str) -> Vec<(String, String)> {
    let line_re = Regex::new(r"^(\S+)\s*\((\w+)\)").unwrap();
    let mut out = Vec::new();
    for line in text.lines() {
        if let Some(caps) = line_re.captures(line) {
            let name = caps[1].to_string();
            let section = caps[2].to_string();
            out.push((name, section));
        }
    }
    out
}

/// Reads and parses one command's manual page. A missing page is reported
/// as an error for the caller to skip (never fatal for the whole run).
pub fn load_manpage(name: &str, section: &str) -> anyhow::Result<ManPageExtract> {
    let output = Command::new("bash")
        .args(["-lc", &format!("man {section} {name} 2>/dev/null || man {name} 2>/dev/null")])
        .output()?;
    if !output.status.success() || output.stdout.is_empty() {
        anyhow::bail!("no manual page found for `{name}`");
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let synopsis = extract_synopsis(&text).unwrap_or_default();
    let description = extract_description(&text).unwrap_or_default();
    Ok(ManPageExtract {
        name: name.to_string(),
        section: section.to_string(),
        synopsis,
        description,
    })
}

/// Takes the first non-empty line after the SYNOPSIS header.
fn extract_synopsis(text: &str) -> Option<String> {
    let mut in_section = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if in_section {
            if is_section_header(line) {
                break;
            }
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
            continue;
        }
        if trimmed.eq_ignore_ascii_case("SYNOPSIS") {
            in_section = true;
        }
    }
    None
}

/// Concatenates paragraphs under DESCRIPTION, truncated to a bounded length.
fn extract_description(text: &str) -> Option<String> {
    let mut in_section = false;
    let mut out = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if in_section {
            if is_section_header(line) {
                break;
            }
            if !trimmed.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(trimmed);
            }
            if out.len() >= MAX_DESCRIPTION_BYTES {
                break;
            }
            continue;
        }
        if trimmed.eq_ignore_ascii_case("DESCRIPTION") {
            in_section = true;
        }
    }
    if out.is_empty() {
        return None;
    }
    if out.len() > MAX_DESCRIPTION_BYTES {
        out.truncate(MAX_DESCRIPTION_BYTES);
    }
    Some(out)
}

/// A man page section header is an unindented, all-caps line (e.g. "NAME",
/// "SYNOPSIS", "SEE ALSO").
fn is_section_header(line: &str) -> bool {
    !line.is_empty()
        && !line.starts_with(' ')
        && !line.starts_with('\t')
        && line.chars().any(|c| c.is_alphabetic())
        && line.chars().all(|c| !c.is_lowercase())
}

/// Re-indexes a single command, returning whether the extracted content
/// changed relative to `previous` (used by `refresh`).
pub fn extract_changed(previous: Option<&ManPageExtract>, current: &ManPageExtract) -> bool {
    previous != Some(current)
}

pub fn log_skip(name: &str, err: &anyhow::Error) {
    warn!(command = name, error = %err, "skipping command during index build");
}

pub fn log_indexed(name: &str) {
    debug!(command = name, "indexed command");
}
