//! Renders an `ExecutionTrace` in the three documented output formats.

use std::fmt::Write as _;

use crate::types::ExecutionTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "yaml" => Ok(Format::Yaml),
            other => anyhow::bail!("unknown format `{other}` (expected text, json, or yaml)"),
        }
    }
}

pub fn render(trace: &ExecutionTrace, format: Format) -> anyhow::Result<String> {
    match format {
        Format::Text => Ok(render_text(trace)),
        Format::Json => Ok(serde_json::to_string_pretty(trace)?),
        Format::Yaml => Ok(serde_yaml::to_string(trace)?),
    }
}

fn render_text(trace: &ExecutionTrace) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "prompt: {}", trace.prompt);
    let _ = writeln!(out, "status: {:?}", trace.overall_status);

    if !trace.candidates.is_empty() {
        let _ = writeln!(out, "\ncandidates:");
        for candidate in &trace.candidates {
            let _ = writeln!(
                out,
                "  {} ({:.3}) — {}",
                candidate.command.name, candidate.score, candidate.rationale
            );
        }
    }

    if !trace.graph.nodes.is_empty() {
        let _ = writeln!(out, "\ngraph:");
        for node in &trace.graph.nodes {
            let rationale = trace.reasoning.plan_nodes.get(&node.id).map(String::as_str).unwrap_or("");
            let _ = writeln!(out, "  node {} :: {} — {}", node.id, node.command, rationale);
        }
        for edge in &trace.graph.edges {
            let _ = writeln!(
                out,
                "  edge {} --{}--> {} — {}",
                edge.from,
                edge.kind.as_str(),
                edge.to,
                edge.rationale
            );
        }
    }

    if !trace.results.is_empty() {
        let _ = writeln!(out, "\nresults:");
        for result in &trace.results {
            let _ = writeln!(
                out,
                "  {} exit={} error={:?}",
                result.node_id, result.exit_code, result.error_kind
            );
            if !result.interpretation.is_empty() {
                let _ = writeln!(out, "    interpretation: {}", result.interpretation);
            }
        }
    }

    out
}
