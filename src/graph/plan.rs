//! Plan Mode (C9): hand-authored diagnostic flows for known problem domains,
//! compiled to the same `Graph` shape semantic search would produce.
//!
//! `classify_intent` is a small deterministic keyword scorer: tokenize,
//! score against marker-word tables, return the best match.

use std::collections::BTreeMap;

use crate::reasoning::Reasoner;
use crate::types::{Edge, EdgeKind, Graph, Node};

pub const FALLBACK_DOMAIN: &str = "audio";
pub const FALLBACK_INTENT: &str = "general";

/// One step of a hand-authored plan: a command plus the note used as its
/// selection rationale source when the reasoning service is unavailable.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub command: String,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub domain: String,
    pub intent: String,
    pub steps: Vec<PlanStep>,
}

struct IntentTable {
    intent: &'static str,
    keywords: &'static [&'static str],
    steps: &'static [(&'static str, &'static str)],
}

static AUDIO_INTENTS: &[IntentTable] = &[
    IntentTable {
        intent: "low_volume",
        keywords: &["quiet", "low", "volume", "can't hear", "too soft"],
        steps: &[
            ("pactl", "list sinks and their current volume levels"),
            ("amixer", "inspect the master channel's mixer settings"),
        ],
    },
    IntentTable {
        intent: "no_sound",
        keywords: &["no sound", "silent", "mute", "nothing plays", "no audio"],
        steps: &[
            ("pactl", "list sinks to confirm one is unmuted and default"),
            ("aplay", "list playback hardware devices"),
            ("dmesg", "check for audio driver errors in the kernel log"),
        ],
    },
    IntentTable {
        intent: "mic_not_working",
        keywords: &["microphone", "mic", "recording", "can't hear me"],
        steps: &[
            ("pactl", "list sources to confirm the microphone is unmuted"),
            ("arecord", "list capture hardware devices"),
        ],
    },
    IntentTable {
        intent: FALLBACK_INTENT,
        keywords: &[],
        steps: &[
            ("pactl", "list sinks and sources for a general audio overview"),
            ("journalctl", "check recent system logs for audio subsystem errors"),
        ],
    },
];

/// Scores `statement` against every intent's keyword set and returns the
/// best match. Statements matching no domain fall back to
/// `(audio, general)` rather than erroring — Plan Mode always has a domain
/// to fall back to.
pub fn classify_intent(statement: &str) -> (String, String) {
    let lowered = statement.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for table in AUDIO_INTENTS {
        let score = table
            .keywords
            .iter()
            .filter(|kw| lowered.contains(*kw))
            .count();
        if score == 0 {
            continue;
        }
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((table.intent, score)),
        }
    }
    let intent = best.map(|(intent, _)| intent).unwrap_or(FALLBACK_INTENT);
    (FALLBACK_DOMAIN.to_string(), intent.to_string())
}

/// Looks up the hand-authored plan for `(domain, intent)`. Only `audio` is
/// implemented today; any other domain falls back to `audio::general`.
pub fn build_plan(domain: &str, intent: &str) -> Plan {
    let table = AUDIO_INTENTS
        .iter()
        .find(|t| t.intent == intent)
        .unwrap_or_else(|| AUDIO_INTENTS.iter().find(|t| t.intent == FALLBACK_INTENT).unwrap());

    let resolved_domain = if domain == FALLBACK_DOMAIN {
        domain.to_string()
    } else {
        FALLBACK_DOMAIN.to_string()
    };

    Plan {
        domain: resolved_domain,
        intent: table.intent.to_string(),
        steps: table
            .steps
            .iter()
            .map(|(command, note)| PlanStep {
                command: command.to_string(),
                note: note.to_string(),
            })
            .collect(),
    }
}

/// Compiles a plan into a `Graph`: steps chain by `sequence` edges in
/// declaration order (diagnostic plans run as an ordered checklist, not a
/// data pipeline), with reasoning applied to every node and edge exactly as
/// semantic search and the DAG builder do.
pub async fn compile(plan: &Plan, reasoner: &Reasoner) -> Graph {
    let mut nodes = Vec::with_capacity(plan.steps.len());
    let mut seen = BTreeMap::new();
    for step in &plan.steps {
        let count = seen.entry(step.command.clone()).or_insert(0usize);
        let id = if *count == 0 {
            step.command.clone()
        } else {
            format!("{}_{}", step.command, count)
        };
        *count += 1;
        nodes.push(Node {
            id,
            command: step.command.clone(),
            inputs: Vec::new(),
            metadata: BTreeMap::from([("note".to_string(), step.note.clone())]),
        });
    }

    let mut edges = Vec::new();
    for pair in nodes.windows(2) {
        edges.push(Edge {
            from: pair[0].id.clone(),
            to: pair[1].id.clone(),
            kind: EdgeKind::Sequence,
            rationale: String::new(),
        });
    }

    for node in nodes.iter_mut() {
        let note = node.metadata.get("note").cloned().unwrap_or_default();
        let rationale = reasoner.selection_rationale(&plan.intent, &node.command, &note).await;
        if rationale != crate::reasoning::UNAVAILABLE_FALLBACK {
            node.metadata.insert("note".to_string(), rationale);
        }
    }

    for edge in edges.iter_mut() {
        let rationale = reasoner.edge_rationale(&edge.from, &edge.to, edge.kind.as_str()).await;
        edge.rationale = if rationale == crate::reasoning::UNAVAILABLE_FALLBACK {
            format!("{} \u{2192} {}", edge.from, edge.to)
        } else {
            rationale
        };
    }

    for node in nodes.iter_mut() {
        node.inputs = edges
            .iter()
            .filter(|e| e.to == node.id)
            .map(|e| e.from.clone())
            .collect();
    }

    Graph { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::client::{CompletionParams, ReasoningClient};

    fn reasoner() -> Reasoner {
        let client = ReasoningClient::new("http://127.0.0.1:1").unwrap();
        let params = CompletionParams {
            model: "mistral".to_string(),
            max_tokens: 16,
            temperature: 0.0,
            stop: vec![],
        };
        Reasoner::new(client, params)
    }

    #[test]
    fn classifies_low_volume_statement() {
        let (domain, intent) = classify_intent("my volume is too low and quiet");
        assert_eq!(domain, "audio");
        assert_eq!(intent, "low_volume");
    }

    #[test]
    fn unmatched_statement_falls_back_to_general() {
        let (domain, intent) = classify_intent("the printer is out of ink");
        assert_eq!(domain, "audio");
        assert_eq!(intent, "general");
    }

    #[tokio::test]
    async fn compiled_plan_chains_steps_with_sequence_edges() {
        let plan = build_plan("audio", "no_sound");
        let graph = compile(&plan, &reasoner()).await;
        assert_eq!(graph.nodes.len(), plan.steps.len());
        assert_eq!(graph.edges.len(), plan.steps.len() - 1);
        assert!(graph.edges.iter().all(|e| e.kind == EdgeKind::Sequence));
    }
}
