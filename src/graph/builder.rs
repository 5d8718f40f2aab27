//! DAG Builder (C6): candidate list -> typed, acyclic `Graph`.
//!
//! Edge inference is a small, hand-written relation table (never inferred
//! from natural language at runtime) declaring which commands typically
//! consume which others' output.

use std::collections::BTreeMap;

use crate::reasoning::Reasoner;
use crate::types::{Edge, EdgeKind, Graph, Node, SearchResult};

/// `(producer, consumer, kind)`. Scoped to the audio domain this engine
/// targets today; extend the table, not the algorithm, for new domains.
pub static RELATIONS: &[(&str, &str, EdgeKind)] = &[
    ("pactl", "grep", EdgeKind::Pipe),
    ("pacmd", "grep", EdgeKind::Pipe),
    ("amixer", "grep", EdgeKind::Pipe),
    ("aplay", "grep", EdgeKind::Pipe),
    ("arecord", "grep", EdgeKind::Pipe),
    ("lsusb", "grep", EdgeKind::Pipe),
    ("lsof", "grep", EdgeKind::Pipe),
    ("ps", "grep", EdgeKind::Pipe),
    ("dmesg", "grep", EdgeKind::Pipe),
    ("journalctl", "grep", EdgeKind::Pipe),
    ("find", "xargs", EdgeKind::Pipe),
    ("grep", "sort", EdgeKind::Pipe),
    ("grep", "wc", EdgeKind::Pipe),
    ("sort", "uniq", EdgeKind::Pipe),
    ("systemctl", "grep", EdgeKind::Sequence),
    ("pulseaudio", "pactl", EdgeKind::Sequence),
];

fn declared_kind(producer: &str, consumer: &str) -> Option<EdgeKind> {
    RELATIONS
        .iter()
        .find(|(from, to, _)| *from == producer && *to == consumer)
        .map(|(_, _, kind)| *kind)
}

/// Builds the DAG for one `solve` call. `candidates` must already be sorted
/// by the order the graph should present nodes in (descending score).
pub async fn build(prompt: &str, candidates: &[SearchResult], reasoner: &Reasoner) -> Graph {
    let names: Vec<&str> = candidates.iter().map(|c| c.command.name.as_str()).collect();

    let mut nodes: Vec<Node> = candidates
        .iter()
        .map(|c| Node {
            id: c.command.name.clone(),
            command: c.command.name.clone(),
            inputs: Vec::new(),
            metadata: BTreeMap::from([("score".to_string(), c.score.to_string())]),
        })
        .collect();

    let mut edges = Vec::new();
    for (consumer_idx, &consumer) in names.iter().enumerate() {
        // Producers are candidates ranked ahead of the consumer (the
        // relation table is directional, but only a higher-ranked
        // candidate is eligible to feed a lower-ranked one, preserving the
        // candidate order as the node iteration order).
        let mut producers: Vec<(usize, &str, EdgeKind)> = names[..consumer_idx]
            .iter()
            .enumerate()
            .filter_map(|(i, &producer)| declared_kind(producer, consumer).map(|kind| (i, producer, kind)))
            .collect();
        if producers.is_empty() {
            continue;
        }
        // At most one incoming pipe edge per node: the highest-ranked
        // declared pipe producer wins the pipe; any others demote to
        // sequence so the executor still sees the happens-before relation.
        let pipe_slot = producers.iter().position(|(_, _, kind)| *kind == EdgeKind::Pipe);
        if let Some(winner) = pipe_slot {
            for (slot, (_, _, kind)) in producers.iter_mut().enumerate() {
                if *kind == EdgeKind::Pipe && slot != winner {
                    *kind = EdgeKind::Sequence;
                }
            }
        }
        for (_, producer, kind) in producers {
            edges.push(Edge {
                from: producer.to_string(),
                to: consumer.to_string(),
                kind,
                rationale: String::new(),
            });
        }
    }

    edges.sort_by(|a, b| (a.from.as_str(), a.to.as_str()).cmp(&(b.from.as_str(), b.to.as_str())));
    break_cycles(&mut edges, prompt);
    assign_inputs(&mut nodes, &edges);
    attach_rationale(&mut edges, reasoner).await;

    Graph { nodes, edges }
}

fn assign_inputs(nodes: &mut [Node], edges: &[Edge]) {
    for node in nodes.iter_mut() {
        let mut inputs: Vec<String> = edges
            .iter()
            .filter(|e| e.to == node.id)
            .map(|e| e.from.clone())
            .collect();
        inputs.sort();
        node.inputs = inputs;
    }
}

/// Removes edges participating in a cycle until the edge set is acyclic,
/// deterministically: repeatedly find the first cycle (by DFS over edges in
/// `(from, to)` order) and drop its lexicographically-lowest `(from, to)`
/// edge.
fn break_cycles(edges: &mut Vec<Edge>, _prompt: &str) {
    loop {
        let Some(cycle_edge) = find_cycle_edge_to_remove(edges) else {
            return;
        };
        edges.retain(|e| !(e.from == cycle_edge.0 && e.to == cycle_edge.1));
    }
}

fn find_cycle_edge_to_remove(edges: &[Edge]) -> Option<(String, String)> {
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in edges {
        adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
    }

    let mut visiting: Vec<&str> = Vec::new();
    let mut visited: BTreeMap<&str, bool> = BTreeMap::new();

    fn visit<'a>(
        node: &'a str,
        adjacency: &BTreeMap<&'a str, Vec<&'a str>>,
        visiting: &mut Vec<&'a str>,
        visited: &mut BTreeMap<&'a str, bool>,
    ) -> Option<Vec<(String, String)>> {
        if let Some(&done) = visited.get(node) {
            if done {
                return None;
            }
        }
        if let Some(pos) = visiting.iter().position(|&n| n == node) {
            return Some(
                visiting[pos..]
                    .windows(2)
                    .map(|w| (w[0].to_string(), w[1].to_string()))
                    .chain(std::iter::once((
                        visiting.last().unwrap().to_string(),
                        node.to_string(),
                    )))
                    .collect(),
            );
        }
        visiting.push(node);
        if let Some(children) = adjacency.get(node) {
            for &child in children {
                if let Some(cycle) = visit(child, adjacency, visiting, visited) {
                    return Some(cycle);
                }
            }
        }
        visiting.pop();
        visited.insert(node, true);
        None
    }

    for &start in adjacency.keys() {
        if let Some(cycle) = visit(start, &adjacency, &mut visiting, &mut visited) {
            return cycle.into_iter().min();
        }
    }
    None
}

async fn attach_rationale(edges: &mut [Edge], reasoner: &Reasoner) {
    for edge in edges.iter_mut() {
        let rationale = reasoner.edge_rationale(&edge.from, &edge.to, edge.kind.as_str()).await;
        edge.rationale = if rationale == crate::reasoning::UNAVAILABLE_FALLBACK {
            format!("{} \u{2192} {}", edge.from, edge.to)
        } else {
            rationale
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::client::{CompletionParams, ReasoningClient};
    use crate::types::CommandEntry;

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

    fn candidate(name: &str, score: f32) -> SearchResult {
        SearchResult {
            command: CommandEntry {
                name: name.to_string(),
                section: "1".to_string(),
                synopsis: format!("{name} synopsis"),
                description: format!("{name} description"),
                embedding: Vec::new(),
            },
            score,
            rationale: String::new(),
        }
    }

    #[tokio::test]
    async fn single_candidate_has_no_edges() {
        let candidates = vec![candidate("pactl", 0.9)];
        let graph = build("volume", &candidates, &reasoner()).await;
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[tokio::test]
    async fn declared_relation_produces_pipe_edge() {
        let candidates = vec![candidate("pactl", 0.9), candidate("grep", 0.5)];
        let graph = build("volume", &candidates, &reasoner()).await;
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].from, "pactl");
        assert_eq!(graph.edges[0].to, "grep");
        assert_eq!(graph.edges[0].kind, EdgeKind::Pipe);
        assert!(graph.node("grep").unwrap().inputs.contains(&"pactl".to_string()));
    }

    #[tokio::test]
    async fn unrelated_candidates_are_independent_roots() {
        let candidates = vec![candidate("pactl", 0.9), candidate("lsusb", 0.6)];
        let graph = build("volume", &candidates, &reasoner()).await;
        assert!(graph.edges.is_empty());
    }

    #[tokio::test]
    async fn second_pipe_producer_demotes_to_sequence() {
        let candidates = vec![
            candidate("pactl", 0.9),
            candidate("ps", 0.8),
            candidate("grep", 0.5),
        ];
        let graph = build("volume", &candidates, &reasoner()).await;
        let pipe_edges: Vec<_> = graph.edges.iter().filter(|e| e.kind == EdgeKind::Pipe).collect();
        assert_eq!(pipe_edges.len(), 1);
        assert_eq!(pipe_edges[0].from, "pactl");
        let sequence_edges: Vec<_> = graph.edges.iter().filter(|e| e.kind == EdgeKind::Sequence).collect();
        assert_eq!(sequence_edges.len(), 1);
        assert_eq!(sequence_edges[0].from, "ps");
    }

    #[tokio::test]
    async fn graph_is_acyclic_even_with_adversarial_input() {
        // RELATIONS never actually cycles, but the cycle breaker must be a
        // no-op on well-formed input and not panic.
        let candidates = vec![
            candidate("grep", 0.9),
            candidate("sort", 0.8),
            candidate("uniq", 0.7),
        ];
        let graph = build("dedupe", &candidates, &reasoner()).await;
        assert_eq!(graph.edges.len(), 2);
    }
}
