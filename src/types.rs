//! The data model shared by every component.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed embedding dimensionality used across the index and query side.
pub const EMBEDDING_DIM: usize = 384;

/// An indexed command, produced by the manual indexer and persisted in the
/// vector index. Immutable once written; a changed man page produces a new
/// `CommandEntry` that replaces the old one by `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEntry {
    pub name: String,
    pub section: String,
    pub synopsis: String,
    pub description: String,
    pub embedding: Vec<f32>,
}

impl CommandEntry {
    /// Whether this entry is organizational prose rather than a real command.
    pub fn is_org(&self) -> bool {
        self.section == "org"
    }

    /// The exact string the indexer embeds — name, synopsis, description.
    pub fn embedding_source(&self) -> String {
        format!("{}\n{}\n{}", self.name, self.synopsis, self.description)
    }
}

/// A scored, rationale-bearing candidate. Ephemeral: exists only for the
/// lifetime of one `solve`/`query` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub command: CommandEntry,
    pub score: f32,
    pub rationale: String,
}

/// How a producer's output reaches its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Producer stdout is streamed into consumer stdin.
    Pipe,
    /// Producer must complete before consumer starts; no data flows.
    Sequence,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Pipe => "pipe",
            EdgeKind::Sequence => "sequence",
        }
    }
}

/// One DAG vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub command: String,
    /// Node ids whose stdout feeds this node's stdin, in order. In the
    /// flattened graphs this engine builds, at most one entry carries a
    /// `pipe` edge; the rest (if any) are `sequence` predecessors.
    pub inputs: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

/// A dependency edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub rationale: String,
}

/// A node and edge set forming a DAG. Construction (`graph::builder::build`,
/// `graph::plan::compile`) guarantees acyclicity before this type is handed
/// to the executor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edges_into(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.to == id)
    }

    pub fn edges_from(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }
}

/// Why a node finished the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    None,
    SpawnFailed,
    Timeout,
    Cancelled,
    NonzeroExit,
}

impl ErrorKind {
    pub fn is_error(self) -> bool {
        !matches!(self, ErrorKind::None)
    }
}

/// Outcome of one node execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub interpretation: String,
    pub error_kind: ErrorKind,
}

impl NodeResult {
    pub fn is_ok(&self) -> bool {
        self.error_kind == ErrorKind::None && self.exit_code == 0
    }
}

/// The call-level status, derived from the full result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Ok,
    Partial,
    Failed,
    Cancelled,
}

impl OverallStatus {
    /// Derives overall status from a result set.
    /// `cancelled` takes priority when the caller reports the run was
    /// externally cancelled, even if some nodes completed cleanly.
    ///
    /// `failed` is reserved for a uniform failure — every node went down
    /// the same way (e.g. every node timed out, or every node exited
    /// nonzero). A run where nodes failed for *different* reasons (one
    /// timed out, another was cancelled as a cascading consequence) made
    /// uneven progress through the graph and is `partial`, even though no
    /// individual node succeeded.
    pub fn derive(results: &[NodeResult], was_cancelled: bool) -> Self {
        if results.is_empty() {
            return OverallStatus::Failed;
        }
        if was_cancelled {
            return OverallStatus::Cancelled;
        }
        let all_ok = results.iter().all(|r| r.is_ok());
        if all_ok {
            return OverallStatus::Ok;
        }
        let any_ok = results.iter().any(|r| r.is_ok());
        if any_ok {
            return OverallStatus::Partial;
        }
        let uniform_failure = results.windows(2).all(|pair| pair[0].error_kind == pair[1].error_kind);
        if uniform_failure {
            OverallStatus::Failed
        } else {
            OverallStatus::Partial
        }
    }

    /// Process exit code per the external interfaces table.
    pub fn exit_code(self) -> i32 {
        match self {
            OverallStatus::Ok => 0,
            OverallStatus::Partial => 1,
            OverallStatus::Failed => 2,
            OverallStatus::Cancelled => 3,
        }
    }
}

/// The full, reified transcript of one orchestration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub prompt: String,
    pub candidates: Vec<SearchResult>,
    pub graph: Graph,
    pub results: Vec<NodeResult>,
    pub overall_status: OverallStatus,
    pub reasoning: ReasoningSummary,
}

/// Aggregate rationale view, gathered for the `reasoning` field of the trace.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReasoningSummary {
    pub plan_nodes: BTreeMap<String, String>,
    pub edges: BTreeMap<String, String>,
    pub execution_results: BTreeMap<String, String>,
}

impl ExecutionTrace {
    /// An empty, `failed` trace for the "zero candidates" boundary case.
    pub fn empty_failed(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            candidates: Vec::new(),
            graph: Graph::default(),
            results: Vec::new(),
            overall_status: OverallStatus::Failed,
            reasoning: ReasoningSummary::default(),
        }
    }
}
