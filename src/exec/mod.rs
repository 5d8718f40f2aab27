//! Executor (C7): runs a compiled `Graph` to a `NodeResult` per node.

pub mod scheduler;

pub use scheduler::{execute, ExecuteOptions, FailurePolicy};

use tokio_util::sync::CancellationToken;

use crate::reasoning::Reasoner;
use crate::types::{Graph, NodeResult};

/// Runs the graph, then requests a per-result interpretation from the
/// reasoning client for every node that produced output. Split from
/// `scheduler::execute` so the subprocess-only scheduling logic stays
/// testable without a reasoning dependency; together they are still C7's
/// one external contract.
pub async fn execute_with_interpretation(
    graph: Graph,
    opts: ExecuteOptions,
    cancel: CancellationToken,
    reasoner: &Reasoner,
) -> Vec<NodeResult> {
    let mut results = execute(graph.clone(), opts, cancel).await;
    for result in results.iter_mut() {
        let Some(node) = graph.node(&result.node_id) else { continue };
        let output = if result.stdout.is_empty() { &result.stderr } else { &result.stdout };
        let interpretation = reasoner.interpretation(&node.command, output).await;
        result.interpretation = if interpretation == crate::reasoning::UNAVAILABLE_FALLBACK {
            String::new()
        } else {
            interpretation
        };
    }
    results
}
