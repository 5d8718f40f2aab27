//! Exercises the executor against real subprocesses — `true`, `false`,
//! `sleep`, `sh -c` — rather than mocking `Command`.

use std::collections::BTreeMap;
use std::time::Duration;

use orchestrate::exec::{execute, ExecuteOptions, FailurePolicy};
use orchestrate::types::{EdgeKind, Edge, ErrorKind, Graph, Node};
use tokio_util::sync::CancellationToken;

fn node(id: &str, command: &str) -> Node {
    Node {
        id: id.to_string(),
        command: command.to_string(),
        inputs: Vec::new(),
        metadata: BTreeMap::new(),
    }
}

fn opts() -> ExecuteOptions {
    ExecuteOptions {
        max_parallel: 4,
        per_node_timeout: Duration::from_secs(5),
        dry_run: false,
        stream_cap_bytes: 64 * 1024,
        failure_policy: FailurePolicy::BestEffort,
    }
}

#[tokio::test]
async fn independent_roots_all_complete() {
    let graph = Graph {
        nodes: vec![node("a", "true"), node("b", "true"), node("c", "false")],
        edges: vec![],
    };
    let results = execute(graph, opts(), CancellationToken::new()).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
}

#[tokio::test]
async fn sequence_edge_enforces_order_without_data_flow() {
    let graph = Graph {
        nodes: vec![node("a", "echo first"), node("b", "echo second")],
        edges: vec![Edge {
            from: "a".to_string(),
            to: "b".to_string(),
            kind: EdgeKind::Sequence,
            rationale: String::new(),
        }],
    };
    let results = execute(graph, opts(), CancellationToken::new()).await;
    let a = results.iter().find(|r| r.node_id == "a").unwrap();
    let b = results.iter().find(|r| r.node_id == "b").unwrap();
    assert!(a.finished_at <= b.started_at);
    assert_eq!(b.stdout.trim(), "second"); // sequence discards producer output
}

#[tokio::test]
async fn multi_stage_pipe_chain_streams_through() {
    let graph = Graph {
        nodes: vec![
            node("a", "printf 'one\\ntwo\\nthree\\n'"),
            node("b", "sort"),
            node("c", "wc -l"),
        ],
        edges: vec![
            Edge { from: "a".to_string(), to: "b".to_string(), kind: EdgeKind::Pipe, rationale: String::new() },
            Edge { from: "b".to_string(), to: "c".to_string(), kind: EdgeKind::Pipe, rationale: String::new() },
        ],
    };
    let results = execute(graph, opts(), CancellationToken::new()).await;
    let c = results.iter().find(|r| r.node_id == "c").unwrap();
    assert_eq!(c.stdout.trim(), "3");
}

#[tokio::test]
async fn spawn_failure_is_node_local() {
    let graph = Graph {
        nodes: vec![node("a", "this-binary-does-not-exist-anywhere-xyz")],
        edges: vec![],
    };
    let results = execute(graph, opts(), CancellationToken::new()).await;
    assert_eq!(results.len(), 1);
    // bash reports "command not found" as a nonzero exit, not a spawn failure,
    // since the engine always spawns `bash -lc <command>` itself.
    assert_eq!(results[0].error_kind, ErrorKind::NonzeroExit);
}

#[tokio::test]
async fn external_cancellation_reaps_running_children() {
    let cancel = CancellationToken::new();
    let graph = Graph {
        nodes: vec![node("a", "sleep 30")],
        edges: vec![],
    };
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_clone.cancel();
    });
    let results = tokio::time::timeout(Duration::from_secs(10), execute(graph, opts(), cancel))
        .await
        .expect("execute should finish promptly after cancellation");
    assert_eq!(results[0].error_kind, ErrorKind::Cancelled);
}

#[tokio::test]
async fn one_result_per_node_including_cancelled_ones() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let graph = Graph {
        nodes: vec![node("a", "true"), node("b", "true"), node("c", "true")],
        edges: vec![
            Edge { from: "a".to_string(), to: "b".to_string(), kind: EdgeKind::Sequence, rationale: String::new() },
            Edge { from: "b".to_string(), to: "c".to_string(), kind: EdgeKind::Sequence, rationale: String::new() },
        ],
    };
    let results = execute(graph, opts(), cancel).await;
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.error_kind == ErrorKind::Cancelled));
}
