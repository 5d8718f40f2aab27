//! Executor (C7): runs a `Graph` under bounded parallelism, honoring
//! dependencies, cancellation, and timeouts.
//!
//! The admission gate is a `tokio::sync::Semaphore` of size `max_parallel`
//! shared across spawned tasks, the same fan-out shape as the pack's
//! `Orchestrator::fan_out` — one `tokio::spawn` per unit of work, a permit
//! held for its duration, results rendezvoused through the task's
//! `JoinHandle` rather than shared mutable state.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::{EdgeKind, ErrorKind, Graph, Node, NodeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Strict,
    BestEffort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::BestEffort
    }
}

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub max_parallel: usize,
    pub per_node_timeout: Duration,
    pub dry_run: bool,
    pub stream_cap_bytes: usize,
    pub failure_policy: FailurePolicy,
}

const KILL_GRACE: Duration = Duration::from_secs(3);

/// Shared run state: results land here as nodes finish, and every task reads
/// predecessor results from here to decide readiness and gather pipe input.
struct RunState {
    graph: Graph,
    results: Mutex<BTreeMap<String, NodeResult>>,
}

impl RunState {
    fn result_of(&self, id: &str) -> Option<NodeResult> {
        self.results.try_lock().ok().and_then(|m| m.get(id).cloned())
    }

    /// Like `result_of`, but awaits the lock instead of skipping a momentary
    /// contention window. Callers use this once a predecessor is already
    /// known-complete (e.g. observed via `result_of` in a readiness poll),
    /// so the wait is for the lock only, never for the result to appear.
    async fn result_of_await(&self, id: &str) -> Option<NodeResult> {
        self.results.lock().await.get(id).cloned()
    }
}

/// Runs the full graph to completion. Always returns exactly one
/// `NodeResult` per node — nodes cut off by cancellation or an ancestor's
/// failure still get a `cancelled` result.
pub async fn execute(
    graph: Graph,
    opts: ExecuteOptions,
    cancel: CancellationToken,
) -> Vec<NodeResult> {
    if opts.dry_run {
        return dry_run_results(&graph);
    }

    let order = match topological_order(&graph) {
        Some(order) => order,
        None => return Vec::new(), // builder guarantees acyclicity; defensive only.
    };

    let state = Arc::new(RunState {
        graph,
        results: Mutex::new(BTreeMap::new()),
    });
    let semaphore = Arc::new(Semaphore::new(opts.max_parallel.max(1)));
    let cancelled_by_failure = Arc::new(Mutex::new(false));

    // Tasks are spawned in topological order but run concurrently once
    // admitted; each task first awaits its own predecessors' results,
    // which are populated by earlier-completing sibling tasks.
    let mut handles = Vec::with_capacity(order.len());
    for node_id in order {
        let state = Arc::clone(&state);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let cancelled_by_failure = Arc::clone(&cancelled_by_failure);
        let opts = opts.clone();
        handles.push(tokio::spawn(async move {
            run_node(state, semaphore, cancel, cancelled_by_failure, opts, node_id).await
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    let results = state.results.lock().await;
    state
        .graph
        .nodes
        .iter()
        .filter_map(|n| results.get(&n.id).cloned())
        .collect()
}

fn dry_run_results(graph: &Graph) -> Vec<NodeResult> {
    let now = Utc::now();
    graph
        .nodes
        .iter()
        .map(|n| NodeResult {
            node_id: n.id.clone(),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            started_at: now,
            finished_at: now,
            interpretation: String::new(),
            error_kind: ErrorKind::None,
        })
        .collect()
}

async fn run_node(
    state: Arc<RunState>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    cancelled_by_failure: Arc<Mutex<bool>>,
    opts: ExecuteOptions,
    node_id: String,
) {
    let node = state.graph.node(&node_id).cloned().expect("node in order exists in graph");

    // Wait for every predecessor to reach a terminal state before admission.
    let predecessors: Vec<String> = state.graph.edges_into(&node_id).map(|e| e.from.clone()).collect();
    loop {
        if cancel.is_cancelled() {
            record_result(&state, cancelled_result(&node)).await;
            return;
        }
        let all_done = predecessors.iter().all(|p| state.result_of(p).is_some());
        if all_done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    if cancel.is_cancelled() {
        record_result(&state, cancelled_result(&node)).await;
        return;
    }
    if *cancelled_by_failure.lock().await && opts.failure_policy == FailurePolicy::Strict {
        record_result(&state, cancelled_result(&node)).await;
        return;
    }

    // A pipe predecessor that failed or was truncated poisons this node's
    // stdin; the consumer is marked cancelled rather than run against
    // truncated input. The predecessor is already known-complete (the
    // readiness loop above only exits once `result_of` observed it), so
    // this awaits the lock rather than risking a spurious `None` from
    // `try_lock` losing a race with a sibling's `record_result`.
    let pipe_input = match pipe_predecessor(&state.graph, &node_id) {
        Some(id) => state.result_of_await(&id).await,
        None => None,
    };
    if let Some(producer_result) = &pipe_input {
        if producer_result.error_kind.is_error() {
            record_result(&state, cancelled_result(&node)).await;
            return;
        }
    }
    let stdin_payload = pipe_input.map(|producer_result| producer_result.stdout);

    let Ok(_permit) = semaphore.acquire().await else {
        record_result(&state, cancelled_result(&node)).await;
        return;
    };

    let result = run_one(&node, stdin_payload, &opts, &cancel).await;
    if result.error_kind.is_error() && opts.failure_policy == FailurePolicy::Strict {
        *cancelled_by_failure.lock().await = true;
    }
    record_result(&state, result).await;
}

async fn record_result(state: &RunState, result: NodeResult) {
    state.results.lock().await.insert(result.node_id.clone(), result);
}

fn pipe_predecessor(graph: &Graph, node_id: &str) -> Option<String> {
    graph
        .edges_into(node_id)
        .find(|e| e.kind == EdgeKind::Pipe)
        .map(|e| e.from.clone())
}

fn cancelled_result(node: &Node) -> NodeResult {
    let now = Utc::now();
    NodeResult {
        node_id: node.id.clone(),
        stdout: String::new(),
        stderr: String::new(),
        exit_code: -1,
        started_at: now,
        finished_at: now,
        interpretation: String::new(),
        error_kind: ErrorKind::Cancelled,
    }
}

/// Spawns, feeds stdin, reads stdout/stderr concurrently, and waits for exit
/// — or times out / is cancelled, in which case the child is terminated
/// (SIGTERM) and, after a short grace period, force-killed.
async fn run_one(
    node: &Node,
    stdin_payload: Option<String>,
    opts: &ExecuteOptions,
    cancel: &CancellationToken,
) -> NodeResult {
    let started_at = Utc::now();
    let mut command = Command::new("bash");
    command
        .args(["-lc", &node.command])
        .stdin(if stdin_payload.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(node = node.id, error = %err, "failed to spawn node");
            return finish(node, started_at, String::new(), String::new(), -1, ErrorKind::SpawnFailed);
        }
    };
    // Child is owned entirely by a dedicated task from here on, so the
    // cancel/timeout branches below only ever need the pid to signal it —
    // never a second `&mut Child` alias.
    let pid = child.id();

    // Stdin is written concurrently with the stdout/stderr reads, not before
    // them: a consumer that emits output while still reading input (`cat`,
    // `grep`, `sort` with early matches) fills its stdout pipe and blocks on
    // write until something drains it, which would deadlock against a
    // fully-awaited stdin write for any payload larger than the OS pipe
    // buffer.
    let stdin_task = write_stdin(child.stdin.take(), stdin_payload);
    let cap = opts.stream_cap_bytes;
    let stdout_task = read_capped(child.stdout.take(), cap);
    let stderr_task = read_capped(child.stderr.take(), cap);

    let (tx, rx) = tokio::sync::oneshot::channel();
    let wait_handle = tokio::spawn(async move {
        let (status, _, stdout, stderr) = tokio::join!(child.wait(), stdin_task, stdout_task, stderr_task);
        let _ = tx.send((status, stdout, stderr, child));
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            terminate_by_pid(pid).await;
            let _ = wait_handle.await;
            finish(node, started_at, String::new(), String::new(), -1, ErrorKind::Cancelled)
        }
        _ = tokio::time::sleep(opts.per_node_timeout) => {
            terminate_by_pid(pid).await;
            let _ = wait_handle.await;
            finish(node, started_at, String::new(), String::new(), -1, ErrorKind::Timeout)
        }
        outcome = rx => {
            match outcome {
                Ok((Ok(status), stdout, stderr, _child)) => {
                    let exit_code = status.code().unwrap_or(-1);
                    let error_kind = if exit_code == 0 { ErrorKind::None } else { ErrorKind::NonzeroExit };
                    finish(node, started_at, stdout, stderr, exit_code, error_kind)
                }
                _ => finish(node, started_at, String::new(), String::new(), -1, ErrorKind::SpawnFailed),
            }
        }
    }
}

fn finish(
    node: &Node,
    started_at: chrono::DateTime<Utc>,
    stdout: String,
    stderr: String,
    exit_code: i32,
    error_kind: ErrorKind,
) -> NodeResult {
    NodeResult {
        node_id: node.id.clone(),
        stdout,
        stderr,
        exit_code,
        started_at,
        finished_at: Utc::now(),
        interpretation: String::new(),
        error_kind,
    }
}

async fn write_stdin(stdin: Option<impl tokio::io::AsyncWrite + Unpin>, payload: Option<String>) {
    let (Some(mut stdin), Some(payload)) = (stdin, payload) else { return };
    let _ = stdin.write_all(payload.as_bytes()).await;
    drop(stdin);
}

async fn read_capped(pipe: Option<impl tokio::io::AsyncRead + Unpin>, cap: usize) -> String {
    let Some(mut pipe) = pipe else { return String::new() };
    let mut buf = Vec::with_capacity(cap.min(8192));
    let mut chunk = [0u8; 8192];
    loop {
        if buf.len() >= cap {
            break;
        }
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n.min(cap - buf.len())]),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Sends SIGTERM by pid and gives the owning task a grace period to reap it
/// before the caller moves on; the task's own `Child::wait` eventually
/// reaps a still-running process even if this function returns first.
async fn terminate_by_pid(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    debug!(pid, "terminating node, escalating to kill after grace period");
    #[cfg(unix)]
    unsafe {
        libc_kill(pid as i32, 15); // SIGTERM
    }
    tokio::time::sleep(KILL_GRACE).await;
    #[cfg(unix)]
    unsafe {
        libc_kill(pid as i32, 9); // SIGKILL, in case SIGTERM was ignored
    }
}

#[cfg(unix)]
unsafe fn libc_kill(pid: i32, signal: i32) {
    // SAFETY: pid comes from a child process this task owns; kill(2)
    // failure (e.g. the process already exited) is not treated as fatal.
    unsafe {
        unsafe extern "C" {
            fn kill(pid: i32, sig: i32) -> i32;
        }
        kill(pid, signal);
    }
}

/// Kahn's algorithm with deterministic tie-breaking by node id: admission
/// order is topological, with ties broken lexicographically.
fn topological_order(graph: &Graph) -> Option<Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> = graph.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    for edge in &graph.edges {
        *indegree.get_mut(edge.to.as_str())? += 1;
    }

    let mut ready: std::collections::BTreeSet<&str> =
        indegree.iter().filter(|&(_, &d)| d == 0).map(|(&id, _)| id).collect();
    let mut order = Vec::with_capacity(graph.nodes.len());

    while let Some(&next) = ready.iter().next() {
        ready.remove(next);
        order.push(next.to_string());
        for edge in graph.edges_from(next) {
            let entry = indegree.get_mut(edge.to.as_str())?;
            *entry -= 1;
            if *entry == 0 {
                ready.insert(edge.to.as_str());
            }
        }
    }

    (order.len() == graph.nodes.len()).then_some(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, Node};
    use std::collections::BTreeMap as Map;

    fn node(id: &str, command: &str) -> Node {
        Node {
            id: id.to_string(),
            command: command.to_string(),
            inputs: Vec::new(),
            metadata: Map::new(),
        }
    }

    fn default_opts() -> ExecuteOptions {
        ExecuteOptions {
            max_parallel: 4,
            per_node_timeout: Duration::from_secs(5),
            dry_run: false,
            stream_cap_bytes: 4096,
            failure_policy: FailurePolicy::BestEffort,
        }
    }

    #[tokio::test]
    async fn single_node_success() {
        let graph = Graph {
            nodes: vec![node("a", "true")],
            edges: vec![],
        };
        let results = execute(graph, default_opts(), CancellationToken::new()).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[tokio::test]
    async fn nonzero_exit_is_node_local_not_fatal() {
        let graph = Graph {
            nodes: vec![node("a", "false")],
            edges: vec![],
        };
        let results = execute(graph, default_opts(), CancellationToken::new()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].error_kind, ErrorKind::NonzeroExit);
    }

    #[tokio::test]
    async fn pipe_edge_feeds_stdout_to_stdin() {
        let graph = Graph {
            nodes: vec![node("a", "echo hello"), node("b", "cat")],
            edges: vec![Edge {
                from: "a".to_string(),
                to: "b".to_string(),
                kind: EdgeKind::Pipe,
                rationale: String::new(),
            }],
        };
        let results = execute(graph, default_opts(), CancellationToken::new()).await;
        let b = results.iter().find(|r| r.node_id == "b").unwrap();
        assert_eq!(b.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn failed_pipe_producer_cancels_consumer() {
        let graph = Graph {
            nodes: vec![node("a", "exit 1"), node("b", "cat")],
            edges: vec![Edge {
                from: "a".to_string(),
                to: "b".to_string(),
                kind: EdgeKind::Pipe,
                rationale: String::new(),
            }],
        };
        let results = execute(graph, default_opts(), CancellationToken::new()).await;
        let b = results.iter().find(|r| r.node_id == "b").unwrap();
        assert_eq!(b.error_kind, ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn timeout_marks_node_timed_out() {
        let mut opts = default_opts();
        opts.per_node_timeout = Duration::from_millis(50);
        let graph = Graph {
            nodes: vec![node("a", "sleep 2")],
            edges: vec![],
        };
        let results = execute(graph, opts, CancellationToken::new()).await;
        assert_eq!(results[0].error_kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn dry_run_never_spawns() {
        let graph = Graph {
            nodes: vec![node("a", "this-command-does-not-exist-xyz")],
            edges: vec![],
        };
        let mut opts = default_opts();
        opts.dry_run = true;
        let results = execute(graph, opts, CancellationToken::new()).await;
        assert_eq!(results[0].exit_code, 0);
        assert_eq!(results[0].error_kind, ErrorKind::None);
    }

    #[tokio::test]
    async fn cancellation_before_start_marks_node_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let graph = Graph {
            nodes: vec![node("a", "true")],
            edges: vec![],
        };
        let results = execute(graph, default_opts(), cancel).await;
        assert_eq!(results[0].error_kind, ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn large_pipe_payload_does_not_deadlock_against_a_draining_consumer() {
        // `grep` starts emitting matches before it has finished reading
        // stdin; a producer larger than the OS pipe buffer (~64 KiB)
        // exercises the stdin-writer/stdout-reader concurrency fix.
        let mut opts = default_opts();
        opts.per_node_timeout = Duration::from_secs(10);
        opts.stream_cap_bytes = 8 * 1024 * 1024;
        let graph = Graph {
            nodes: vec![
                node("a", "for i in $(seq 1 20000); do echo \"line $i\"; done"),
                node("b", "grep line"),
            ],
            edges: vec![Edge {
                from: "a".to_string(),
                to: "b".to_string(),
                kind: EdgeKind::Pipe,
                rationale: String::new(),
            }],
        };
        let results = tokio::time::timeout(
            Duration::from_secs(15),
            execute(graph, opts, CancellationToken::new()),
        )
        .await
        .expect("execution must not hang on a large pipe payload");
        let b = results.iter().find(|r| r.node_id == "b").unwrap();
        assert_eq!(b.error_kind, ErrorKind::None);
        assert_eq!(b.stdout.lines().count(), 20000);
    }

    #[tokio::test]
    async fn max_parallel_one_collapses_to_strict_sequential() {
        let mut opts = default_opts();
        opts.max_parallel = 1;
        let graph = Graph {
            nodes: vec![node("a", "true"), node("b", "true"), node("c", "true")],
            edges: vec![],
        };
        let results = execute(graph, opts, CancellationToken::new()).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn topological_order_breaks_ties_by_node_id() {
        let graph = Graph {
            nodes: vec![node("zeta", "true"), node("alpha", "true")],
            edges: vec![],
        };
        let order = topological_order(&graph).unwrap();
        assert_eq!(order, vec!["alpha", "zeta"]);
    }
}
