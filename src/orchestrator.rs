//! Orchestrator Facade (C8): binds search → DAG building → execution into
//! one call per user request, and owns the process-scoped dependencies
//! (vector index, embedder, reasoning client) that the rest of the engine
//! treats as look-like-globals-but-aren't.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::exec::{self, ExecuteOptions, FailurePolicy};
use crate::error::EngineError;
use crate::graph::{builder, plan};
use crate::index::embedding::EmbeddingProvider;
use crate::index::vector_store::VectorIndex;
use crate::reasoning::client::{CompletionParams, ReasoningClient};
use crate::reasoning::Reasoner;
use crate::search;
use crate::types::{ExecutionTrace, OverallStatus, ReasoningSummary};

pub struct SolveOptions {
    pub limit: usize,
    pub threshold: f32,
    pub dry_run: bool,
    pub max_parallel: usize,
    pub failure_policy: FailurePolicy,
}

impl SolveOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            limit: config.search_limit,
            threshold: config.search_threshold,
            dry_run: false,
            max_parallel: config.max_parallel,
            failure_policy: FailurePolicy::default(),
        }
    }
}

pub struct QueryOptions {
    pub dry_run: bool,
    pub max_parallel: usize,
    pub plan_only: bool,
}

impl QueryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dry_run: false,
            max_parallel: config.max_parallel,
            plan_only: false,
        }
    }
}

pub struct Orchestrator {
    embedder: EmbeddingProvider,
    index: VectorIndex,
    reasoner: Reasoner,
    config: Config,
}

impl Orchestrator {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let index = VectorIndex::open(config.index_path())?;
        let embedder = EmbeddingProvider::new(&config.reasoning_model);
        let client = ReasoningClient::new(config.reasoning_base_url())?;
        let params = CompletionParams {
            model: config.reasoning_model.clone(),
            max_tokens: 128,
            temperature: 0.2,
            stop: vec!["\n\n".to_string()],
        };
        let reasoner = Reasoner::new(client, params);
        Ok(Self {
            embedder,
            index,
            reasoner,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The orchestration-mode entry point: `prompt -> search -> DAG -> run`.
    pub async fn solve(
        &mut self,
        prompt: &str,
        opts: SolveOptions,
        cancel: CancellationToken,
    ) -> Result<ExecutionTrace, EngineError> {
        if prompt.trim().is_empty() {
            return Err(EngineError::InvalidInput("prompt must not be empty".to_string()));
        }
        if self.index.count() == 0 {
            return Err(EngineError::IndexUnavailable(
                "vector index is empty; run the indexer first".to_string(),
            ));
        }

        let candidates = search::search(
            &mut self.embedder,
            &self.index,
            &self.reasoner,
            prompt,
            opts.limit,
            opts.threshold,
        )
        .await;

        if candidates.is_empty() {
            return Ok(ExecutionTrace::empty_failed(prompt));
        }

        let graph = builder::build(prompt, &candidates, &self.reasoner).await;
        let plan_nodes: BTreeMap<String, String> = candidates
            .iter()
            .map(|c| (c.command.name.clone(), c.rationale.clone()))
            .collect();
        let edge_rationale: BTreeMap<String, String> = graph
            .edges
            .iter()
            .map(|e| (format!("{}\u{2192}{}", e.from, e.to), e.rationale.clone()))
            .collect();

        let exec_opts = ExecuteOptions {
            max_parallel: opts.max_parallel,
            per_node_timeout: self.config.node_timeout,
            dry_run: opts.dry_run,
            stream_cap_bytes: self.config.stream_cap_bytes,
            failure_policy: opts.failure_policy,
        };
        let results =
            exec::execute_with_interpretation(graph.clone(), exec_opts, cancel.clone(), &self.reasoner).await;

        let execution_results: BTreeMap<String, String> = results
            .iter()
            .map(|r| (r.node_id.clone(), r.interpretation.clone()))
            .collect();

        let overall_status = OverallStatus::derive(&results, cancel.is_cancelled());
        Ok(ExecutionTrace {
            prompt: prompt.to_string(),
            candidates,
            graph,
            results,
            overall_status,
            reasoning: ReasoningSummary {
                plan_nodes,
                edges: edge_rationale,
                execution_results,
            },
        })
    }

    /// The plan-mode entry point: `statement -> classify -> plan -> compile -> run`.
    pub async fn query(
        &mut self,
        statement: &str,
        opts: QueryOptions,
        cancel: CancellationToken,
    ) -> Result<ExecutionTrace, EngineError> {
        if statement.trim().is_empty() {
            return Err(EngineError::InvalidInput("statement must not be empty".to_string()));
        }

        let (domain, intent) = plan::classify_intent(statement);
        let built_plan = plan::build_plan(&domain, &intent);
        let graph = plan::compile(&built_plan, &self.reasoner).await;

        let plan_nodes: BTreeMap<String, String> = graph
            .nodes
            .iter()
            .map(|n| {
                let note = n.metadata.get("note").cloned().unwrap_or_default();
                (n.id.clone(), note)
            })
            .collect();
        let edge_rationale: BTreeMap<String, String> = graph
            .edges
            .iter()
            .map(|e| (format!("{}\u{2192}{}", e.from, e.to), e.rationale.clone()))
            .collect();

        if opts.plan_only {
            return Ok(ExecutionTrace {
                prompt: statement.to_string(),
                candidates: Vec::new(),
                graph,
                results: Vec::new(),
                overall_status: OverallStatus::Ok,
                reasoning: ReasoningSummary {
                    plan_nodes,
                    edges: edge_rationale,
                    execution_results: BTreeMap::new(),
                },
            });
        }

        let exec_opts = ExecuteOptions {
            max_parallel: opts.max_parallel,
            per_node_timeout: self.config.node_timeout,
            dry_run: opts.dry_run,
            stream_cap_bytes: self.config.stream_cap_bytes,
            failure_policy: FailurePolicy::default(),
        };
        let results =
            exec::execute_with_interpretation(graph.clone(), exec_opts, cancel.clone(), &self.reasoner).await;

        let execution_results: BTreeMap<String, String> = results
            .iter()
            .map(|r| (r.node_id.clone(), r.interpretation.clone()))
            .collect();

        let overall_status = OverallStatus::derive(&results, cancel.is_cancelled());
        Ok(ExecutionTrace {
            prompt: statement.to_string(),
            candidates: Vec::new(),
            graph,
            results,
            overall_status,
            reasoning: ReasoningSummary {
                plan_nodes,
                edges: edge_rationale,
                execution_results,
            },
        })
    }
}
