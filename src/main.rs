use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use orchestrate::cli::{Cli, Command};
use orchestrate::config::Config;
use orchestrate::error::EngineError;
use orchestrate::index::embedding::EmbeddingProvider;
use orchestrate::index::vector_store::VectorIndex;
use orchestrate::index::Indexer;
use orchestrate::orchestrator::{Orchestrator, QueryOptions, SolveOptions};
use orchestrate::trace::{self, Format};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            eprintln!("error: {err}");
            return 4;
        }
    };

    match cli.command {
        Command::Solve {
            prompt,
            format,
            limit,
            threshold,
            explain,
            dry_run,
        } => run_solve(config, prompt, format, limit, threshold, explain, dry_run).await,
        Command::Query {
            statement,
            explain,
            format,
            plan_only,
        } => run_query(config, statement, explain, format, plan_only).await,
        Command::Index { refresh } => run_index(config, refresh).await,
    }
}

async fn run_solve(
    config: Config,
    prompt: String,
    format: String,
    limit: Option<usize>,
    threshold: Option<f32>,
    explain: bool,
    dry_run: bool,
) -> i32 {
    let format: Format = match format.parse() {
        Ok(format) => format,
        Err(err) => {
            eprintln!("error: {err}");
            return 4;
        }
    };

    let mut opts = SolveOptions::from_config(&config);
    if let Some(limit) = limit {
        opts.limit = limit;
    }
    if let Some(threshold) = threshold {
        opts.threshold = threshold;
    }
    opts.dry_run = dry_run;

    let mut orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize orchestrator");
            eprintln!("error: {err}");
            return 2;
        }
    };

    let cancel = install_cancel_handler();
    match orchestrator.solve(&prompt, opts, cancel).await {
        Ok(trace) => emit_trace(&trace, format, explain),
        Err(err) => emit_engine_error(err),
    }
}

async fn run_query(config: Config, statement: String, explain: bool, format: String, plan_only: bool) -> i32 {
    let format: Format = match format.parse() {
        Ok(format) => format,
        Err(err) => {
            eprintln!("error: {err}");
            return 4;
        }
    };

    let mut opts = QueryOptions::from_config(&config);
    opts.plan_only = plan_only;

    let mut orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize orchestrator");
            eprintln!("error: {err}");
            return 2;
        }
    };

    let cancel = install_cancel_handler();
    match orchestrator.query(&statement, opts, cancel).await {
        Ok(trace) => emit_trace(&trace, format, explain),
        Err(err) => emit_engine_error(err),
    }
}

async fn run_index(config: Config, refresh: Option<String>) -> i32 {
    let index = match VectorIndex::open(config.index_path()) {
        Ok(index) => index,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };
    let mut indexer = Indexer::new(EmbeddingProvider::new(&config.reasoning_model), index);

    let outcome = match refresh {
        Some(name) => indexer.refresh(&name).map(|changed| {
            println!("refreshed `{name}`, changed={changed}");
        }),
        None => indexer.build_index().map(|(written, skipped)| {
            println!("indexed {written} commands, skipped {skipped}");
        }),
    };

    match outcome {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "index build failed");
            eprintln!("error: {err}");
            2
        }
    }
}

fn emit_trace(trace: &orchestrate::types::ExecutionTrace, format: Format, explain: bool) -> i32 {
    let exit_code = trace.overall_status.exit_code();
    match orchestrate::trace::render(trace, format) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => {
            eprintln!("error: failed to render trace: {err}");
            return 2;
        }
    }
    if explain && format != Format::Text {
        if let Ok(text) = trace::render(trace, Format::Text) {
            eprintln!("\n{text}");
        }
    }
    exit_code
}

fn emit_engine_error(err: EngineError) -> i32 {
    tracing::error!(error = %err, "engine error");
    eprintln!("error: {err}");
    err.exit_code()
}

/// Wires `SIGINT` to a `CancellationToken` shared with the executor, per
/// the cancellation semantics in the concurrency model.
fn install_cancel_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handler_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handler_cancel.cancel();
        }
    });
    cancel
}
