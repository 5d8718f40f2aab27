//! Command-line surface: `orchestrate solve` and `orchestrate query`, matching
//! the external interfaces section's flag and exit-code table.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "orchestrate", version, about = "Prompt-to-shell-DAG orchestration engine")]
pub struct Cli {
    /// Overrides the TOML config file path (also settable via ORCHESTRATE_CONFIG).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Orchestration mode: prompt -> semantic search -> DAG -> run.
    Solve {
        prompt: String,

        #[arg(long, default_value = "text")]
        format: String,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        threshold: Option<f32>,

        /// Print per-node selection/edge rationale alongside results.
        #[arg(long)]
        explain: bool,

        /// Build the graph and synthesize results without spawning processes.
        #[arg(long)]
        dry_run: bool,
    },

    /// Plan mode: problem statement -> hand-authored diagnostic plan -> run.
    Query {
        statement: String,

        #[arg(long)]
        explain: bool,

        #[arg(long, default_value = "yaml")]
        format: String,

        /// Compile and print the plan without running it.
        #[arg(long)]
        plan_only: bool,
    },

    /// Builds or refreshes the manual-page index.
    Index {
        /// Re-index a single command instead of the whole corpus.
        #[arg(long)]
        refresh: Option<String>,
    },
}
