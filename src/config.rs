//! Single assembly point for every tunable named in the external interfaces
//! section. Precedence is CLI flags > environment > `--config` file >
//! built-in default — flags are applied by the caller after `Config::load`.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_REASONING_HOST: &str = "localhost";
const DEFAULT_REASONING_PORT: u16 = 1500;
const DEFAULT_REASONING_MODEL: &str = "mistral";
const DEFAULT_NODE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STREAM_CAP_BYTES: usize = 256 * 1024;
const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_SEARCH_THRESHOLD: f32 = 0.3;
const MAX_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct Config {
    pub reasoning_host: String,
    pub reasoning_port: u16,
    pub reasoning_model: String,
    pub node_timeout: Duration,
    pub stream_cap_bytes: usize,
    pub max_parallel: usize,
    pub search_limit: usize,
    pub search_threshold: f32,
    pub data_dir: PathBuf,
}

/// Optional TOML overlay, read once at startup from `--config`/`ORCHESTRATE_CONFIG`.
#[derive(Debug, Default, Deserialize)]
struct FileOverlay {
    reasoning_host: Option<String>,
    reasoning_port: Option<u16>,
    reasoning_model: Option<String>,
    node_timeout_secs: Option<u64>,
    max_parallel: Option<usize>,
    search_limit: Option<usize>,
    search_threshold: Option<f32>,
}

impl Config {
    /// Resolves config from environment, an optional file overlay, and
    /// built-in defaults, in that precedence order.
    pub fn load(config_path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let default_path = default_config_path();
        let overlay = match config_path.or(default_path.as_deref()) {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)?
            }
            _ => FileOverlay::default(),
        };

        let reasoning_host = env_string("ORCHESTRATE_REASONING_HOST")
            .or(overlay.reasoning_host)
            .unwrap_or_else(|| DEFAULT_REASONING_HOST.to_string());
        let reasoning_port = env_parsed("ORCHESTRATE_REASONING_PORT")
            .or(overlay.reasoning_port)
            .unwrap_or(DEFAULT_REASONING_PORT);
        let reasoning_model = env_string("ORCHESTRATE_REASONING_MODEL")
            .or(overlay.reasoning_model)
            .unwrap_or_else(|| DEFAULT_REASONING_MODEL.to_string());
        let node_timeout_secs = env_parsed("ORCHESTRATE_NODE_TIMEOUT_SECS")
            .or(overlay.node_timeout_secs)
            .unwrap_or(DEFAULT_NODE_TIMEOUT_SECS);
        let max_parallel = env_parsed("ORCHESTRATE_MAX_PARALLEL")
            .or(overlay.max_parallel)
            .unwrap_or_else(default_max_parallel);
        let search_limit = env_parsed("ORCHESTRATE_SEARCH_LIMIT")
            .or(overlay.search_limit)
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .min(MAX_SEARCH_LIMIT);
        let search_threshold = env_parsed("ORCHESTRATE_THRESHOLD")
            .or(overlay.search_threshold)
            .unwrap_or(DEFAULT_SEARCH_THRESHOLD);

        let data_dir = env_string("ORCHESTRATE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Ok(Config {
            reasoning_host,
            reasoning_port,
            reasoning_model,
            node_timeout: Duration::from_secs(node_timeout_secs),
            stream_cap_bytes: DEFAULT_STREAM_CAP_BYTES,
            max_parallel: max_parallel.clamp(2, 16),
            search_limit,
            search_threshold,
            data_dir,
        })
    }

    pub fn reasoning_base_url(&self) -> String {
        format!("http://{}:{}", self.reasoning_host, self.reasoning_port)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("index.json")
    }
}

fn default_config_path() -> Option<PathBuf> {
    std::env::var("ORCHESTRATE_CONFIG").ok().map(PathBuf::from)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("orchestrate")
}

fn default_max_parallel() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
