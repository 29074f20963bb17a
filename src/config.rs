use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "dashboard-gateway")]
#[command(about = "API gateway for the agent leaderboard dashboard")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Upstream leaderboard ranking endpoint
    #[arg(
        long,
        env = "RANKING_URL",
        default_value = "https://api.virtuals.io/api/agdp-leaderboard-epochs/1/ranking?pagination[pageSize]=1000"
    )]
    pub ranking_url: String,

    // How long fetched rankings are reused, in seconds
    #[arg(long, default_value_t = 300)]
    pub ranking_ttl: u64,

    // OpenAI-compatible chat completions endpoint
    #[arg(
        long,
        env = "LLM_URL",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    pub llm_url: String,

    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    // Bearer token for the LLM; insight routes answer 500 without it
    #[arg(long, env = "LLM_AUTH_TOKEN", hide_env_values = true)]
    pub llm_token: Option<String>,

    // Blockchain analytics (Dune) API base URL
    #[arg(long, env = "ANALYTICS_URL", default_value = "https://api.dune.com/api/v1")]
    pub analytics_url: String,

    // Analytics API key; the onchain route answers 500 without it
    #[arg(long, env = "DUNE_API_KEY", hide_env_values = true)]
    pub analytics_key: Option<String>,

    // Exact origins allowed to call guarded routes (comma-separated)
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        default_value = "https://virtuals-dashboard.vercel.app,http://localhost:3000,http://localhost:3001"
    )]
    pub allowed_origins: String,

    // Domain suffix of preview deployments (comma-separated)
    #[arg(long, env = "TRUSTED_SUFFIX", default_value = ".vercel.app")]
    pub trusted_suffix: String,

    // JSON file overriding the per-endpoint guard table
    #[arg(long, env = "GUARD_CONFIG")]
    pub guard_config: Option<PathBuf>,
}

// split "a, b,,c" into ["a", "b", "c"]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Static limits for one guarded endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GuardConfig {
    pub rate_per_minute: u32, // per client IP
    pub daily_budget: u64,    // all clients combined
    #[serde(default)]
    pub max_body_size: Option<usize>,
}

impl GuardConfig {
    pub const fn new(rate_per_minute: u32, daily_budget: u64, max_body_size: Option<usize>) -> Self {
        Self {
            rate_per_minute,
            daily_budget,
            max_body_size,
        }
    }
}

pub const DEFAULT_GUARD: GuardConfig = GuardConfig::new(5, 200, None);

// File format for --guard-config
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GuardFile {
    #[serde(default)]
    endpoints: HashMap<String, GuardConfig>,
    #[serde(default)]
    default: Option<GuardConfig>,
}

// Endpoint name -> limits, with a fallback for unlisted endpoints
#[derive(Debug, Clone)]
pub struct EndpointTable {
    endpoints: HashMap<String, GuardConfig>,
    fallback: GuardConfig,
}

impl Default for EndpointTable {
    fn default() -> Self {
        let endpoints = HashMap::from([
            ("analyze".to_string(), GuardConfig::new(3, 200, Some(1024))),
            ("translate".to_string(), GuardConfig::new(10, 500, Some(5120))),
            ("gap-score".to_string(), GuardConfig::new(5, 300, None)),
        ]);
        Self {
            endpoints,
            fallback: DEFAULT_GUARD,
        }
    }
}

impl EndpointTable {
    pub fn get(&self, endpoint: &str) -> GuardConfig {
        self.endpoints.get(endpoint).copied().unwrap_or(self.fallback)
    }

    #[cfg(test)]
    pub fn with_endpoint(mut self, name: &str, config: GuardConfig) -> Self {
        self.endpoints.insert(name.to_string(), config);
        self
    }

    // Built-in table, with entries from `path` layered on top
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut table = Self::default();
        let Some(path) = path else {
            return Ok(table);
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: GuardFile = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        table.endpoints.extend(file.endpoints);
        if let Some(fallback) = file.default {
            table.fallback = fallback;
        }
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let all = self
            .endpoints
            .iter()
            .map(|(name, c)| (name.as_str(), c))
            .chain(std::iter::once(("default", &self.fallback)));
        for (name, config) in all {
            if config.rate_per_minute == 0 {
                return Err(ConfigError::Invalid(format!("{name}: ratePerMinute must be at least 1")));
            }
            if config.daily_budget == 0 {
                return Err(ConfigError::Invalid(format!("{name}: dailyBudget must be at least 1")));
            }
        }
        Ok(())
    }
}
