use crate::memory::fit::FitStrategy;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fs, net::SocketAddr, path::Path, time::Duration};

/// Env var naming a JSON config file when `--config` is not given.
pub const CONFIG_ENV: &str = "MEMSIM_CONFIG";

/// Runtime settings for the simulator and its drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Size of the dynamic region in KB; 0 disables it.
    pub total_memory_kb: usize,
    /// Fixed partitions of the static region; empty disables it.
    pub static_partitions_kb: Vec<usize>,
    pub strategy: FitStrategy,
    pub tick_interval_ms: u64,
    pub listen_addr: SocketAddr,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            total_memory_kb: 1024,
            static_partitions_kb: Vec::new(),
            strategy: FitStrategy::First,
            tick_interval_ms: 1000,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Pure dynamic layout of `total_memory_kb` KB, defaults elsewhere.
    pub fn with_memory(total_memory_kb: usize) -> Self {
        Config {
            total_memory_kb,
            ..Config::default()
        }
    }

    /// Load from `path`, or from `$MEMSIM_CONFIG`, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var(CONFIG_ENV).ok();
        let path = path.or(from_env.as_deref().map(Path::new));
        let config = match path {
            Some(p) => {
                let raw = fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config {}", p.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config {}", p.display()))?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_memory_kb == 0 && self.static_partitions_kb.is_empty() {
            bail!("Config has no memory: set total_memory_kb or static_partitions_kb");
        }
        if self.static_partitions_kb.iter().any(|&s| s == 0) {
            bail!("Static partitions must be at least 1KB");
        }
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be positive");
        }
        self.log_level
            .parse::<tracing::Level>()
            .map_err(|_| anyhow::anyhow!("Unknown log level '{}'", self.log_level))?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
