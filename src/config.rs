use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use swarm_dispatch::budget::PricingConfig;
use swarm_dispatch::graph::DanglingPolicy;
use swarm_dispatch::scheduler::QuotaConfig;
use swarm_dispatch::simulate::SimulationConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default env_logger filter when `RUST_LOG` is unset
    pub log_level: Option<String>,
    pub quotas: QuotaConfig,
    pub budget: BudgetConfig,
    pub pricing: PricingConfig,
    pub checkpoint: CheckpointConfig,
    pub simulation: SimulationConfig,
    pub planning: PlanningConfig,
    /// Gate name -> target score; dispatch stops once every target is met
    pub gates: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub ceiling_usd: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self { ceiling_usd: 50.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub dir: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".swarm/checkpoints"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    pub allow_dangling_dependencies: bool,
    pub auto_spawn_budget: u32,
    /// Release work in waves instead of continuously
    pub barrier: bool,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            allow_dangling_dependencies: false,
            auto_spawn_budget: 5,
            barrier: false,
        }
    }
}

impl PlanningConfig {
    pub fn dangling_policy(&self) -> DanglingPolicy {
        if self.allow_dangling_dependencies {
            DanglingPolicy::Allow
        } else {
            DanglingPolicy::Reject
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            quotas: QuotaConfig::default(),
            budget: BudgetConfig::default(),
            pricing: PricingConfig::default(),
            checkpoint: CheckpointConfig::default(),
            simulation: SimulationConfig::default(),
            planning: PlanningConfig::default(),
            gates: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.quotas.max_total_parallel, 8);
        assert_eq!(config.budget.ceiling_usd, 50.0);
        assert_eq!(config.checkpoint.dir, PathBuf::from(".swarm/checkpoints"));
        assert_eq!(config.simulation.probe_interval_minutes, 15);
        assert_eq!(config.planning.auto_spawn_budget, 5);
        assert_eq!(config.planning.dangling_policy(), DanglingPolicy::Reject);
        assert!(config.gates.is_empty());
        assert_eq!(config.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn test_log_level_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("swarm-dispatch.yml");
        fs::write(&path, "log_level: debug\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.quotas.max_total_parallel, 8);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("swarm-dispatch.yml");
        fs::write(
            &path,
            "quotas:\n  max_parallel_foreground: 1\nplanning:\n  barrier: true\n  allow_dangling_dependencies: true\ngates:\n  coverage: 0.8\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.quotas.max_parallel_foreground, 1);
        assert_eq!(config.quotas.max_parallel_background, 6);
        assert!(config.planning.barrier);
        assert_eq!(config.planning.auto_spawn_budget, 5);
        assert_eq!(config.planning.dangling_policy(), DanglingPolicy::Allow);
        assert_eq!(config.gates.get("coverage"), Some(&0.8));
        assert_eq!(config.budget.ceiling_usd, 50.0);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
