use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{error, info};
use wayfinder_navigation::NavigationConfig;
use wayfinder_navigation::grid::TerrainLayout;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// One scripted agent: where it spawns and where it is sent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSpawn {
    pub start: [f32; 2],
    pub destination: [f32; 2],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub agents: Vec<AgentSpawn>,
    /// Agents that keep picking random destinations.
    pub wanderers: usize,
    /// Half size of the square wanderers spawn and roam in.
    pub wander_extent: f32,
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            agents: Vec::new(),
            wanderers: 4,
            wander_extent: 20.0,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub tick_hz: f32,
    pub duration_secs: f32,
    /// Publish poses every this many ticks.
    pub publish_every: u64,
    pub report_interval_ms: u64,
    /// Monitor raises a fault when no tick happened for this long.
    pub stall_timeout_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            tick_hz: 50.0,
            duration_secs: 20.0,
            publish_every: 5,
            report_interval_ms: 1000,
            stall_timeout_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub navigation: NavigationConfig,
    pub terrain: TerrainLayout,
    pub scenario: ScenarioConfig,
    pub simulation: LoopConfig,
}

/// Loads the simulation settings from a TOML file, overridden by
/// `WAYFINDER__<SECTION>__<KEY>` environment variables.
pub fn load_config(path: &str) -> Result<SimulationConfig, ConfigError> {
    info!("Attempting to load configuration from {}", path);

    let settings = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(true))
        .add_source(Environment::with_prefix("WAYFINDER").prefix_separator("__").separator("__"))
        .build()
        .and_then(|c| c.try_deserialize::<SimulationConfig>());

    match settings {
        Ok(config) => {
            info!(
                agents = config.scenario.agents.len(),
                wanderers = config.scenario.wanderers,
                obstacles = config.terrain.obstacles.len(),
                "Successfully loaded configuration"
            );
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_default_file() {
        let config = load_config(DEFAULT_CONFIG_PATH).unwrap();
        assert!(config.navigation.validate().is_ok());
        assert!(!config.scenario.agents.is_empty());
        assert!(config.simulation.tick_hz > 0.0);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config("config/does-not-exist.toml").is_err());
    }
}
