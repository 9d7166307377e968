//! YAML Configuration Structures for the scheduler simulator

use common::types::{Bandwidth, CellId};
use mac::{EstimationMode, MacError, SchedulerConfig};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Top-level simulator configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EnbConfig {
    /// Cell configuration
    #[serde(default)]
    pub cell: CellSection,
    /// Scheduler tuning
    #[serde(default)]
    pub scheduler: SchedulerSection,
    /// Simulation run parameters
    #[serde(default)]
    pub simulation: SimulationSection,
    /// Logging configuration
    #[serde(default)]
    pub log: LogSection,
}

/// Cell configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CellSection {
    /// Cell ID
    #[serde(default = "default_cell_id")]
    pub cell_id: u16,
    /// Channel bandwidth in MHz (1, 3, 5, 10, 15, 20)
    #[serde(rename = "bandwidth_MHz", default = "default_bandwidth_mhz")]
    pub bandwidth_mhz: u32,
    /// Number of TX antenna ports
    #[serde(default = "default_num_tx_antennas")]
    pub num_tx_antennas: usize,
}

impl Default for CellSection {
    fn default() -> Self {
        Self {
            cell_id: default_cell_id(),
            bandwidth_mhz: default_bandwidth_mhz(),
            num_tx_antennas: default_num_tx_antennas(),
        }
    }
}

fn default_cell_id() -> u16 {
    1
}

fn default_bandwidth_mhz() -> u32 {
    5
}

fn default_num_tx_antennas() -> usize {
    4
}

/// Scheduler tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerSection {
    /// Exponential smoothing factor for the throughput history
    #[serde(default = "default_throughput_smoothing")]
    pub throughput_smoothing: f64,
    /// Exponent on the throughput history in the PF metric
    #[serde(default = "default_history_exponent")]
    pub history_exponent: f64,
    /// Fill leftover capacity with new transmissions
    #[serde(default = "default_fill_grid")]
    pub fill_grid: bool,
    /// SINR estimation for non-preferred resources: perfect, innerproduct, no
    #[serde(default = "default_estimate_other")]
    pub estimate_other: String,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            throughput_smoothing: default_throughput_smoothing(),
            history_exponent: default_history_exponent(),
            fill_grid: default_fill_grid(),
            estimate_other: default_estimate_other(),
        }
    }
}

fn default_throughput_smoothing() -> f64 {
    0.05
}

fn default_history_exponent() -> f64 {
    1.0
}

fn default_fill_grid() -> bool {
    true
}

fn default_estimate_other() -> String {
    "innerproduct".to_string()
}

/// Simulation run parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSection {
    /// Number of TTIs to run
    #[serde(default = "default_num_ttis")]
    pub num_ttis: u64,
    /// Number of active UEs
    #[serde(default = "default_num_ues")]
    pub num_ues: u32,
    /// Probability that a scheduled new transmission is NACKed
    #[serde(default = "default_nack_probability")]
    pub nack_probability: f64,
    /// Seed for the synthetic channel
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// TTI tick period in microseconds; 0 runs back to back
    #[serde(default = "default_tti_period_us")]
    pub tti_period_us: u64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            num_ttis: default_num_ttis(),
            num_ues: default_num_ues(),
            nack_probability: default_nack_probability(),
            seed: default_seed(),
            tti_period_us: default_tti_period_us(),
        }
    }
}

fn default_num_ttis() -> u64 {
    100
}

fn default_num_ues() -> u32 {
    8
}

fn default_nack_probability() -> f64 {
    0.1
}

fn default_seed() -> u64 {
    42
}

fn default_tti_period_us() -> u64 {
    0
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogSection {
    /// Log level for all targets
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EnbConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: EnbConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Derive the scheduler configuration, validating bandwidth and mode
    pub fn scheduler_config(&self) -> anyhow::Result<SchedulerConfig> {
        let bandwidth = Bandwidth::from_u32(self.cell.bandwidth_mhz).ok_or_else(|| {
            MacError::InvalidConfiguration(format!(
                "unsupported bandwidth: {} MHz",
                self.cell.bandwidth_mhz
            ))
        })?;
        let estimation: EstimationMode = self.scheduler.estimate_other.parse()?;

        Ok(SchedulerConfig {
            cell_id: CellId(self.cell.cell_id),
            bandwidth,
            num_tx_antennas: self.cell.num_tx_antennas,
            throughput_smoothing: self.scheduler.throughput_smoothing,
            history_exponent: self.scheduler.history_exponent,
            fill_grid: self.scheduler.fill_grid,
            estimation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_produce_valid_scheduler_config() {
        let config = EnbConfig::default();
        let scheduler = config.scheduler_config().unwrap();
        assert_eq!(scheduler.bandwidth, Bandwidth::Bw5);
        assert_eq!(scheduler.estimation, EstimationMode::InnerProduct);
        assert!(scheduler.fill_grid);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
cell:
  cell_id: 3
  bandwidth_MHz: 10
scheduler:
  estimate_other: perfect
  fill_grid: false
simulation:
  num_ttis: 10
  num_ues: 4
"#;
        let config: EnbConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cell.cell_id, 3);
        assert_eq!(config.simulation.num_ues, 4);

        let scheduler = config.scheduler_config().unwrap();
        assert_eq!(scheduler.bandwidth, Bandwidth::Bw10);
        assert_eq!(scheduler.estimation, EstimationMode::Perfect);
        assert!(!scheduler.fill_grid);
    }

    #[test]
    fn test_invalid_bandwidth_rejected() {
        let config = EnbConfig {
            cell: CellSection {
                bandwidth_mhz: 7,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.scheduler_config().is_err());
    }

    #[test]
    fn test_invalid_estimation_mode_rejected() {
        let config = EnbConfig {
            scheduler: SchedulerSection {
                estimate_other: "guesswork".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.scheduler_config().is_err());
    }
}
