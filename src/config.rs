//! Simulation configuration: JSON file parsed into typed sections.
//!
//! The factories (queue, application, traffic generator, distribution) pattern
//! match on the `type`/`policy` strings carried here, so unknown variants fail
//! at construction with a [`SimError::Config`] naming the offending value.

use crate::distributions::Distribution;
use crate::error::{Result, SimError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Queueing policy name. Required unless running in dry-run mode (which
    /// forces FCFS regardless).
    pub policy: Option<String>,
    /// Simulation cap on innocent arrivals. Must be set iff the innocent
    /// traffic is not trace-driven.
    pub max_num_arrivals: Option<u64>,
    pub application: AppConfig,
    pub innocent_traffic: TrafficConfig,
    pub attack_traffic: Option<TrafficConfig>,
    /// Parameters for the `hffs` policy; ignored by every other policy.
    #[serde(default)]
    pub hffs: HffsConfig,
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<SimulationConfig> {
        let text = fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("cannot read {}: {e}", path.display())))?;
        SimulationConfig::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<SimulationConfig> {
        serde_json::from_str(text).map_err(|e| SimError::Config(e.to_string()))
    }
}

/// Application section (`application.*` keys).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "type")]
    pub kind: String,
    /// Estimate job sizes heuristically instead of precomputing them during
    /// estimation. Only meaningful for `tcp_reassembly`.
    #[serde(default)]
    pub heuristic: bool,
    /// Service-time scale factor applied when converting application service
    /// time to a job size in nanoseconds.
    pub stsf: f64,
    /// Maximum job size (in ns) an attacker may use.
    pub max_attack_job_size_ns: f64,
    /// Job-size distribution for `iid_job_sizes`.
    pub job_size_ns_dist: Option<DistConfig>,
}

/// Traffic-generator section (`innocent_traffic` / `attack_traffic`).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrafficConfig {
    Synthetic {
        rate_bps: Option<f64>,
        #[serde(default = "default_num_flows")]
        num_flows: u32,
        /// Innocent generators: sampled per-packet size.
        packet_size_bits_dist: Option<DistConfig>,
        /// Attack generators: fixed packet size.
        packet_size_bits: Option<u32>,
        /// Attack generators: fixed job size.
        job_size_ns: Option<f64>,
    },
    Trace {
        trace_fp: String,
        rate_bps: Option<f64>,
        /// Known from a previous calibration dry run.
        average_packet_size_bits: Option<f64>,
    },
}

fn default_num_flows() -> u32 {
    1
}

/// Parameters for the hierarchical FFS policy.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HffsConfig {
    #[serde(default = "default_hffs_buckets")]
    pub num_buckets: u32,
    #[serde(default = "default_hffs_scale")]
    pub scale_factor: f64,
}

impl Default for HffsConfig {
    fn default() -> HffsConfig {
        HffsConfig {
            num_buckets: default_hffs_buckets(),
            scale_factor: default_hffs_scale(),
        }
    }
}

fn default_hffs_buckets() -> u32 {
    32 * 32 * 32
}

fn default_hffs_scale() -> f64 {
    100.0
}

/// Distribution configuration, dispatched on the `type` string.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistConfig {
    Constant {
        value: f64,
    },
    Exponential {
        rate: f64,
    },
    Normal {
        mu: f64,
        sigma: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    Uniform(UniformParams),
}

/// A uniform distribution is specified either by bounds or by moments.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UniformParams {
    Bounds { lower: f64, upper: f64 },
    Moments { mean: f64, std: f64 },
}

impl DistConfig {
    /// Instantiate the configured sampler.
    pub fn build(&self) -> Result<Distribution> {
        match self {
            DistConfig::Constant { value } => Ok(Distribution::constant(*value)),
            DistConfig::Exponential { rate } => Distribution::exponential(*rate),
            DistConfig::Normal { mu, sigma, min, max } => {
                Distribution::normal(*mu, *sigma, *min, *max)
            }
            DistConfig::Uniform(UniformParams::Bounds { lower, upper }) => {
                Distribution::uniform(*lower, *upper)
            }
            DistConfig::Uniform(UniformParams::Moments { mean, std }) => {
                Distribution::uniform_from_moments(*mean, *std)
            }
        }
    }
}
