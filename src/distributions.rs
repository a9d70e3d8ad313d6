//! Statistical distributions backing the traffic generators and the
//! `iid_job_sizes` application.
//!
//! Each distribution owns its RNG so samplers stay independent, and exposes
//! descriptive statistics so generators can compute inter-arrival times from a
//! target rate without drawing samples.

use crate::error::{Result, SimError};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution as _, Exp, Normal, Uniform};

/// Number of draws used to estimate the moments of a truncated Gaussian.
const TRUNCATED_NORMAL_SAMPLES: usize = 1_000_000;

/// Descriptive statistics (expectation and standard deviation) of a sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub mean: f64,
    pub std: f64,
}

impl Statistics {
    /// Sample mean and standard deviation of a batch of draws.
    fn from_samples(samples: &[f64]) -> Statistics {
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let accum: f64 = samples.iter().map(|s| (s - mean) * (s - mean)).sum();
        let std = (accum / (samples.len() - 1) as f64).sqrt();
        Statistics { mean, std }
    }
}

#[derive(Debug, Clone)]
enum Kind {
    Constant { value: f64 },
    Exponential { dist: Exp<f64> },
    Normal { dist: Normal<f64>, min: f64, max: f64 },
    Uniform { dist: Uniform<f64>, lower: f64, upper: f64 },
}

/// A closed family of samplers: constant, exponential, (truncated) normal,
/// and uniform.
#[derive(Debug, Clone)]
pub struct Distribution {
    kind: Kind,
    stats: Statistics,
    rng: SmallRng,
}

impl Distribution {
    /// A degenerate distribution that always yields `value`.
    ///
    /// `value` may be `f64::INFINITY`, which the attack generator uses to
    /// represent a zero-rate (never-arriving) traffic source.
    pub fn constant(value: f64) -> Distribution {
        Distribution {
            kind: Kind::Constant { value },
            stats: Statistics { mean: value, std: 0.0 },
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn exponential(rate: f64) -> Result<Distribution> {
        let dist = Exp::new(rate)
            .map_err(|e| SimError::Config(format!("bad exponential rate {rate}: {e}")))?;
        Ok(Distribution {
            kind: Kind::Exponential { dist },
            stats: Statistics {
                mean: 1.0 / rate,
                std: 1.0 / rate,
            },
            rng: SmallRng::from_entropy(),
        })
    }

    /// A normal distribution, optionally truncated to `[min, max]` by
    /// rejection sampling.
    ///
    /// Truncation changes the moments, so the reported statistics for a
    /// truncated Gaussian are estimated from a large batch of draws.
    pub fn normal(mu: f64, sigma: f64, min: Option<f64>, max: Option<f64>) -> Result<Distribution> {
        let dist = Normal::new(mu, sigma)
            .map_err(|e| SimError::Config(format!("bad normal parameters ({mu}, {sigma}): {e}")))?;
        let min = min.unwrap_or(f64::NEG_INFINITY);
        let max = max.unwrap_or(f64::INFINITY);
        if min > max {
            return Err(SimError::Config(format!(
                "normal truncation bounds are inverted ({min} > {max})"
            )));
        }
        let mut distribution = Distribution {
            kind: Kind::Normal { dist, min, max },
            stats: Statistics { mean: mu, std: sigma },
            rng: SmallRng::from_entropy(),
        };
        if min != f64::NEG_INFINITY || max != f64::INFINITY {
            let samples: Vec<f64> = (0..TRUNCATED_NORMAL_SAMPLES)
                .map(|_| distribution.sample())
                .collect();
            distribution.stats = Statistics::from_samples(&samples);
        }
        Ok(distribution)
    }

    pub fn uniform(lower: f64, upper: f64) -> Result<Distribution> {
        if upper < lower {
            return Err(SimError::Config(format!(
                "uniform bounds are inverted ({lower} > {upper})"
            )));
        }
        Ok(Distribution {
            kind: Kind::Uniform {
                dist: Uniform::new_inclusive(lower, upper),
                lower,
                upper,
            },
            stats: Statistics {
                mean: (lower + upper) / 2.0,
                std: (upper - lower) / 12f64.sqrt(),
            },
            rng: SmallRng::from_entropy(),
        })
    }

    /// A uniform distribution specified by its moments: the bounds are
    /// recovered as `upper = mean + sqrt(3)*std`, `lower = 2*mean - upper`.
    pub fn uniform_from_moments(mean: f64, std: f64) -> Result<Distribution> {
        let upper = mean + 3f64.sqrt() * std;
        let lower = 2.0 * mean - upper;
        Distribution::uniform(lower, upper)
    }

    pub fn sample(&mut self) -> f64 {
        match &self.kind {
            Kind::Constant { value } => *value,
            Kind::Exponential { dist } => dist.sample(&mut self.rng),
            Kind::Normal { dist, min, max } => loop {
                let sample = dist.sample(&mut self.rng);
                if sample >= *min && sample <= *max {
                    break sample;
                }
            },
            Kind::Uniform { dist, .. } => dist.sample(&mut self.rng),
        }
    }

    pub fn stats(&self) -> Statistics {
        self.stats
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            Kind::Constant { .. } => "constant",
            Kind::Exponential { .. } => "exponential",
            Kind::Normal { .. } => "normal",
            Kind::Uniform { .. } => "uniform",
        }
    }

    /// Configuration banner fragment mirroring the distribution's parameters.
    pub fn describe(&self) -> String {
        match &self.kind {
            Kind::Constant { value } => {
                format!("{{ type: constant, value: {value:.2} }}")
            }
            Kind::Exponential { .. } => {
                format!("{{ type: exponential, rate: {:.2} }}", 1.0 / self.stats.mean)
            }
            Kind::Normal { min, max, .. } => format!(
                "{{ type: normal, min: {:.2}, max: {:.2}, mu: {:.2}, sigma: {:.2} }}",
                min, max, self.stats.mean, self.stats.std
            ),
            Kind::Uniform { lower, upper, .. } => {
                format!("{{ type: uniform, lower: {lower:.2}, upper: {upper:.2} }}")
            }
        }
    }
}
