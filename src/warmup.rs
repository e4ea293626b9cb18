use std::time::{Duration, Instant};

use crate::{
    config::SounderConfig,
    error::ProbeError,
    logging::SounderLogger,
    transfer::{TransferJob, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WarmupOutcome {
    /// The rate stopped improving; the link is at steady state.
    Saturated {
        best_bytes_per_sec: f64,
        iterations: u32,
    },
    /// A guard tripped while the rate was still climbing. The connection is
    /// as warm as it is going to get within budget; not an error.
    Inconclusive {
        best_bytes_per_sec: f64,
        iterations: u32,
    },
}

/// Repeats one fixed-size transfer until the measured rate fails to beat
/// the best seen so far. Some links ramp up over the first seconds of a
/// connection; sampling cold underestimates them.
///
/// The caller consumes nothing beyond completion. The value of the warmup
/// is the primed connection, plus diagnostics.
pub struct SaturationWarmup {
    max_iterations: u32,
    budget: Duration,
}

impl SaturationWarmup {
    pub fn new(max_iterations: u32, budget: Duration) -> Self {
        Self {
            max_iterations,
            budget,
        }
    }

    pub fn from_config(config: &SounderConfig) -> Self {
        Self::new(config.warmup_max_iterations, config.warmup_budget())
    }

    pub async fn run(
        &self,
        transport: &dyn Transport,
        target: &TransferJob,
    ) -> Result<WarmupOutcome, ProbeError> {
        SounderLogger::warmup_started(target.direction(), &target.describe());

        let started = Instant::now();
        let seed = target.run(transport).await?;
        let mut best = seed.bytes_per_sec();
        let mut iterations = 0u32;

        while iterations < self.max_iterations {
            if started.elapsed() >= self.budget {
                break;
            }

            let timed = target.run(transport).await?;
            iterations += 1;

            let rate = timed.bytes_per_sec();
            if rate > best {
                best = rate;
                SounderLogger::warmup_improved(rate);
            } else {
                SounderLogger::warmup_saturated(best, rate, iterations);
                return Ok(WarmupOutcome::Saturated {
                    best_bytes_per_sec: best,
                    iterations,
                });
            }
        }

        SounderLogger::warmup_inconclusive(best, iterations);
        Ok(WarmupOutcome::Inconclusive {
            best_bytes_per_sec: best,
            iterations,
        })
    }
}
