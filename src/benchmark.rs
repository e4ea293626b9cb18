use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    config::SounderConfig,
    error::ProbeError,
    logging::SounderLogger,
    server::Server,
    stats,
    transfer::{random_payload, Direction, Timed, TransferJob, Transport},
    warmup::SaturationWarmup,
};

/// How a benchmark's samples collapse to the one reported figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReductionPolicy {
    #[default]
    #[serde(rename = "average", alias = "avg")]
    Average,
    #[serde(rename = "max", alias = "maximum")]
    Maximum,
}

impl FromStr for ReductionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "average" | "avg" => Ok(ReductionPolicy::Average),
            "max" | "maximum" => Ok(ReductionPolicy::Maximum),
            other => Err(format!("unknown reduction policy '{other}'")),
        }
    }
}

/// One timed transfer inside a benchmark run.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementSample {
    pub size_bytes: u64,
    pub elapsed: Duration,
    pub rate_bytes_per_sec: f64,
}

impl From<Timed> for MeasurementSample {
    fn from(timed: Timed) -> Self {
        Self {
            size_bytes: timed.bytes,
            elapsed: timed.elapsed,
            rate_bytes_per_sec: timed.bytes_per_sec(),
        }
    }
}

pub fn to_mbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * 8.0 / 1_000_000.0
}

/// Runs a ladder of escalating transfer sizes against one server and
/// reduces the observed rates to a single Mbps figure.
///
/// Transfers are strictly serial; overlapping them on one link would
/// corrupt every per-transfer rate. A failed rung costs one sample, not
/// the run.
pub struct ThroughputBenchmark {
    download_sizes: Vec<u32>,
    upload_sizes: Vec<u64>,
    policy: ReductionPolicy,
    warmup: Option<SaturationWarmup>,
}

impl ThroughputBenchmark {
    pub fn new(
        download_sizes: Vec<u32>,
        upload_sizes: Vec<u64>,
        policy: ReductionPolicy,
        warmup: Option<SaturationWarmup>,
    ) -> Self {
        Self {
            download_sizes,
            upload_sizes,
            policy,
            warmup,
        }
    }

    pub fn from_config(config: &SounderConfig) -> Self {
        Self::new(
            config.download_sizes.clone(),
            config.upload_sizes.clone(),
            config.algorithm,
            config.warmup.then(|| SaturationWarmup::from_config(config)),
        )
    }

    fn ladder(&self, server: &Server, direction: Direction) -> Vec<(u64, TransferJob)> {
        match direction {
            Direction::Download => self
                .download_sizes
                .iter()
                .map(|&size| {
                    (
                        size as u64,
                        TransferJob::download(server.download_url(size)),
                    )
                })
                .collect(),
            Direction::Upload => self
                .upload_sizes
                .iter()
                .map(|&size| {
                    (
                        size,
                        TransferJob::upload(
                            server.upload_url().to_string(),
                            random_payload(size as usize),
                        ),
                    )
                })
                .collect(),
        }
    }

    /// Measure one direction and return the reduced throughput in Mbps.
    pub async fn measure(
        &self,
        transport: &dyn Transport,
        server: &Server,
        direction: Direction,
    ) -> Result<f64, ProbeError> {
        if server.url.is_empty() {
            return Err(ProbeError::InvalidArgument(format!(
                "server '{}' has no url",
                server.id
            )));
        }

        let rungs = self.ladder(server, direction);
        if rungs.is_empty() {
            return Err(ProbeError::InvalidArgument(format!(
                "{direction} size ladder is empty"
            )));
        }

        SounderLogger::benchmark_started(direction, rungs.len());

        // Prime against the largest rung; a cold first sample would drag
        // the mean down on slow-starting links. Warmup failure costs the
        // priming, not the benchmark.
        if let (Some(warmup), Some((_, largest))) = (&self.warmup, rungs.last()) {
            if let Err(err) = warmup.run(transport, largest).await {
                SounderLogger::warmup_failed(direction, &err);
            }
        }

        let mut samples: Vec<MeasurementSample> = Vec::with_capacity(rungs.len());
        for (nominal, job) in &rungs {
            match job.run(transport).await {
                Ok(timed) => {
                    SounderLogger::sample_recorded(direction, *nominal, timed.bytes_per_sec());
                    samples.push(timed.into());
                }
                Err(err) => SounderLogger::sample_skipped(direction, *nominal, &err),
            }
        }

        let rates: Vec<f64> = samples.iter().map(|s| s.rate_bytes_per_sec).collect();
        let reduced = match self.policy {
            ReductionPolicy::Average => stats::mean(&rates),
            ReductionPolicy::Maximum => stats::max(&rates),
        };
        reduced.map(to_mbps).ok_or(ProbeError::BenchmarkFailed)
    }
}
