use std::time::Duration;

use log::{debug, info, warn};

use crate::{error::ProbeError, server::Server, transfer::Direction};

pub struct SounderLogger;

impl SounderLogger {
    pub fn fetching_directory(url: &str) {
        debug!("Fetching server directory from {url}");
    }

    pub fn directory_loaded(count: usize) {
        debug!("Server directory loaded, {count} candidates");
    }

    pub fn finding_fastest(candidates: usize, trials: u32) {
        info!("Finding fastest server ({candidates} candidates, {trials} trials each)");
    }

    pub fn latency_trial_failed(id: &str, trial: u32, err: &ProbeError) {
        debug!("Latency trial {trial} against server {id} failed: {err}");
    }

    pub fn candidate_unreachable(id: &str, trials: u32) {
        debug!("Excluding server {id}: all {trials} latency trials failed");
    }

    pub fn candidate_measured(id: &str, latency: Duration) {
        debug!("Server {id}: avg latency {latency:?}");
    }

    pub fn chosen_server(server: &Server) {
        info!(
            "Using server {} - {} ({}, {})",
            server.id, server.sponsor, server.name, server.country
        );
    }

    pub fn warmup_started(direction: Direction, rung: &str) {
        debug!("Priming {direction} path with repeated transfers of {rung}");
    }

    pub fn warmup_improved(rate_bytes_per_sec: f64) {
        debug!("Warmup rate improved to {rate_bytes_per_sec:.0} B/s");
    }

    pub fn warmup_saturated(best_bytes_per_sec: f64, dropped_to: f64, iterations: u32) {
        debug!(
            "Warmup saturated after {iterations} transfers at {best_bytes_per_sec:.0} B/s \
             (last sample dropped to {dropped_to:.0} B/s)"
        );
    }

    pub fn warmup_inconclusive(best_bytes_per_sec: f64, iterations: u32) {
        warn!(
            "Warmup still improving when guard tripped \
             ({iterations} transfers, best {best_bytes_per_sec:.0} B/s)"
        );
    }

    pub fn warmup_failed(direction: Direction, err: &ProbeError) {
        warn!("Skipping {direction} warmup: {err}");
    }

    pub fn benchmark_started(direction: Direction, rungs: usize) {
        info!("Testing {direction} speed ({rungs} transfers)");
    }

    pub fn sample_recorded(direction: Direction, size: u64, rate_bytes_per_sec: f64) {
        debug!("{direction} sample, size {size}: {rate_bytes_per_sec:.0} B/s");
    }

    pub fn sample_skipped(direction: Direction, size: u64, err: &ProbeError) {
        debug!("Skipping {direction} sample, size {size}: {err}");
    }
}
