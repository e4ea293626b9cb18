/// Measurement failure taxonomy.
///
/// Failures that only cost a single sample are absorbed where the aggregate
/// still has signal; failures that eliminate all signal propagate.
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("server directory unavailable (pe::cfg): {0}")]
    ConfigUnavailable(#[source] anyhow::Error),
    #[error("no candidate server answered latency probes (pe::nrs)")]
    NoReachableServer,
    #[error("server '{id}' unreachable, {trials} trials failed (pe::sru)")]
    ServerUnreachable { id: String, trials: u32 },
    #[error("transfer failed (pe::tx): {0}")]
    Transfer(#[source] anyhow::Error),
    #[error("every transfer in the benchmark failed (pe::bf)")]
    BenchmarkFailed,
    #[error("invalid argument (pe::arg): {0}")]
    InvalidArgument(String),
}

impl ProbeError {
    pub fn transfer(err: impl Into<anyhow::Error>) -> Self {
        Self::Transfer(err.into())
    }

    /// Whether the whole run should stop, as opposed to skipping one
    /// sample or one candidate server.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProbeError::ServerUnreachable { .. } | ProbeError::Transfer(_)
        )
    }
}
