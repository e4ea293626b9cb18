use std::time::Duration;

use crate::{
    error::ProbeError,
    logging::SounderLogger,
    server::Server,
    stats,
    transfer::Transport,
};

/// Mean round-trip latency to one server over `trials` sequential probes.
///
/// Failed trials are excluded from the mean but still counted; a server
/// that fails every trial is unreachable. Latency always reduces by mean,
/// unlike throughput whose policy is configurable.
pub async fn latency(
    transport: &dyn Transport,
    server: &Server,
    trials: u32,
) -> Result<Duration, ProbeError> {
    if trials == 0 {
        return Err(ProbeError::InvalidArgument(
            "latency trial count must be > 0".to_string(),
        ));
    }

    let url = server.latency_url();
    let mut samples: Vec<Duration> = Vec::with_capacity(trials as usize);
    for trial in 1..=trials {
        match transport.probe(&url).await {
            Ok(elapsed) => samples.push(elapsed),
            Err(err) => SounderLogger::latency_trial_failed(&server.id, trial, &err),
        }
    }

    stats::mean_duration(&samples).ok_or_else(|| ProbeError::ServerUnreachable {
        id: server.id.clone(),
        trials,
    })
}

/// Probe every candidate and pick the lowest mean latency.
///
/// Unreachable candidates are excluded; ties keep the earlier candidate.
/// The winner comes back with `avg_latency` attached, so callers that need
/// the measured value rebind rather than reach into the input slice.
pub async fn fastest(
    transport: &dyn Transport,
    trials: u32,
    candidates: &[Server],
) -> Result<Server, ProbeError> {
    SounderLogger::finding_fastest(candidates.len(), trials);

    let mut best: Option<(Server, Duration)> = None;
    for candidate in candidates {
        let measured = match latency(transport, candidate, trials).await {
            Ok(measured) => measured,
            Err(ProbeError::ServerUnreachable { .. }) => {
                SounderLogger::candidate_unreachable(&candidate.id, trials);
                continue;
            }
            Err(err) => return Err(err),
        };
        SounderLogger::candidate_measured(&candidate.id, measured);

        let improved = match &best {
            Some((_, incumbent)) => measured < *incumbent,
            None => true,
        };
        if improved {
            let mut winner = candidate.clone();
            winner.avg_latency = Some(measured);
            best = Some((winner, measured));
        }
    }

    match best {
        Some((server, _)) => {
            SounderLogger::chosen_server(&server);
            Ok(server)
        }
        None => Err(ProbeError::NoReachableServer),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::transfer::Timed;

    /// Probe responses scripted per URL, consumed in order as trials run.
    struct ScriptedProbes {
        by_url: Mutex<Vec<(String, Vec<Option<Duration>>)>>,
    }

    impl ScriptedProbes {
        fn new(scripts: Vec<(&str, Vec<Option<Duration>>)>) -> Self {
            Self {
                by_url: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(url, responses)| (url.to_string(), responses))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedProbes {
        async fn probe(&self, url: &str) -> Result<Duration, ProbeError> {
            let mut scripts = self.by_url.lock().unwrap();
            let entry = scripts
                .iter_mut()
                .find(|(scripted, _)| url == scripted)
                .unwrap_or_else(|| panic!("unscripted probe url {url}"));
            match entry.1.remove(0) {
                Some(elapsed) => Ok(elapsed),
                None => Err(ProbeError::transfer(anyhow::anyhow!("probe refused"))),
            }
        }

        async fn download(&self, _url: &str) -> Result<Timed, ProbeError> {
            unreachable!("latency tests never transfer")
        }

        async fn upload(
            &self,
            _url: &str,
            _content_type: &str,
            _payload: &[u8],
        ) -> Result<Timed, ProbeError> {
            unreachable!("latency tests never transfer")
        }
    }

    fn server(id: &str) -> Server {
        Server {
            id: id.to_string(),
            url: format!("http://{id}.example/speedtest/upload.php"),
            name: id.to_string(),
            sponsor: "Example".to_string(),
            country: "US".to_string(),
            lat: 0.0,
            lon: 0.0,
            distance_km: None,
            avg_latency: None,
        }
    }

    fn ms(v: u64) -> Option<Duration> {
        Some(Duration::from_millis(v))
    }

    #[tokio::test]
    async fn latency_returns_mean_of_successful_trials() {
        let s = server("a");
        let transport = ScriptedProbes::new(vec![(
            "http://a.example/speedtest/latency.txt",
            vec![ms(10), ms(20), ms(30)],
        )]);
        let measured = latency(&transport, &s, 3).await.unwrap();
        assert_eq!(measured, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn failed_trials_are_excluded_from_the_mean() {
        let s = server("a");
        let transport = ScriptedProbes::new(vec![(
            "http://a.example/speedtest/latency.txt",
            vec![ms(10), None, ms(30)],
        )]);
        let measured = latency(&transport, &s, 3).await.unwrap();
        assert_eq!(measured, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn all_trials_failing_is_unreachable() {
        let s = server("a");
        let transport = ScriptedProbes::new(vec![(
            "http://a.example/speedtest/latency.txt",
            vec![None, None, None],
        )]);
        let err = latency(&transport, &s, 3).await.unwrap_err();
        assert!(matches!(
            err,
            ProbeError::ServerUnreachable { ref id, trials: 3 } if id == "a"
        ));
    }

    #[tokio::test]
    async fn zero_trials_is_an_invalid_argument() {
        let s = server("a");
        let transport = ScriptedProbes::new(vec![]);
        let err = latency(&transport, &s, 0).await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn fastest_picks_the_lowest_mean_and_attaches_it() {
        let candidates = vec![server("a"), server("b"), server("c")];
        let transport = ScriptedProbes::new(vec![
            ("http://a.example/speedtest/latency.txt", vec![ms(40)]),
            ("http://b.example/speedtest/latency.txt", vec![ms(15)]),
            ("http://c.example/speedtest/latency.txt", vec![ms(90)]),
        ]);
        let winner = fastest(&transport, 1, &candidates).await.unwrap();
        assert_eq!(winner.id, "b");
        assert_eq!(winner.avg_latency, Some(Duration::from_millis(15)));
        // The input slice is untouched.
        assert!(candidates[1].avg_latency.is_none());
    }

    #[tokio::test]
    async fn unreachable_candidates_never_win() {
        let candidates = vec![server("a"), server("b")];
        let transport = ScriptedProbes::new(vec![
            ("http://a.example/speedtest/latency.txt", vec![None, None]),
            ("http://b.example/speedtest/latency.txt", vec![ms(200), ms(200)]),
        ]);
        let winner = fastest(&transport, 2, &candidates).await.unwrap();
        assert_eq!(winner.id, "b");
    }

    #[tokio::test]
    async fn all_candidates_unreachable_is_fatal() {
        let candidates = vec![server("a"), server("b")];
        let transport = ScriptedProbes::new(vec![
            ("http://a.example/speedtest/latency.txt", vec![None]),
            ("http://b.example/speedtest/latency.txt", vec![None]),
        ]);
        let err = fastest(&transport, 1, &candidates).await.unwrap_err();
        assert!(matches!(err, ProbeError::NoReachableServer));
    }

    #[tokio::test]
    async fn ties_keep_the_earlier_candidate() {
        let candidates = vec![server("a"), server("b")];
        let transport = ScriptedProbes::new(vec![
            ("http://a.example/speedtest/latency.txt", vec![ms(25)]),
            ("http://b.example/speedtest/latency.txt", vec![ms(25)]),
        ]);
        let winner = fastest(&transport, 1, &candidates).await.unwrap();
        assert_eq!(winner.id, "a");
    }
}
