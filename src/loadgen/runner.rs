use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::Rng;

use super::report::RequestOutcome;
use super::{Scenario, UserIdPool, MAX_REQUEST_LIMIT, MIN_REQUEST_LIMIT};
use crate::pipeline::{SearchPipeline, SearchRequest};

/// Install the scenario's chaos rates and issue `requests` searches one after
/// another, pausing up to `max_pause` between them.
pub async fn run_scenario(
    pipeline: &SearchPipeline,
    scenario: &Scenario,
    requests: usize,
    users: &mut UserIdPool,
    max_pause: Duration,
) -> Vec<RequestOutcome> {
    pipeline.chaos().update_config(scenario.chaos);
    tracing::info!(scenario = %scenario.name, requests, "Scenario started");

    let pb = ProgressBar::new(requests as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{pos}/{len}] {msg} [{elapsed_precise} / {eta_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message(scenario.name.clone());

    let mut outcomes = Vec::with_capacity(requests);
    for _ in 0..requests {
        // ThreadRng is not Send; keep it out of the awaits below.
        let (request, pause) = {
            let mut rng = rand::thread_rng();
            let query = scenario
                .queries
                .choose(&mut rng)
                .cloned()
                .unwrap_or_else(|| "search".to_string());
            let user_id = users.next_id(&mut rng);
            let limit = rng.gen_range(MIN_REQUEST_LIMIT..=MAX_REQUEST_LIMIT);
            let pause_ms = if max_pause.is_zero() {
                0
            } else {
                rng.gen_range(0..=max_pause.as_millis() as u64)
            };
            (SearchRequest::new(query, user_id, Some(limit)), Duration::from_millis(pause_ms))
        };

        let started = Instant::now();
        let outcome = match pipeline.search(&request).await {
            Ok(response) => RequestOutcome {
                success: true,
                degraded: response.is_degraded(),
                latency_ms: response.meta.latency_ms,
                result_count: response.results.len(),
                error_kind: None,
            },
            Err(e) => RequestOutcome {
                success: false,
                degraded: false,
                latency_ms: started.elapsed().as_millis() as u64,
                result_count: 0,
                error_kind: Some(e.kind().to_string()),
            },
        };
        outcomes.push(outcome);
        pb.inc(1);

        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    pb.finish_with_message(format!("{} done", scenario.name));
    outcomes
}
