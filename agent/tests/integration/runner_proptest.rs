//! Property-based tests for the bounded concurrency runner

use api_health_agent::runner::{run_round, RoundLimits};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

struct Observed {
    outcomes: Vec<usize>,
    admitted: usize,
    skipped: usize,
    abandoned: usize,
    elapsed: Duration,
    peak: usize,
}

fn run(durations: Vec<u64>, limits: RoundLimits) -> Observed {
    paused_runtime().block_on(async move {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<(usize, u64)> = durations.into_iter().enumerate().collect();
        let report = run_round(items, &limits, &CancellationToken::new(), |(id, ms), _cancel| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                id
            }
        })
        .await;

        Observed {
            outcomes: report.outcomes,
            admitted: report.admitted,
            skipped: report.skipped,
            abandoned: report.abandoned,
            elapsed: report.elapsed,
            peak: peak.load(Ordering::SeqCst),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// 同時実行数が上限を超えず、期限内なら全プローブが1回ずつ結果を返す
    #[test]
    fn concurrency_is_capped_and_every_probe_reports_once(
        durations in prop::collection::vec(1u64..200, 0..40),
        limit in 1usize..8,
    ) {
        let n = durations.len();
        let observed = run(durations, RoundLimits {
            concurrency: limit,
            deadline: Duration::from_secs(3_600),
            drain_grace: Duration::from_secs(10),
        });

        prop_assert!(observed.peak <= limit, "peak {} > limit {}", observed.peak, limit);
        prop_assert_eq!(observed.outcomes.len(), n);
        let unique: HashSet<_> = observed.outcomes.iter().collect();
        prop_assert_eq!(unique.len(), n);
    }

    /// 期限があっても重複はなく、件数の内訳は入力数と一致し、所要時間は有界
    #[test]
    fn deadline_never_duplicates_and_bounds_time(
        durations in prop::collection::vec(1u64..5_000, 0..30),
        limit in 1usize..6,
        deadline_ms in 100u64..3_000,
        grace_ms in 0u64..1_000,
    ) {
        let n = durations.len();
        let observed = run(durations, RoundLimits {
            concurrency: limit,
            deadline: Duration::from_millis(deadline_ms),
            drain_grace: Duration::from_millis(grace_ms),
        });

        prop_assert!(observed.peak <= limit);
        prop_assert!(observed.outcomes.len() <= n);
        let unique: HashSet<_> = observed.outcomes.iter().collect();
        prop_assert_eq!(unique.len(), observed.outcomes.len());
        prop_assert_eq!(observed.admitted + observed.skipped, n);
        prop_assert_eq!(observed.outcomes.len() + observed.abandoned, observed.admitted);

        let bound = Duration::from_millis(deadline_ms + grace_ms + 10);
        prop_assert!(observed.elapsed <= bound, "elapsed {:?} > {:?}", observed.elapsed, bound);
    }
}
