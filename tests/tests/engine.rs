mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use barrage::{run, RunStatus, StatusPolicy, STALLED_EXIT_CODE};
    use std::collections::BTreeMap;
    use std::time::{Duration, Instant};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(15_000)]
    async fn fixed_delay_target() {
        let service = init().await;

        let report = run(&config("delay", &service.url("/delay/ms/10"), 5, 2))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.dispatched, 10);
        assert_eq!(service.hits(), 10);

        let snapshot = report.snapshot();
        assert_eq!(snapshot.completed.count, 10);
        assert_eq!(snapshot.errored.count, 0);
        assert!(snapshot.latency.min >= Duration::from_millis(10));
        assert!(report.metrics.error_tally().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(15_000)]
    async fn refused_connections() {
        init().await;

        let report = run(&config("refused", &closed_port_url(), 5, 2))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.metrics.completed(), 0);
        assert_eq!(
            report.metrics.error_tally(),
            BTreeMap::from([("connection-refused".to_string(), 10)])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(15_000)]
    async fn slow_target_times_out() {
        let service = init().await;

        let config = config("slow", &service.url("/delay/ms/1000"), 5, 1)
            .timeout(Duration::from_millis(100));
        let report = run(&config).await.unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.metrics.error_count("read-timeout"), 5);

        // Timed-out requests still contribute their latency.
        let latency = report.snapshot().latency;
        assert_eq!(latency.count, 5);
        assert!(latency.min >= Duration::from_millis(100));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(15_000)]
    async fn hanging_target_is_a_stall() {
        let service = init().await;

        let config = config("hang", &service.url("/hang"), 5, 2).timeout(Duration::from_secs(60));
        let start = Instant::now();
        let report = run(&config).await.unwrap();

        assert!(report.is_stalled());
        assert_eq!(report.exit_code(), STALLED_EXIT_CODE);
        assert!(start.elapsed() <= Duration::from_millis(3_500));

        let RunStatus::Stalled(stall) = report.status else {
            unreachable!()
        };
        assert_eq!(stall.remaining, 10);
        assert_eq!(report.metrics.started(), 10);
        assert_eq!(report.snapshot().latency.count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(15_000)]
    async fn error_status_follows_policy() {
        let service = init().await;
        let url = service.url("/status/503");

        let lenient = run(&config("lenient", &url, 5, 1)).await.unwrap();
        assert_eq!(lenient.metrics.completed(), 5);
        assert_eq!(lenient.metrics.errored(), 0);

        let strict = config("strict", &url, 5, 1).status_policy(StatusPolicy::RequireSuccess);
        let strict = run(&strict).await.unwrap();
        assert_eq!(strict.metrics.completed(), 0);
        assert_eq!(
            strict.metrics.error_tally(),
            BTreeMap::from([("status-503".to_string(), 5)])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(20_000)]
    async fn max_connections_bounds_concurrency() {
        let service = init().await;

        let config = config("bounded", &service.url("/delay/ms/200"), 50, 1)
            .max_connections(5)
            .check_interval(Duration::from_secs(1));
        let report = run(&config).await.unwrap();

        // 50 requests, 5 at a time, 200ms each.
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.metrics.completed(), 50);
        assert!(report.elapsed >= Duration::from_millis(1_900));
    }
}

#[cfg(feature = "integration")]
mod integration {
    use super::*;

    use barrage::{run, RunStatus, StatusPolicy};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn high_rate_against_local_target() {
        let service = init().await;

        let report = run(&config("fast", &service.url("/delay/ms/1"), 5_000, 5))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.metrics.completed(), 25_000);
        let rate = report.metrics.rates().started.mean_rate;
        assert!(rate >= 4_500., "dispatch rate {rate}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn limited_target_rejections_are_tallied() {
        let service = init().await;

        let config = config(
            "limited",
            &service.url("/limited/500/server/tally"),
            2_000,
            5,
        )
        .status_policy(StatusPolicy::RequireSuccess)
        .check_interval(Duration::from_secs(2));
        let report = run(&config).await.unwrap();

        let completed = report.metrics.completed();
        assert!(completed <= 3_000, "completed {completed}");
        assert_eq!(
            report.metrics.error_count("status-429") + completed,
            10_000
        );
    }
}
