mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use barrage::cli::Cli;
    use barrage::{run, summary};
    use clap::Parser;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(15_000)]
    async fn cli_run_writes_stats_file() {
        let service = init().await;
        let url = service.url("/delay/ms/5");

        let cli = Cli::try_parse_from([
            "barrage",
            "--rate",
            "10",
            "--duration",
            "1",
            "--name",
            "cli-smoke",
            "--stats",
            "--minmax",
            url.as_str(),
        ])
        .unwrap();
        let config = cli.run_config().unwrap().unwrap();
        let report = run(&config).await.unwrap();
        assert_eq!(report.exit_code(), 0);

        let lines = summary::render(&report, cli.minmax);
        assert!(lines[0].starts_with("cli-smoke responseTime(90%): "));
        assert_eq!(lines.len(), 3);

        let dir = tempfile::tempdir().unwrap();
        let path = summary::write_stats_file(&report, dir.path()).unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<_> = contents.lines().collect();

        assert_eq!(lines[0], "ErrorsCounter: 0");
        assert_eq!(
            lines
                .iter()
                .filter(|line| line.contains(" cli-smoke responseTime "))
                .count(),
            10
        );
        assert_eq!(
            lines
                .iter()
                .filter(|line| line.starts_with("cli-smoke responseTimeHistogram "))
                .count(),
            101
        );
    }
}
