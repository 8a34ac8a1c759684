use barrage::RunConfig;
use mock_service::MockService;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub async fn init() -> MockService {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("barrage=debug,mock_service=debug")
            .try_init();
    });

    MockService::spawn()
        .await
        .expect("mock service failed to bind")
}

/// Config with quick timers so stalls surface within a test's timeout.
#[allow(unused)]
pub fn config(name: &str, url: &str, rate: u32, secs: u64) -> RunConfig {
    RunConfig::new(name, url)
        .expect("valid test url")
        .rate(rate)
        .duration(Duration::from_secs(secs))
        .print_interval(Duration::from_millis(500))
        .check_interval(Duration::from_millis(500))
}

/// A local address nothing listens on.
#[allow(unused)]
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/")
}
