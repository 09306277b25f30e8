use tracing_subscriber::EnvFilter;
use video_playout::Config;

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    // Load configuration from CLI and/or config file
    let config = Config::load().expect("Failed to load configuration");
    video_playout::run(config).await
}
