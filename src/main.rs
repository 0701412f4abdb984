use clap::Parser;
use funnel::app::App;
use funnel::cli::Args;
use funnel::logging::setup_logging;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config and setup logging before App::new() so startup logs are never silently dropped
    let early_config = funnel::config::load_config().expect("Failed to load config for logging setup");
    setup_logging(&early_config, args.tracing);

    let app = App::new().await.expect("Failed to initialize application");

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting funnel"
    );

    app.run().await
}
