use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cogitosphere=info,tower_http=info")),
        )
        .init();

    let config = match cli::run().await {
        cli::RunOutcome::Serve(config) => config,
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    };

    if let Err(err) = cogitosphere::serve(config).await {
        tracing::error!("server error: {err}");
        std::process::exit(1);
    }
}
