use clap::Parser;
use cmwatch::cli::Args;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    // Initialize crypto provider for rustls
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    match cmwatch::app::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("cmwatch failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
