use std::path::PathBuf;

use campus_news::{Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info and above unless RUST_LOG says otherwise)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config_path = config_path_from_args(&args);
    let config = Config::load_from(&config_path)?;

    // Check for --print-config flag
    if args.iter().any(|arg| arg == "--print-config") {
        println!("Configuration: {:?}", config_path);
        println!("Database: {:?}", config.db_path);
        println!("Listening on: {}", config.bind_address);
        return Ok(());
    }

    campus_news::serve(config).await
}

/// `--config <path>` when given, otherwise the default location.
fn config_path_from_args(args: &[String]) -> PathBuf {
    if args.len() >= 3 && args[1] == "--config" {
        PathBuf::from(&args[2])
    } else {
        Config::config_path()
    }
}
