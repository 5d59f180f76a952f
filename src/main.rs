//! vidfetch - server entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use vidfetch::{
    cli::Args,
    config::{validate_config, Config},
    error::{Error, Result},
    extractor::YtDlpExtractor,
    output::{print_banner, print_config_summary, print_error, print_info, print_warning},
    server::{build_router, AppState, ConnectionRegistry},
    session::DownloadManager,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&format!("{}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt().with_env_filter(filter).with_target(false).init();

    // Print banner
    print_banner();

    // Load configuration
    let config_path = args.config.clone();
    let mut config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        print_warning(&format!(
            "Configuration file not found: {}",
            config_path.display()
        ));
        print_info("Using default configuration with CLI arguments");
        Config::default()
    };

    // Merge CLI arguments into config
    args.merge_into_config(&mut config);

    // Validate configuration
    validate_config(&config)?;

    // Ensure working directories exist
    std::fs::create_dir_all(config.download_directory())?;
    std::fs::create_dir_all(config.temp_directory())?;

    let addr = config.bind_addr()?;
    print_config_summary(
        &addr.to_string(),
        config.downloads.max_concurrent_downloads,
        &config.download_directory().display().to_string(),
    );

    // Wire up the services: extractor -> manager -> registry
    let config = Arc::new(config);
    let extractor = Arc::new(YtDlpExtractor::new(&config));
    let manager = DownloadManager::new(extractor.clone(), &config);
    let registry = ConnectionRegistry::new(manager.clone());
    manager.start(registry.clone())?;

    let state = AppState {
        manager: manager.clone(),
        registry,
        extractor,
        config: config.clone(),
    };
    let router = build_router(state);

    print_info(&format!("Server listening on http://{}", addr));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("server error: {}", e)))?;

    manager.shutdown();
    print_info("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
    }
}
