use clap::Parser;
use sphincterd::adapters::{hook, http};
use sphincterd::config::Args;
use sphincterd::utils::{logger, validation::Validate};
use sphincterd::{DaemonConfig, Dispatcher, LinkManager, SerialPortOpener, SphincterError, TokenStore};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let verbose = args.verbose;

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    };

    logger::init_logger(verbose, config.logging.format);
    tracing::info!("Starting sphincterd");
    if verbose {
        tracing::debug!("Daemon config: {:?}", config);
    }

    if let Err(e) = run(config).await {
        tracing::error!("❌ sphincterd stopped: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(config: DaemonConfig) -> Result<(), SphincterError> {
    config.validate()?;

    let tokens = Arc::new(TokenStore::load(config.hashfile()?, config.token_options())?);

    // Blocks until the device answers or fails; both are quick.
    let link_config = config.link_config()?;
    let link = tokio::task::spawn_blocking(move || {
        LinkManager::open(link_config, Arc::new(SerialPortOpener))
    })
    .await
    .map_err(|e| SphincterError::Server {
        message: format!("startup task failed: {}", e),
    })??;
    let link = Arc::new(link);

    if let Some(hook_config) = &config.hook {
        let observer = Arc::new(hook::HttpHook::new(hook_config)?);
        tokio::spawn(hook::run_state_hook(link.transitions(), observer));
        tracing::info!("State hook enabled");
    }

    let listener = http::bind(config.bind_addr()?).await?;
    let dispatcher = Arc::new(Dispatcher::new(link.clone(), tokens));
    let served = http::serve(listener, dispatcher, shutdown_signal()).await;

    tracing::info!("Closing serial link on {}", link.device());
    let closing = Arc::clone(&link);
    if tokio::task::spawn_blocking(move || closing.shutdown()).await.is_err() {
        tracing::warn!("Serial link did not shut down cleanly");
    }

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
