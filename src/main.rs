use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spoty::{
    config::{self, Config, LogFormat},
    health::{HealthChecker, HealthRegistry},
    server::{self, AppState, BuildInfo},
    spotify::SpotifyAuthenticator,
    spoty::{HttpImageFetcher, ImageFetcher, Session},
    Spoty,
};

#[derive(Parser)]
#[command(name = "spoty", version, about = "Currently playing Spotify track service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print build information as JSON and exit
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = cli.command {
        println!("{}", BuildInfo::current(config::service_name()).to_json()?);
        return Ok(());
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        service = %config.service_name,
        "Spoty starting..."
    );

    let authenticator = match SpotifyAuthenticator::new(&config.spotify, config.request.clone()) {
        Ok(a) => {
            info!(accounts_url = %config.spotify.accounts_url, "Spotify authenticator initialized");
            a
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Spotify authenticator");
            return Err(e.into());
        }
    };

    let fetcher: Arc<dyn ImageFetcher> = match HttpImageFetcher::new(&config.image) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!(error = %e, "Failed to initialize image fetcher");
            return Err(e.into());
        }
    };

    let registry = HealthRegistry::new();
    let session = Session::new(Arc::new(authenticator));
    let spoty = match Spoty::new(session, &config.cache, fetcher, &registry) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to initialize caches");
            return Err(e.into());
        }
    };

    let checker = HealthChecker::start(registry.compile_schedule());
    info!(probes = registry.len(), "Health checker started");

    let state = AppState::new(
        Arc::new(spoty),
        Arc::new(checker),
        BuildInfo::current(config.service_name.clone()),
    );

    info!(
        url = %format!("http://{}/api/authenticate", config.http.addr()),
        "Open the authenticate endpoint to authorize the session"
    );

    if let Err(e) = server::run(&config.http, state).await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
