//! DavGate server: multi-tenant WebDAV access gateway.
//!
//! Entry point that loads configuration, initializes logging and runs the
//! selected command.

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use davgate_auth::PasswordHasher;
use davgate_core::config::AppConfig;
use davgate_core::error::AppError;
use davgate_webdav::{Dispatcher, WebDavServer};

/// DavGate: tenant-aware WebDAV gateway
#[derive(Debug, Parser)]
#[command(name = "davgate", version, about, long_about = None)]
struct Cli {
    /// Path to an explicit configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Command to run (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the WebDAV server
    Serve,
    /// Hash a password for use in a configuration file
    HashPassword {
        /// Plaintext password
        password: String,
    },
    /// Validate the configuration and print the tenant summary
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.config.as_deref()).await,
        Commands::HashPassword { password } => hash_password(&password),
        Commands::CheckConfig => check_config(cli.config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from the default file, the environment overlay and
/// an optional explicit file
fn load_configuration(path: Option<&str>) -> Result<AppConfig, AppError> {
    let env = std::env::var("DAVGATE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn serve(path: Option<&str>) -> Result<(), AppError> {
    let config = load_configuration(path)?;
    init_logging(&config);

    tracing::info!("Starting DavGate v{}", env!("CARGO_PKG_VERSION"));

    let server = WebDavServer::from_config(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    server.start(shutdown_rx).await
}

fn hash_password(password: &str) -> Result<(), AppError> {
    let hash = PasswordHasher::new().hash_password(password)?;
    println!("{}", hash);
    Ok(())
}

fn check_config(path: Option<&str>) -> Result<(), AppError> {
    let config = load_configuration(path)?;
    let dispatcher = Dispatcher::from_config(&config)?;

    let mode = if dispatcher.is_multi_tenant() {
        "multi-tenant"
    } else {
        "single-tenant"
    };
    println!("Configuration OK");
    println!("  mode:    {}", mode);
    println!("  listen:  {}:{}", config.server.host, config.server.port);
    println!(
        "  prefix:  {}",
        if dispatcher.prefix().is_empty() {
            "/"
        } else {
            dispatcher.prefix()
        }
    );
    println!("  no_sniff: {}", config.webdav.no_sniff);

    for handler in dispatcher.tenants() {
        let tenant = handler.tenant();
        let name = if tenant.is_anonymous() {
            "(anonymous)"
        } else {
            tenant.username()
        };
        println!(
            "  {:<16} scope={} rules={}",
            name,
            tenant.scope_root().display(),
            tenant.rules().len()
        );
    }
    Ok(())
}
