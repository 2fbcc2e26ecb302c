//! Form intake gateway for a fleet of static websites.
//!
//! One process serves every configured site and form on a single port.
//! The binary loads and validates the JSON configuration, builds the SMTP
//! transports and compiled notification templates, then runs the HTTP
//! server until a stop signal arrives.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use formgate::config::schema::LogLevel;
use formgate::config::{load_config, GatewayConfig};
use formgate::http::Server;
use formgate::notify::mailer::SmtpMailerFactory;

#[derive(Parser)]
#[command(name = "formgate")]
#[command(about = "Form submission intake gateway for a fleet of static sites", long_about = None)]
struct Cli {
    /// Path to the config file.
    #[arg(long, default_value = "/etc/formgate.json")]
    config: PathBuf,

    /// Log only messages with the given severity or more.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the build version
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        println!("formgate version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = load_config(&cli.config)?;

    if let Some(level) = &cli.log_level {
        config.log_level = LogLevel::from_str(level)?;
    }

    init_tracing(&config);

    tracing::info!(
        listen_address = %config.listen_address,
        max_body_bytes = config.max_body_bytes,
        rate_limit_per_minute = config.rate_limit.per_ip_site_minute,
        sites = config.sites.len(),
        "configuration loaded"
    );

    let listen_address = config.listen_address.clone();
    let server = Server::new(config, &SmtpMailerFactory)?;

    let listener = TcpListener::bind(&listen_address).await?;

    tracing::info!("running the server");
    server.run(listener).await?;

    tracing::info!("shutdown complete");

    Ok(())
}

fn init_tracing(config: &GatewayConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.as_directive())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
