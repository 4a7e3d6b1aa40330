use anyhow::Context;
use clap::{Parser, Subcommand};
use docdigest::{api, config, logging, processing};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "docdigest", version, about = "Document upload and summarization server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Check that required environment variables are set.
    CheckEnv,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            serve().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckEnv => Ok(check_env()),
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = config::init_config().context("Failed to load config from environment")?;
    logging::init_tracing();

    let service = processing::UploadService::from_config(config)
        .await
        .context("Failed to initialize document repository")?;
    let app = api::create_router(Arc::new(service), config.max_upload_bytes);

    let (listener, port) = bind_listener(config.server_port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn check_env() -> ExitCode {
    dotenvy::dotenv().ok();
    let report = config::check_env(|key| std::env::var(key).ok());

    for warning in &report.warnings {
        println!("Warning: {warning}");
    }
    if report.is_ok() {
        println!("Environment OK: all required variables are present.");
        return ExitCode::SUCCESS;
    }

    println!("Missing required environment variables:");
    for key in &report.missing {
        println!(" - {key}");
    }
    ExitCode::FAILURE
}

async fn bind_listener(server_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8000-8099",
    ))
}
