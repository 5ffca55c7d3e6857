// src/main.rs

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use std::{fs::File, io::BufWriter, net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hr_core::api::{router, AppState};
use hr_core::clock::{Clock, SystemClock};
use hr_core::{Backend, HrService, Settings};

#[derive(Parser, Debug)]
#[command(name = "hr-core", version, about = "HR administration data service")]
struct Cli {
    /// Storage backend (memory or remote). Overrides HR_BACKEND.
    #[arg(long, global = true)]
    backend: Option<Backend>,

    /// Directory holding the seed fixtures. Overrides HR_FIXTURES_DIR.
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print today's dashboard summary as JSON
    Dashboard,
    /// Write all attendance records, with worked hours, to a CSV file
    ExportAttendance {
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = Settings::from_env().context("Failed to load configuration")?;
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    if let Some(dir) = cli.fixtures {
        settings.fixtures_dir = Some(dir);
    }
    info!("Configuration loaded (backend: {}).", settings.backend);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = settings
        .build_service(clock)
        .context("Failed to initialize HR service")?;
    info!("HR service initialized.");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&settings, service).await,
        Command::Dashboard => {
            let summary = service.dashboard().await.context("Failed to build dashboard")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::ExportAttendance { out } => {
            let file = File::create(&out)
                .with_context(|| format!("Failed to create {}", out.display()))?;
            let rows = service
                .export_attendance_csv(BufWriter::new(file))
                .await
                .context("Attendance export failed")?;
            info!("Wrote {} attendance row(s) to {}", rows, out.display());
            Ok(())
        }
    }
}

async fn serve(settings: &Settings, service: HrService) -> Result<()> {
    let app = router(AppState::new(service));
    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", settings.bind_addr))?;

    match settings.tls_paths()? {
        Some((cert_path, key_path)) => {
            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .context("Failed to load TLS cert/key")?;
            info!("TLS configuration loaded.");
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Listening on http://{}", addr);
            axum::serve(listener, app).await.context("HTTP server failed")?;
        }
    }

    Ok(())
}
