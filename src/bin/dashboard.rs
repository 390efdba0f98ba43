//! `cma-dashboard`: console view of the maintenance statistics with an
//! offline cache of the last good reports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cma_biomed::client::{
    CacheStore, CachedDashboard, DashboardView, FileCacheStore, ReportRequest, StatsClient, StatsClientConfig,
};
use cma_biomed::stats::{EquipmentSummary, MaintenanceDetail, SystemStats};

const SESSION_TOKEN_KEY: &str = "session_token";

#[derive(Debug, Parser)]
#[command(name = "cma-dashboard", about = "Biomedical maintenance dashboard", version)]
struct CliArgs {
    /// Server root URL.
    #[arg(long = "api-url", env = "CMA_API_URL", default_value = "http://localhost:3000")]
    api_url: String,
    /// Bearer token. Falls back to the token saved by `login`.
    #[arg(long, env = "CMA_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Directory holding cached reports.
    #[arg(long = "cache-dir", env = "CMA_CACHE_DIR", default_value = ".cma-cache")]
    cache_dir: PathBuf,
    /// Request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and keep the token for later commands.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CMA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the saved token.
    Logout,
    /// System-wide counters.
    Stats,
    /// Active equipment with maintenance totals.
    Summary,
    /// Latest maintenance records, optionally for one equipment.
    Detail {
        #[arg(long = "equipo-id")]
        equipo_id: Option<String>,
    },
    /// Maintenance due within the next 30 days.
    Pending,
    /// Delete every cached report and the saved token.
    ClearCache,
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let args = CliArgs::parse();

    let store: Arc<dyn CacheStore> = Arc::new(FileCacheStore::new(&args.cache_dir));
    let config = StatsClientConfig {
        base_url: args.api_url.clone(),
        token: None,
        timeout: Duration::from_secs(args.timeout),
    };

    match args.command {
        Command::Login { email, password } => {
            let client = StatsClient::new(config)?;
            let token = client.login(&email, &password).await.context("Login failed")?;
            store.write(SESSION_TOKEN_KEY, &token).context("Failed to save session token")?;
            println!("Signed in as {}", email);
            return Ok(());
        }
        Command::Logout => {
            store.remove(SESSION_TOKEN_KEY)?;
            println!("Session token removed");
            return Ok(());
        }
        Command::ClearCache => {
            store.clear()?;
            println!("Cache cleared");
            return Ok(());
        }
        _ => {}
    }

    let token = match args.token {
        Some(token) => Some(token),
        None => store.read(SESSION_TOKEN_KEY).ok().flatten(),
    };
    let mut client = StatsClient::new(config)?;
    if let Some(token) = token {
        client = client.with_token(token.trim());
    }
    let dashboard = CachedDashboard::new(client, store);

    match args.command {
        Command::Stats => {
            let view = dashboard.load::<SystemStats>(&ReportRequest::SystemStats).await;
            show(view, print_stats)
        }
        Command::Summary => {
            let view = dashboard.load::<Vec<EquipmentSummary>>(&ReportRequest::EquiposSummary).await;
            show(view, print_summary)
        }
        Command::Detail { equipo_id } => {
            let request = ReportRequest::MantenimientosDetalle { equipo_id };
            let view = dashboard.load::<Vec<MaintenanceDetail>>(&request).await;
            show(view, |rows| print_detail(rows, "fecha"))
        }
        Command::Pending => {
            let view = dashboard.load::<Vec<MaintenanceDetail>>(&ReportRequest::EquiposPendientes).await;
            show(view, |rows| print_detail(rows, "proximo"))
        }
        Command::Login { .. } | Command::Logout | Command::ClearCache => Ok(()),
    }
}

fn show<T, F>(view: DashboardView<T>, render: F) -> Result<()>
where
    T: DeserializeOwned + Serialize,
    F: Fn(&T),
{
    match view {
        DashboardView::Live(envelope) => {
            render(&envelope.data);
            Ok(())
        }
        DashboardView::Cached { envelope, notice } => {
            eprintln!("warning: {}", notice);
            render(&envelope.data);
            Ok(())
        }
        DashboardView::Empty { error } => anyhow::bail!("No data available: {}", error),
    }
}

fn print_stats(stats: &SystemStats) {
    println!("Equipos:            {} ({} activos)", stats.total_equipos, stats.equipos_activos);
    println!("Mantenimientos:     {} ({} este mes)", stats.total_mantenimientos, stats.mantenimientos_mes);
    println!("Usuarios:           {} ({} activos)", stats.total_usuarios, stats.usuarios_activos);
    println!("Pendientes (30 d):  {}", stats.mantenimientos_pendientes);
}

fn print_summary(rows: &Vec<EquipmentSummary>) {
    if rows.is_empty() {
        println!("Sin equipos activos");
        return;
    }
    for row in rows {
        let last = row
            .ultimo_mantenimiento
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<30} {:<15} {:<15} {:<20} {:>4}  {}",
            row.nombre, row.marca, row.modelo, row.ubicacion, row.total_mantenimientos, last
        );
    }
}

fn print_detail(rows: &Vec<MaintenanceDetail>, date_column: &str) {
    if rows.is_empty() {
        println!("Sin registros");
        return;
    }
    for row in rows {
        let date = match date_column {
            "proximo" => row.fecha_proximo_manto.unwrap_or(row.fecha),
            _ => row.fecha,
        };
        println!(
            "{}  {:<25} {:<15} {:<20} {}",
            date.format("%Y-%m-%d"),
            row.equipo_nombre,
            row.tipo_mantenimiento,
            row.equipo_ubicacion,
            row.tecnico_nombre
        );
    }
}
