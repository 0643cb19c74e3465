//! nb-proxy
//!
//! Launched by a kernelspec as if it were a kernel: the frontend passes its
//! connection file, and the proxy forwards everything to the kernel recorded
//! in `<state-dir>/state.json`.

use anyhow::{Context, Result};
use clap::Parser;
use nb_proxy::state::STATE_FILE;
use nb_proxy::{load_kernel_info, ConnectionInfo, Proxy, ShutdownSignals};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Log file written inside the state directory
const LOG_FILE: &str = "proxy.log";

#[derive(Parser)]
#[command(name = "nb-proxy")]
#[command(about = "Bridge a Jupyter frontend to a running kernel", long_about = None)]
struct Args {
    /// Connection file written by the frontend
    connection_file: PathBuf,

    /// Directory containing state.json
    #[arg(long = "state-dir")]
    state_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.state_dir)?;

    tracing::info!("nb-proxy v{}", env!("CARGO_PKG_VERSION"));

    let client = ConnectionInfo::from_file(&args.connection_file)
        .context("Failed to load frontend connection file")?;
    let kernel = load_kernel_info(&args.state_dir).context("Failed to resolve kernel connection")?;
    tracing::info!(
        "Loaded kernel info from {}",
        args.state_dir.join(STATE_FILE).display()
    );

    let signals = ShutdownSignals::install().context("Failed to install signal handlers")?;
    let proxy = Proxy::start(&client, &kernel);

    let banner = format!(
        "bridging {} <-> {}",
        args.connection_file.display(),
        args.state_dir.join(STATE_FILE).display()
    );
    tracing::info!("{}", banner);
    println!("proxy: {}", banner);

    proxy.run_until_signal(signals).await?;

    tracing::info!("Proxy shutdown complete");

    Ok(())
}

/// Send tracing output to `proxy.log` in the state directory
fn init_logging(state_dir: &Path) -> Result<()> {
    let log_path = state_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
