//! skuflowd — the skuflow daemon.
//!
//! # Usage
//!
//! ```text
//! skuflowd serve --config skuflow.toml --addr 127.0.0.1:8080
//! skuflowd --log-format json serve
//! skuflowd config --config skuflow.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use skuflowd::{DEFAULT_LOG_FILTER, Service, listen_addr, load_config, serve, shutdown_signal};

#[derive(Parser)]
#[command(name = "skuflowd", about = "skuflow product update service", version)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service and worker pool.
    Serve {
        /// TOML config file. Environment variables override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Listen address, overriding config and HTTP_ADDR.
        #[arg(long)]
        addr: Option<String>,
    },
    /// Print the effective configuration as TOML and exit.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve { config, addr } => {
            let config = load_config(config.as_deref(), addr)?;
            info!(
                http_addr = %config.http_addr,
                workers_min = config.workers.min,
                workers_max = config.workers.max,
                ready_capacity = config.queue.ready_capacity,
                "skuflowd starting"
            );
            let listener = tokio::net::TcpListener::bind(listen_addr(&config.http_addr)).await?;
            serve(Service::new(config), listener, shutdown_signal()).await
        }
        Command::Config { config } => {
            let config = load_config(config.as_deref(), None)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
