mod check_command;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    telegate_config::TelegateConfig,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "telegate",
    version,
    about = "Telegate: expose a Telegram bot to MCP clients over SSE"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, global = true, env = "TELEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge (default when no subcommand is provided).
    Serve,
    /// Validate the configuration and report errors and warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// File (or discovered) config, then environment overrides, then CLI flags.
fn resolve_config(cli: &Cli) -> anyhow::Result<TelegateConfig> {
    let config = telegate_config::load_or_discover(cli.config.as_deref())?;
    let mut config = telegate_config::apply_env_overrides(config);
    if let Some(bind) = &cli.bind {
        config.server.bind.clone_from(bind);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = resolve_config(&cli)?;

    match cli.command {
        None | Some(Commands::Serve) => {
            let report = telegate_config::validate(&config);
            for diagnostic in &report.diagnostics {
                warn!(%diagnostic, "config diagnostic");
            }
            if report.has_errors() {
                anyhow::bail!(
                    "configuration has {} error(s); run `telegate check` for details",
                    report.count(telegate_config::Severity::Error)
                );
            }

            info!(version = env!("CARGO_PKG_VERSION"), "telegate starting");
            telegate_gateway::start_server(config).await
        },
        Some(Commands::Check { verbose }) => {
            check_command::check(&config, cli.config.as_deref(), verbose)
        },
    }
}
