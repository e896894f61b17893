use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use common_auth::JwtVerifier;
use common_observability::AuthMetrics;
use ejabberd_auth::config::{load_config, resolve_config_path};
use ejabberd_auth::{Dispatcher, Session};
use structopt::StructOpt;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(StructOpt, Debug)]
#[structopt(name = "ejabberd-auth-jwt")]
struct Cli {
    /// Configuration file (TOML). Defaults to $EJABBERD_EXTERNAL_AUTH_JWT_CONFIG_PATH
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set
    #[structopt(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // stdout carries the protocol, diagnostics go to stderr only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn run(cli: Cli) -> Result<u64> {
    let path = resolve_config_path(cli.config)?;
    let config = load_config(&path)?;
    info!(
        config = %path.display(),
        algorithm = ?config.algorithm,
        user_claim = %config.user_claim,
        rotation = config.secret_old.is_some(),
        server_expiration = ?config.expiration_seconds,
        "starting ejabberd-auth-jwt in sync mode"
    );

    let metrics = AuthMetrics::new().context("Failed to register metrics")?;
    let dispatcher = Dispatcher::new(JwtVerifier::new(config), metrics.clone());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = Session::new(stdin.lock(), stdout.lock(), dispatcher).run();

    match metrics.render() {
        Ok(text) => debug!("final counters:\n{text}"),
        Err(err) => debug!("failed to render metrics: {err}"),
    }

    let served = result.context("ejabberd stream framing broken")?;
    info!(served, "ejabberd closed the stream, exiting");
    Ok(served)
}

fn main() -> ExitCode {
    let cli = Cli::from_args();
    init_tracing(&cli.log_level);

    match run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
