use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use passage_daemon::ActionExecutor;
use passage_daemon::DEFAULT_CONFIG_PATH;
use passage_daemon::DaemonConfig;
use passage_daemon::Resolver;
use passage_daemon::RuleTableResolver;
use passage_daemon::serve;
use passage_utils_seqpacket::SeqpacketListener;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "passaged", about = "Runs privileged actions on behalf of local clients")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let config = DaemonConfig::load(&args.config)?;

    let resolver: Arc<dyn Resolver> = Arc::new(RuleTableResolver::from_config(&config.rules)?);
    let executor = Arc::new(ActionExecutor::new(Duration::from_millis(
        config.http.timeout_ms,
    ))?);

    for listener in &config.listeners {
        let socket = SeqpacketListener::bind(&listener.path, listener.mode)
            .with_context(|| format!("failed to listen on {}", listener.path.display()))?;
        tokio::spawn(serve(socket, Arc::clone(&resolver), Arc::clone(&executor)));
    }

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    info!("shutting down");
    Ok(())
}
