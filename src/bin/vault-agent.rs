use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vault_agent::{Configuration, Scheduler, Session};

/// A long-lived client agent that authenticates against vault with an
/// AppRole credential pair and keeps KV v2, dynamic, and static database
/// secrets refreshed in memory.
#[derive(Parser, Debug)]
#[command(name = "vault-agent", version, about)]
struct Args {
    /// Path to the INI configuration file.
    #[arg(long, default_value = "./vault-agent.ini")]
    config: std::path::PathBuf,

    /// Run a single refresh of every enabled domain and exit, instead of
    /// starting the worker loops. Useful for health-checking configuration.
    #[arg(long)]
    once: bool,
}

fn install_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    install_logging();

    let config = match Configuration::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return std::process::ExitCode::from(1);
        }
    };

    let session = match Session::new(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to build session");
            return std::process::ExitCode::from(1);
        }
    };

    if let Err(e) = session.login().await {
        tracing::error!(error = %e, "initial login failed");
        return std::process::ExitCode::from(1);
    }
    tracing::info!("login succeeded");

    if args.once {
        vault_agent::scheduler::run_once(&session).await;
        return std::process::ExitCode::from(0);
    }

    let session = Arc::new(session);
    let scheduler = Scheduler::new(session.clone());
    let shutdown = scheduler.shutdown_handle();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!(target: "vault_agent::scheduler", "shutdown signal received");
        let _ = signal_shutdown.send(true);

        // A second interrupt forces an immediate exit; the core does not
        // need to guarantee clean shutdown past this point.
        wait_for_sigint().await;
        tracing::warn!("second interrupt received, forcing exit");
        std::process::exit(130);
    });

    let fatal = scheduler.run().await;
    drop(scheduler);

    match Arc::try_unwrap(session) {
        Ok(session) => session.shutdown(),
        Err(_) => tracing::warn!("session still has outstanding references at shutdown"),
    }

    if fatal {
        std::process::ExitCode::from(1)
    } else {
        std::process::ExitCode::from(0)
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn wait_for_sigint() {
    let _ = tokio::signal::ctrl_c().await;
}
