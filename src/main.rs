use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use vfd_logger::cli::Args;
use vfd_logger::modbus::list_serial_ports;
use vfd_logger::{run_logger, SerialConnector, SqlConnector, StatusFile, VERSION};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .format_timestamp_secs()
        .init();

    if args.list_ports {
        return match print_serial_ports() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("❌ {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    info!("🖥️  VFD logger v{}", VERSION);

    let cancel = CancellationToken::new();
    tokio::spawn(watch_shutdown(cancel.clone()));

    let status = StatusFile::new(args.status_path());
    info!("📝 Status file: {}", status.path().display());

    match run_logger(&args.config, &SerialConnector, &SqlConnector, status, cancel).await {
        Ok(stats) => {
            info!("👋 Logger exited cleanly after {} ticks", stats.ticks);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("💥 Logger failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_serial_ports() -> Result<()> {
    let ports = list_serial_ports()?;

    println!("📡 Available Serial Ports:");
    if ports.is_empty() {
        println!("   ⚠️  No serial ports found");
    }
    for (index, port) in ports.iter().enumerate() {
        println!("   {}. {}", index + 1, port);
    }
    Ok(())
}

/// Cancel on Ctrl-C, or SIGTERM where the platform has it.
async fn watch_shutdown(cancel: CancellationToken) {
    wait_for_shutdown_signal().await;
    cancel.cancel();
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!("❌ Cannot install SIGTERM handler: {}", e);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("🛑 Ctrl-C received, stopping"),
        _ = terminate.recv() => info!("🛑 SIGTERM received, stopping"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Ctrl-C received, stopping"),
        Err(e) => {
            // Without a signal handler the logger runs until killed.
            error!("❌ Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
