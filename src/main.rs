use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use hookrelay::hookrelay::config::{Cli, ServerConfig};
use hookrelay::hookrelay::init;
use hookrelay::hookrelay::sink::StdoutSink;

// Logs go to stderr; stdout carries the relayed payloads.
fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}:{}] {} - {}",
                buf.timestamp_millis(),
                record.module_path().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();

    info!("hookrelay starting up");

    let config = match ServerConfig::from_cli(Cli::parse()) {
        Ok(config) => {
            info!("Configuration loaded: addr {}, topics {:?}", config.addr, config.topics);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                interrupt.cancel();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });

    if let Err(e) = init(config, Arc::new(StdoutSink::new()), shutdown).await {
        match e.code() {
            Some(code) if code.is_startup() => error!("{}: {}", code.description(), e),
            _ => error!("Relay stopped with error: {}", e),
        }
        return ExitCode::FAILURE;
    }

    info!("hookrelay stopped");
    ExitCode::SUCCESS
}
