#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::SocketAddr;

use clap::Parser;
use relay::{app::AppState, config, logging, registry, websocket};

/// Browser-to-UDP game relay -- WebRTC signaling bridge for legacy
/// Source/GoldSrc game servers.
#[derive(Parser, Debug)]
#[command(name = "webrtc-udp-relay")]
#[command(about = "WebRTC-to-UDP relay for legacy Source/GoldSrc game servers")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the relay.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load()?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    let validation = config::validate(&cfg);

    if cli.validate_config {
        match validation {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Allowed backends: {:?}", cfg.allowed_backends);
                println!("  Server catalog entries: {}", cfg.server_list.len());
                println!("  Auth required: {}", cfg.auth_required());
                println!("  Idle timeout (s): {}", cfg.idle_sec);
                return Ok(());
            }
            Err(err) => {
                eprintln!("Configuration validation failed:\n{err}");
                std::process::exit(1);
            }
        }
    }

    validation?;

    logging::init_with_config(&cfg.logging);

    let port = cfg.port;
    let idle_sec = cfg.idle_sec;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let state = AppState::new(cfg).map_err(|err| anyhow::anyhow!(err))?;

    let reaper = registry::spawn_idle_reaper(state.registry.clone(), idle_sec, state.shutdown.clone());

    let router = websocket::create_router(state.clone());
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| anyhow::anyhow!("failed to bind {addr}: {err}"))?;

    tracing::info!(%addr, "relay listening");

    let shutdown_signal = shutdown_on_ctrl_c(state.shutdown.clone());
    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    reaper.abort();
    tracing::info!("relay shut down");
    Ok(())
}

async fn shutdown_on_ctrl_c(shutdown: tokio_util::sync::CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    shutdown.cancel();
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn default_has_no_flags() {
        let cli = Cli::try_parse_from(["webrtc-udp-relay"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn validate_config_flag_parses() {
        let cli = Cli::try_parse_from(["webrtc-udp-relay", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
    }

    #[test]
    fn print_config_flag_parses() {
        let cli = Cli::try_parse_from(["webrtc-udp-relay", "--print-config"]).unwrap();
        assert!(cli.print_config);
    }

    #[test]
    fn validate_and_print_config_conflict() {
        let result = Cli::try_parse_from(["webrtc-udp-relay", "--validate-config", "--print-config"]);
        assert!(result.is_err());
    }
}
