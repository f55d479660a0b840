// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Go2 WebRTC relay server
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:8000
//! go2-relay
//!
//! # Custom port, STUN server and config file
//! go2-relay --port 9000 --ice-server stun:stun.l.google.com:19302
//! go2-relay --config relay.toml
//!
//! # Exercise the HTTP surface without touching the network
//! go2-relay --transport intra
//!
//! # Configuration helpers
//! go2-relay gen-config --output relay.toml
//! go2-relay validate --config relay.toml
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use go2_relay::{build_router, BridgeSettings, RelayBridge, RelayConfig};
use go2_webrtc::transport::IntraPeerFactory;
use go2_webrtc::{HttpSignaling, PeerFactory, RtcPeerFactory};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Go2 WebRTC relay server
#[derive(Parser, Debug)]
#[command(name = "go2-relay")]
#[command(about = "WebRTC relay between a Unitree Go2 and remote operator clients")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// HTTP server port
    #[arg(short, long)]
    port: Option<u16>,

    /// STUN/TURN servers (comma-separated)
    #[arg(long, value_delimiter = ',')]
    ice_server: Option<Vec<String>>,

    /// Peer connection backend
    #[arg(long, value_enum, default_value = "rtc")]
    transport: Transport,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    /// WebRTC (ICE/DTLS/SCTP)
    Rtc,
    /// In-process peers, no network traffic
    Intra,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "relay.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;

    // Initialize logging
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let factory: Arc<dyn PeerFactory> = match args.transport {
        Transport::Rtc => Arc::new(RtcPeerFactory::new()),
        Transport::Intra => Arc::new(IntraPeerFactory::new()),
    };
    let signaling = Arc::new(HttpSignaling::new(config.http_timeout())?);
    let bridge = Arc::new(RelayBridge::new(
        factory,
        signaling,
        BridgeSettings::from_config(&config),
    ));

    let app = build_router(Arc::clone(&bridge));
    let addr = config.listen_addr();
    info!("Go2 relay v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP server: http://{}", addr);
    info!("Transport: {:?}", args.transport);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    let teardown = bridge.shutdown().await;
    if !teardown.is_clean() {
        tracing::warn!("{} resource(s) failed to close", teardown.failures().len());
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<RelayConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::from_file(path)?,
        None => RelayConfig::default(),
    };

    if let Some(bind) = &args.bind {
        config.bind = bind.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(servers) = &args.ice_server {
        config.ice_servers = servers.clone();
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = RelayConfig {
        ice_servers: vec!["stun:stun.l.google.com:19302".into()],
        ..Default::default()
    };
    let toml_str = toml::to_string_pretty(&config)?;

    let content = format!(
        r#"# Go2 Relay Configuration
# Generated by go2-relay gen-config
#
# validation_timeout_secs = 0 waits forever for the robot.

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match RelayConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Listen: {}", config.listen_addr());
            println!("ICE servers: {}", config.ice_servers.len());
            println!("Default topics:");
            for topic in &config.default_topics {
                println!("  {}", topic);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}
