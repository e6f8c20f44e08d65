// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! greenhouse-sim - publishes simulated greenhouse telemetry to an MQTT broker

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use greenhouse_sim::streaming::FixedBackoff;
use greenhouse_sim::{ConfigStore, MqttTransport, Publisher, Settings, SimulationLoop, VERSION};

/// Greenhouse sensor simulator
#[derive(Parser, Debug)]
#[command(name = "greenhouse-sim")]
#[command(version = VERSION)]
#[command(about = "Publishes synthetic greenhouse sensor readings over MQTT")]
struct Args {
    /// MQTT broker host
    #[arg(long, env = "MQTT_HOST", default_value = "mosquitto")]
    mqtt_host: String,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    mqtt_port: u16,

    #[arg(long, env = "MQTT_USER", default_value = "admin")]
    mqtt_user: String,

    #[arg(long, env = "MQTT_PASSWORD", default_value = "admin", hide_env_values = true)]
    mqtt_password: String,

    /// MQTT client identifier
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "greenhouse-sensor-simulator")]
    client_id: String,

    /// Keep-alive in seconds
    #[arg(long, env = "MQTT_KEEP_ALIVE", default_value_t = 60)]
    keep_alive: u64,

    /// Nominal seconds between publish cycles (jittered ±20%)
    #[arg(long, env = "PUBLISH_INTERVAL", default_value_t = 5.0)]
    interval: f64,

    /// Leading topic segment
    #[arg(long, env = "DOMAIN", default_value = "agriculture")]
    domain: String,

    /// Simulation file, reloaded when modified
    #[arg(short, long, env = "CONFIG_FILE", default_value = "/app/config/config.yaml")]
    config: PathBuf,

    /// Seconds between connection attempts
    #[arg(long, env = "RECONNECT_DELAY", default_value_t = 5)]
    reconnect_delay: u64,

    /// Seconds before a connection attempt is abandoned
    #[arg(long, env = "CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    /// Seconds before a single publish is abandoned
    #[arg(long, env = "PUBLISH_TIMEOUT", default_value_t = 5)]
    publish_timeout: u64,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

impl Args {
    fn into_settings(self) -> Settings {
        let log_level = if self.trace {
            "trace".to_string()
        } else if self.debug {
            "debug".to_string()
        } else {
            self.log_level
        };

        Settings {
            mqtt_host: self.mqtt_host,
            mqtt_port: self.mqtt_port,
            mqtt_username: Some(self.mqtt_user).filter(|u| !u.is_empty()),
            mqtt_password: Some(self.mqtt_password).filter(|p| !p.is_empty()),
            mqtt_client_id: self.client_id,
            keep_alive_secs: self.keep_alive,
            reconnect_delay_secs: self.reconnect_delay,
            connect_timeout_secs: self.connect_timeout,
            publish_timeout_secs: self.publish_timeout,
            publish_interval_secs: self.interval,
            domain: self.domain,
            config_file: self.config,
            log_level,
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Args::parse().into_settings();
    init_logging(&settings.log_level).context("failed to initialize logging")?;

    info!("greenhouse-sim v{} starting", VERSION);
    settings.validate().context("invalid settings")?;
    info!(
        "Broker {}:{}, domain '{}', interval {}s",
        settings.mqtt_host, settings.mqtt_port, settings.domain, settings.publish_interval_secs
    );

    // A missing file is fatal before we start dialing the broker
    let store = ConfigStore::new(&settings.config_file);
    if let Err(e) = store.refresh() {
        if e.is_fatal() {
            error!("{}. Exiting.", e);
            process::exit(1);
        }
        error!("Initial config load failed, starting with an empty configuration: {}", e);
    }

    let (transport, link) = MqttTransport::new(&settings);
    let publisher = Publisher::new(
        Arc::new(transport),
        FixedBackoff::new(settings.reconnect_delay()),
        settings.publish_timeout(),
    );
    let supervisor = publisher.supervise(link);

    tokio::select! {
        result = publisher.connect() => result.context("could not connect to MQTT broker")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received before connecting");
            return Ok(());
        }
    }

    let mut simulation = SimulationLoop::new(
        store,
        publisher.clone(),
        settings.domain.clone(),
        settings.publish_interval(),
    );

    tokio::select! {
        result = simulation.run() => {
            if let Err(e) = result {
                error!("{}. Exiting.", e);
                process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, disconnecting...");
            supervisor.abort();
            if let Err(e) = publisher.disconnect().await {
                error!("{}", e);
            }
        }
    }

    info!("greenhouse-sim stopped");
    Ok(())
}
