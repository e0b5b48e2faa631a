// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use kasa_cloud::{DeviceRecord, HttpTransport, Session};
use kasa_config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Handle subcommands that need no session first
    match &cli.command {
        Commands::Completions { shell } => {
            cli::print_completions(*shell);
            return Ok(());
        }
        Commands::ShowConfig => {
            let config = kasa_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config.redacted())?);
            return Ok(());
        }
        _ => {}
    }

    let config = kasa_config::load(cli.config.as_deref())?;
    let session = connect(&cli, &config).await?;

    match &cli.command {
        Commands::Devices { json } => {
            let devices = session.list_devices()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(devices)?);
            } else {
                print_devices(devices);
            }
        }
        Commands::Status { alias, json } => {
            let status = session.find_device(alias)?.status().await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{alias}: {}", on_off(status.is_on));
                let info = &status.sysinfo;
                if let Some(model) = &info.model {
                    println!("  model:    {model}");
                }
                if let Some(sw) = &info.sw_ver {
                    println!("  firmware: {sw}");
                }
                if let Some(rssi) = info.rssi {
                    println!("  rssi:     {rssi} dBm");
                }
                if let Some(secs) = info.on_time.filter(|_| status.is_on) {
                    println!("  on for:   {secs}s");
                }
            }
        }
        Commands::On { alias } => {
            session.find_device(alias)?.turn_on().await?;
            println!("{alias}: on");
        }
        Commands::Off { alias } => {
            session.find_device(alias)?.turn_off().await?;
            println!("{alias}: off");
        }
        Commands::Toggle { alias } => {
            let now_on = session.find_device(alias)?.toggle().await?;
            println!("{alias}: {}", on_off(now_on));
        }
        Commands::ShowConfig | Commands::Completions { .. } => {}
    }
    Ok(())
}

/// Build an HTTP session from config + CLI overrides and authenticate it.
async fn connect(cli: &Cli, config: &Config) -> anyhow::Result<Session> {
    let email = cli
        .email
        .clone()
        .or_else(|| config.account.email.clone())
        .context("no account email: pass --email, set KASA_EMAIL, or set account.email in config")?;
    let password = config.account.resolve_password()?.with_context(|| {
        format!(
            "no account password: set {} or account.password_file in config",
            config.account.password_env
        )
    })?;

    let transport = match config.cloud.timeout_secs {
        Some(secs) => HttpTransport::with_timeout(Duration::from_secs(secs))?,
        None => HttpTransport::new(),
    };
    let session = Session::new(transport)
        .with_cloud_url(config.cloud.url.as_str())
        .with_app_type(config.cloud.app_type.as_str());

    debug!(url = %session.cloud_url(), "authenticating");
    session
        .authenticate(&email, &password)
        .await
        .with_context(|| format!("authenticating {email}"))?;
    Ok(session)
}

fn print_devices(devices: &[DeviceRecord]) {
    if devices.is_empty() {
        println!("No devices registered to this account.");
        return;
    }
    let width = devices.iter().map(|d| d.alias.len()).max().unwrap_or(0);
    for d in devices {
        println!(
            "{:<width$}  {:<12}  {}",
            d.alias,
            d.device_model.as_deref().unwrap_or("-"),
            d.device_id,
        );
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
