mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use communicator::{ClientConfig, DeviceInfo, EntryKind, ProcessConnector, Session};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = ClientConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(ms) = cli.timeout_ms {
        config.read_timeout_ms = ms;
    }
    if cli.bridge.is_some() {
        config.bridge = cli.bridge.clone();
    }

    let bridge = config
        .bridge
        .clone()
        .context("No bridge command configured. Pass --bridge or set `bridge` in the config file")?;

    let mut session = Session::new(config.session_options());
    session
        .connect(&ProcessConnector::new(bridge))
        .await
        .context("Failed to connect to device")?;

    let outcome = run(&cli, &mut session).await;
    session.disconnect();
    outcome
}

async fn run(cli: &Cli, session: &mut Session) -> Result<()> {
    match &cli.command {
        Commands::Info => {
            let info = session.cached_info().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&info);
            }
        }
        Commands::Ls => {
            let entries = session.ls().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    let size = entry
                        .size_bytes
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    match entry.kind {
                        EntryKind::File => println!("{:>10}  {}", size, entry.name),
                        EntryKind::Directory => {
                            println!("{:>10}  {}/", size, entry.name.blue().bold())
                        }
                    }
                }
            }
        }
        Commands::Push { local, dest } => {
            let dest = match dest {
                Some(d) => d.clone(),
                None => cli::default_dest(local)
                    .with_context(|| format!("Cannot derive a device name from {}", local.display()))?,
            };
            let payload = tokio::fs::read(local)
                .await
                .with_context(|| format!("Failed to read {}", local.display()))?;

            let bar = ProgressBar::new(payload.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")?
                    .progress_chars("=>-"),
            );
            bar.set_message(dest.clone());

            let total = payload.len() as u64;
            let result = session
                .push_with_progress(&payload, &dest, |remaining| bar.set_position(total - remaining))
                .await;
            bar.finish_and_clear();

            let result = result?;
            println!(
                "{} {} ({} bytes)",
                "pushed".green(),
                result.path,
                result.bytes_transferred
            );
        }
        Commands::Pull { remote, output } => {
            let data = session.pull(remote).await?;
            let out = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(remote.rsplit('/').next().unwrap_or(remote.as_str())));
            tokio::fs::write(&out, &data)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("{} {} -> {} ({} bytes)", "pulled".green(), remote, out.display(), data.len());
        }
        Commands::Rm { path } => {
            let removed = session.rm(path).await?;
            println!("{} {}", "removed".green(), removed);
        }
        Commands::Mv { source, dest } => {
            let moved = session.mv(source, dest).await?;
            println!("{} {} -> {}", "moved".green(), source, moved);
        }
        Commands::Play { path } => {
            let playing = session.play(path).await?;
            println!("{} {}", "playing".green(), playing);
        }
        Commands::Configs => {
            let info = session.cached_info().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info.loaded_configurations)?);
            } else if info.loaded_configurations.is_empty() {
                println!("{}", "No configurations uploaded".yellow());
            } else {
                for conf in &info.loaded_configurations {
                    let uploaded = conf
                        .uploaded_at
                        .as_ref()
                        .and_then(|u| u.to_datetime())
                        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!(
                        "{:<6} {:<24} {:>8} KB  uploaded {}",
                        conf.color_code,
                        conf.name,
                        conf.size / 1000,
                        uploaded
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_info(info: &DeviceInfo) {
    println!("{} {}", "Device:".bold(), info.device_name);
    println!(
        "{} {} ({}), built {}",
        "Firmware:".bold(),
        info.firmware_version,
        info.git_commit_sha,
        info.build_date.format("%Y-%m-%d %H:%M")
    );
    println!("{} {:?}", "Mode:".bold(), info.kind);
    println!(
        "{} {:.2}% of {:.1} MB",
        "Used:".bold(),
        info.usage_percent(),
        info.total_bytes() as f64 / 1_000_000.0
    );
    println!("{} {} configuration(s)", "Loaded:".bold(), info.loaded_configurations.len());
}
