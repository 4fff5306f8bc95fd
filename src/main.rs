mod config;
mod display;
mod downloader;
mod errors;
mod progress;
mod security;
mod utils;

use clap::{Parser, Subcommand};
use crate::config::AppConfig;
use crate::display::TerminalDisplay;
use crate::downloader::manager::{LifecycleController, Notification};
use crate::downloader::strategies::ScriptDownloader;
use crate::errors::AppError;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "spotube", version, about = "Download a Spotify playlist with live progress")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download every track of a playlist
    Download {
        /// Playlist link, e.g. https://open.spotify.com/playlist/<id>
        playlist: String,
        /// Output directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Helper program that performs the actual download
        #[arg(long)]
        helper: Option<String>,
        /// Seconds to wait for the worker on Ctrl-C before abandoning it
        #[arg(long)]
        stop_timeout: Option<u64>,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the configuration file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            AppConfig::default()
        }
    };

    match cli.command {
        Commands::Download { playlist, out_dir, helper, stop_timeout } => {
            if let Some(dir) = out_dir {
                config.download_path = dir;
            }
            if let Some(helper) = helper {
                config.helper_command = helper;
            }
            if stop_timeout.is_some() {
                config.stop_timeout_secs = stop_timeout;
            }
            run_download(&config, &playlist).await
        }
        Commands::Config { save } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                config.save()?;
            }
            Ok(())
        }
    }
}

/// Foreground loop: drain the channel, recompute the clocks, redraw.
async fn run_download(config: &AppConfig, playlist: &str) -> anyhow::Result<()> {
    let worker = Arc::new(ScriptDownloader::new(
        config.helper_command.clone(),
        config.helper_args.clone(),
        config.download_path.clone(),
    ));
    let mut controller = LifecycleController::new(worker, config.title_max_len)
        .with_stop_timeout(config.stop_timeout());
    let display = TerminalDisplay::new();

    if let Err(e) = controller.start(playlist) {
        if let AppError::InvalidSource(source) = &e {
            display.notify_invalid_source(source);
        }
        display.finish();
        return Err(e.into());
    }

    let mut interval = tokio::time::interval(config.poll_interval());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                if let Some(session) = controller.session() {
                    info!("Interrupted, stopping session {}", session.id);
                }
                tokio::task::block_in_place(|| controller.stop())?;
                break;
            }
            _ = interval.tick() => {
                let notifications = controller.poll();
                controller.tick(Instant::now());
                if let Some(snapshot) = controller.snapshot() {
                    display.render(&snapshot);
                }

                let mut worker_exited = false;
                for notification in notifications {
                    match notification {
                        Notification::Completed => display.notify_completed(),
                        Notification::WorkerExited => worker_exited = true,
                    }
                }
                if worker_exited {
                    break;
                }
            }
        }
    }

    display.finish();
    info!("Download ended in state {:?}", controller.state());
    if controller.rejected_events() > 0 {
        info!("{} malformed events were ignored", controller.rejected_events());
    }
    Ok(())
}
