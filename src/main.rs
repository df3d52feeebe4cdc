//! Headless front end for the MPRIS indicator engine.
//!
//! Without a desktop shell attached there are no windows to match, so
//! players are arbitrated on playback state and arrival order alone.

use std::{error::Error, path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use futures::StreamExt;
use mpris_indicator::{
    config::Config,
    services::mpris::{MprisIndicator, XdgIconTheme, window::HeadlessWindows},
    tracing_config,
};
use tracing::{info, instrument};

const SETTLE_TIME: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "mpris-indicator")]
#[command(about = "Track MPRIS players and pick the one to show")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the active player until interrupted
    Run,
    /// Print the active player and every live player, then exit
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the JSON schema of the config file
    Schema,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::Schema = command {
        let schema = schemars::schema_for!(Config);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = match cli.config {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    match command {
        Commands::Run => {
            if config.general.log_to_file {
                tracing_config::init_with_file(config.general.log_level)?;
            } else {
                tracing_config::init(config.general.log_level)?;
            }
            run(&config).await?;
        }
        Commands::Status { json } => {
            tracing_config::init(config.general.log_level)?;
            status(&config, json).await?;
        }
        Commands::Schema => {}
    }

    Ok(())
}

async fn start(config: &Config) -> Result<MprisIndicator, Box<dyn Error>> {
    let indicator = MprisIndicator::start(
        (&config.media).into(),
        Arc::new(HeadlessWindows),
        Arc::new(XdgIconTheme::default()),
    )
    .await?;
    Ok(indicator)
}

#[instrument(skip(config))]
async fn run(config: &Config) -> Result<(), Box<dyn Error>> {
    let indicator = start(config).await?;
    let mut active = Box::pin(indicator.active_player_monitored());

    loop {
        tokio::select! {
            Some(player) = active.next() => match player {
                Some(player) => info!(
                    player = %player.id,
                    playback = ?player.playback,
                    "{} - {}", player.artist, player.title
                ),
                None => info!("No active player"),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down");
    indicator.stop().await;
    Ok(())
}

async fn status(config: &Config, json: bool) -> Result<(), Box<dyn Error>> {
    let indicator = start(config).await?;
    tokio::time::sleep(SETTLE_TIME).await;

    let active = indicator.active_player();
    let players = indicator.players();
    indicator.stop().await;

    if json {
        let report = serde_json::json!({
            "active": active,
            "players": players,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &active {
        Some(player) => println!("Active: {} ({})", player.identity, player.id),
        None => println!("Active: none"),
    }
    for player in &players {
        println!(
            "  {:<40} {:<8} {} - {}",
            player.id.to_string(),
            format!("{:?}", player.playback),
            player.artist,
            player.title
        );
    }

    Ok(())
}
