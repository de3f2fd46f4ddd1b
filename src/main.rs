//! mdadvance - advancement tree tooling
//!
//! Lays out data pack advancement trees and simulates player progress.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mdadvance::{packs, AdvancementManager, ServerConfig};
use mdadvance_core::{AdvancementId, DisplayPosition, PlayerProfile};
use mdadvance_server::CriterionTriggers;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Advancement layout and progress tool", long_about = None)]
struct Args {
    /// Server configuration file (TOML)
    #[arg(short, long, default_value = mdadvance::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the laid out position of every displayed advancement as JSON
    Layout {
        /// Data packs directory (defaults to the configured one)
        packs: Option<PathBuf>,
    },
    /// Award criteria to a player and print the resulting sync message as JSON
    Simulate {
        /// Data packs directory (defaults to the configured one)
        #[arg(long)]
        packs: Option<PathBuf>,
        /// Player id (names the progress file)
        #[arg(long, default_value_t = 1)]
        player_id: u64,
        /// Player name used in announcements
        #[arg(long, default_value = "Player")]
        name: String,
        /// Criteria to award, as `<advancement id>=<criterion>`
        #[arg(long = "award", value_name = "ID=CRITERION")]
        awards: Vec<String>,
        /// Write the player's progress file afterwards
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServerConfig::load_from_path(&args.config);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    info!("Starting mdadvance v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Layout { packs } => layout(config, packs),
        Command::Simulate {
            packs,
            player_id,
            name,
            awards,
            save,
        } => simulate(config, packs, PlayerProfile::new(player_id, name), &awards, save),
    }
}

fn with_packs(mut config: ServerConfig, packs: Option<PathBuf>) -> ServerConfig {
    if let Some(dir) = packs {
        config.data_packs_dir = dir;
    }
    config
}

fn layout(config: ServerConfig, packs: Option<PathBuf>) -> Result<()> {
    let config = with_packs(config, packs);
    let found = packs::discover_packs(&config.data_packs_dir)?;
    if found.is_empty() {
        warn!("No data packs in {}", config.data_packs_dir.display());
    }

    let manager = AdvancementManager::load(&config)?;
    let graph = manager.graph();
    let positions: BTreeMap<String, DisplayPosition> = graph
        .advancements()
        .filter_map(|a| graph.position(a.id()).map(|p| (a.id().to_string(), p)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&positions)?);
    Ok(())
}

fn parse_award(raw: &str) -> Result<(AdvancementId, String)> {
    let Some((id, criterion)) = raw.split_once('=') else {
        bail!("Expected <advancement id>=<criterion>, got {raw:?}");
    };
    let id = AdvancementId::parse(id).with_context(|| format!("Invalid advancement id in {raw:?}"))?;
    Ok((id, criterion.to_string()))
}

fn simulate(
    config: ServerConfig,
    packs: Option<PathBuf>,
    profile: PlayerProfile,
    awards: &[String],
    save: bool,
) -> Result<()> {
    let config = with_packs(config, packs);
    let awards = awards
        .iter()
        .map(|raw| parse_award(raw))
        .collect::<Result<Vec<_>>>()?;

    let manager = AdvancementManager::load(&config)?;
    let mut player = manager.join(profile, Box::new(CriterionTriggers::new()));
    for (id, criterion) in &awards {
        if !player.award(id, criterion) {
            warn!("Awarding {criterion:?} of {id} changed nothing");
        }
    }

    match player.flush_message() {
        Some(message) => println!("{}", serde_json::to_string_pretty(&message)?),
        None => info!("Nothing to sync"),
    }
    if save {
        player.save();
    }
    player.dispose();
    Ok(())
}
