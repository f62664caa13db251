//! On-disk description of the shards a host runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec2;
use ironvale_core::catalog::Catalog;
use ironvale_core::config::SimConfig;
use ironvale_core::movement::{NavArea, Obstacle};
use ironvale_core::persistence::JsonFileStore;
use ironvale_core::simulation::{Simulation, World};
use ironvale_core::stats::BaseStats;
use ironvale_core::zone::{Rect, Zones};
use serde::Deserialize;
use tracing::{info, warn};

/// Top-level host file. Relative paths are resolved against the file's
/// directory.
#[derive(Debug, Deserialize)]
pub struct WorldFile {
    /// Gameplay tuning. Defaults apply when absent.
    #[serde(default)]
    pub config: Option<PathBuf>,
    /// Template catalog.
    pub catalog: PathBuf,
    /// Directory holding one JSON file per character.
    pub save_dir: PathBuf,
    /// Stop after this many ticks. Runs forever when absent.
    #[serde(default)]
    pub ticks: Option<u64>,
    /// Shards to run.
    pub shards: Vec<ShardFile>,
}

/// One shard's layout.
#[derive(Debug, Deserialize)]
pub struct ShardFile {
    /// Seed of the shard's random generator.
    pub seed: u64,
    /// Walkable bounds.
    pub bounds: Rect,
    /// Blocked areas inside the bounds.
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    /// Safe zones, PvP zones and spawn points.
    #[serde(default)]
    pub zones: Zones,
    /// Wild monsters placed at startup.
    #[serde(default)]
    pub monsters: Vec<MonsterSpawn>,
    /// NPCs placed at startup.
    #[serde(default)]
    pub npcs: Vec<NpcSpawn>,
}

/// A monster placement.
#[derive(Debug, Deserialize)]
pub struct MonsterSpawn {
    /// Monster template name.
    pub template: String,
    /// Home position.
    pub position: Vec2,
}

/// An NPC placement.
#[derive(Debug, Deserialize)]
pub struct NpcSpawn {
    /// Display name.
    pub name: String,
    /// Position.
    pub position: Vec2,
}

/// Everything loaded from a world file.
pub struct Loaded {
    /// Tuning shared by every shard.
    pub config: SimConfig,
    /// Shards ready to step.
    pub world: World,
    /// Tick limit.
    pub ticks: Option<u64>,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Loads the world file at `path` and builds every shard.
///
/// # Errors
///
/// Unreadable files, invalid JSON, failed validation or monster templates
/// missing from the catalog.
pub fn load(path: &Path) -> Result<Loaded> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let file: WorldFile =
        serde_json::from_str(&read(path)?).with_context(|| format!("parsing {}", path.display()))?;

    let config = match &file.config {
        Some(config) => {
            let config_path = base.join(config);
            SimConfig::from_json_str(&read(&config_path)?)
                .with_context(|| format!("loading config {}", config_path.display()))?
        }
        None => SimConfig::default(),
    };
    let catalog_path = base.join(&file.catalog);
    let catalog = Arc::new(
        Catalog::from_json_str(&read(&catalog_path)?)
            .with_context(|| format!("loading catalog {}", catalog_path.display()))?,
    );
    let save_dir = base.join(&file.save_dir);

    let mut world = World::new();
    for (index, shard) in file.shards.into_iter().enumerate() {
        let mut nav = NavArea::open(shard.bounds);
        for obstacle in shard.obstacles {
            nav = nav.with_obstacle(obstacle);
        }
        let store = JsonFileStore::open(save_dir.join(format!("shard-{index}")))
            .with_context(|| format!("opening save directory for shard {index}"))?;
        let mut sim = Simulation::new(
            shard.seed,
            config.clone(),
            Arc::clone(&catalog),
            shard.zones,
            Arc::new(nav),
        )
        .with_store(Box::new(store));

        for spawn in &shard.monsters {
            sim.spawn_monster(&spawn.template, spawn.position)
                .with_context(|| format!("shard {index}: spawning {}", spawn.template))?;
        }
        for npc in &shard.npcs {
            sim.spawn_npc(&npc.name, BaseStats::default(), npc.position);
        }
        if sim.arena().is_empty() {
            warn!(shard = index, "shard starts empty");
        }
        info!(
            shard = index,
            seed = shard.seed,
            entities = sim.arena().entity_count(),
            "shard ready"
        );
        world.add_shard(sim);
    }

    Ok(Loaded {
        config,
        world,
        ticks: file.ticks,
    })
}
