use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use multirando::generate::{generate, Randomization};
use multirando::settings::{load_generation_settings, GenerationSettings};
use multirando_game::load::load_multiworld;
use multirando_game::{Accessibility, MultiWorld};
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    world: PathBuf,

    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    random_seed: Option<usize>,

    #[arg(long)]
    max_attempts: Option<usize>,

    // Overrides every player's accessibility ("full" or "minimal").
    #[arg(long)]
    accessibility: Option<Accessibility>,

    #[arg(long)]
    no_progression_balancing: bool,

    #[arg(long)]
    verify_accessibility: bool,

    #[arg(long)]
    output_spoiler_log: Option<PathBuf>,
}

fn get_randomization(
    args: &Args,
    world: &MultiWorld,
    base_settings: &GenerationSettings,
) -> Result<Randomization> {
    let root_seed = match args.random_seed {
        Some(s) => s,
        None => (rand::rngs::StdRng::from_entropy().next_u64() & 0xFFFFFFFF) as usize,
    };
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&root_seed.to_le_bytes());
    let mut rng = rand::rngs::StdRng::from_seed(rng_seed);
    let max_attempts = args.max_attempts.unwrap_or(base_settings.max_attempts);

    for attempt_num in 1..=max_attempts {
        let seed = (rng.next_u64() & 0xFFFFFFFF) as usize;
        let settings = GenerationSettings {
            seed,
            ..base_settings.clone()
        };
        info!("Attempt {attempt_num}/{max_attempts}: seed={seed}");
        let mut attempt_world = world.clone();
        match generate(&mut attempt_world, &settings, &mut []) {
            Ok(randomization) => {
                return Ok(randomization);
            }
            Err(e) => {
                info!("Attempt {attempt_num}/{max_attempts}: Generation failed: {}", e);
            }
        }
    }
    bail!("Exhausted generation attempts");
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let mut world = load_multiworld(&args.world)?;
    if let Some(accessibility) = args.accessibility {
        for player in world.players.iter_mut() {
            player.accessibility = accessibility;
        }
    }
    let mut settings = match &args.settings {
        Some(path) => load_generation_settings(path)?,
        None => GenerationSettings::default(),
    };
    if args.no_progression_balancing {
        settings.progression_balancing = false;
    }
    if args.verify_accessibility {
        settings.verify_accessibility = true;
    }
    info!(
        "Loaded {} players, {} locations, {} items",
        world.num_players(),
        world.locations.len(),
        world.itempool.len()
    );

    let randomization = get_randomization(&args, &world, &settings)?;
    info!(
        "Seed {} ({}): {} placements, {} playthrough spheres",
        randomization.seed,
        randomization.seed_name,
        randomization.placements.len(),
        randomization.spoiler_log.playthrough.len()
    );

    if let Some(output_spoiler_log) = &args.output_spoiler_log {
        let spoiler_str = serde_json::to_string_pretty(&randomization.spoiler_log)?;
        std::fs::write(output_spoiler_log, spoiler_str).with_context(|| {
            format!(
                "Unable to write spoiler log to {}",
                output_spoiler_log.display()
            )
        })?;
        info!("Wrote spoiler log to {}", output_spoiler_log.display());
    }
    Ok(())
}
