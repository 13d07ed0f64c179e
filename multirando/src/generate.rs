use anyhow::{bail, Result};
use log::info;
use multirando_game::MultiWorld;
use multirando_logic::{can_beat_game, fulfills_accessibility};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    balance::balance_multiworld_progression,
    distribute::{distribute_items_restrictive, FillHook},
    fill::FillError,
    settings::GenerationSettings,
    spoiler_log::{get_spoiler_log, SpoilerLog, SpoilerPlacement},
};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Randomization {
    pub seed: usize,
    pub seed_name: String,
    pub placements: Vec<SpoilerPlacement>,
    pub spoiler_log: SpoilerLog,
}

pub fn get_rng(seed: usize) -> rand::rngs::StdRng {
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&seed.to_le_bytes());
    rand::rngs::StdRng::from_seed(rng_seed)
}

pub fn get_seed_name<R: Rng>(rng: &mut R) -> String {
    let num_digits = 20;
    (0..num_digits)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Fills `world` in place and verifies the result. A failed attempt leaves `world`
/// partially filled, so callers retry on a fresh copy.
pub fn generate(
    world: &mut MultiWorld,
    settings: &GenerationSettings,
    hooks: &mut [&mut dyn FillHook],
) -> Result<Randomization> {
    let seed = settings.seed;
    let mut rng = get_rng(seed);
    let seed_name = get_seed_name(&mut rng);

    distribute_items_restrictive(world, &mut rng, hooks)?;
    if settings.progression_balancing {
        balance_multiworld_progression(world, &mut rng)?;
    }
    if !can_beat_game(world, None) {
        return Err(FillError::Unbeatable("game not beatable after fill".to_string()).into());
    }
    if settings.verify_accessibility && !fulfills_accessibility(world) {
        bail!("Seed {seed}: not all locations reachable");
    }
    info!("Seed {seed} ({seed_name}) generated");

    let spoiler_log = get_spoiler_log(world);
    Ok(Randomization {
        seed,
        seed_name,
        placements: spoiler_log.placements.clone(),
        spoiler_log,
    })
}
