use std::path::Path;

use anyhow::{bail, Context, Result};
use multirando::fill::FillError;
use multirando::generate::{generate, Randomization};
use multirando::settings::GenerationSettings;
use multirando_game::load::load_multiworld;
use multirando_game::{MultiWorld, Requirement};
use multirando_logic::{can_beat_game, fulfills_accessibility};

fn load_demo() -> Result<MultiWorld> {
    load_multiworld(Path::new("data/demo_multiworld.json"))
}

// Mirrors the CLI: try successive seeds on fresh copies of the world.
fn generate_any(world: &MultiWorld, first_seed: usize) -> Result<(MultiWorld, Randomization)> {
    for seed in first_seed..first_seed + 20 {
        let mut attempt_world = world.clone();
        let settings = GenerationSettings {
            seed,
            verify_accessibility: true,
            ..GenerationSettings::default()
        };
        if let Ok(randomization) = generate(&mut attempt_world, &settings, &mut []) {
            return Ok((attempt_world, randomization));
        }
    }
    bail!("no seed succeeded");
}

#[test]
fn demo_world_generates() -> Result<()> {
    let world = load_demo()?;
    let (filled, randomization) = generate_any(&world, 0)?;

    assert!(can_beat_game(&filled, None));
    assert!(fulfills_accessibility(&filled));
    assert_eq!(randomization.seed_name.len(), 20);
    // Every location, including the two locked victory events:
    assert_eq!(randomization.placements.len(), filled.locations.len());
    assert!(filled.locations.iter().all(|loc| loc.item.is_some()));

    for placement in &randomization.placements {
        if placement.item == "Key" {
            assert_eq!(placement.location_player, "Alice");
        }
        if placement.item == "Gem" {
            assert_eq!(placement.location_player, "Alice");
        }
        if placement.location == "Dusty Pot" {
            let item_name_id = filled.item_name_isv.index_by_key[&placement.item];
            let advancement = filled
                .items
                .iter()
                .any(|i| i.name_id == item_name_id && i.advancement);
            assert!(!advancement);
        }
    }
    let altar = filled.get_location("Altar", 1).context("missing Altar")?;
    let altar_item = filled.locations[altar].item.context("Altar empty")?;
    assert!(filled.items[altar_item].advancement);

    let last_sphere = randomization
        .spoiler_log
        .playthrough
        .last()
        .context("empty playthrough")?;
    assert!(!last_sphere.items.is_empty());
    Ok(())
}

#[test]
fn generation_is_reproducible() -> Result<()> {
    let world = load_demo()?;
    let (_, first) = generate_any(&world, 100)?;
    let (_, second) = generate_any(&world, 100)?;
    assert_eq!(first.seed, second.seed);
    assert_eq!(first.seed_name, second.seed_name);
    assert_eq!(first.placements, second.placements);
    Ok(())
}

#[test]
fn missing_completion_item_is_unbeatable() {
    let mut world = MultiWorld::new(1);
    let menu = world.players[0].origin_region;
    for i in 0..3 {
        world.add_location(0, menu, &format!("Chest {i}"));
        let item = world.create_item(0, &format!("Rupee {i}"), false);
        world.add_to_pool(item);
    }
    // The crown is never created, so nothing in the pool can satisfy the goal.
    let crown = world.item_name_id("Crown");
    world.players[0].completion_condition = Requirement::item(0, crown);

    let settings = GenerationSettings::default();
    let err = match generate(&mut world, &settings, &mut []) {
        Ok(_) => panic!("generation should fail"),
        Err(err) => err,
    };
    assert!(matches!(
        err.downcast_ref::<FillError>(),
        Some(FillError::Unbeatable(_))
    ));
    assert!(world.locations.iter().all(|loc| loc.item.is_some()));
}
