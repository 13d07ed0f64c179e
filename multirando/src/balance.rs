use log::{debug, info, warn};
use multirando_game::{LocationIdx, LocationProgressType, MultiWorld, PlayerId};
use multirando_logic::CollectionState;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

use crate::fill::FillError;

// Players with this many fewer reachable locations than the best-off player get balanced:
pub const BALANCING_LOCATION_MARGIN: usize = 20;

pub fn swap_location_item(
    world: &mut MultiWorld,
    location_1: LocationIdx,
    location_2: LocationIdx,
) {
    let item_1 = world.remove_item(location_1);
    let item_2 = world.remove_item(location_2);
    if let Some(item) = item_2 {
        world.push_item(location_1, item);
    }
    if let Some(item) = item_1 {
        world.push_item(location_2, item);
    }
}

// Reachable subset of `locations`, without collecting anything.
fn get_sphere_locations(
    world: &MultiWorld,
    state: &mut CollectionState,
    locations: &BTreeSet<LocationIdx>,
) -> BTreeSet<LocationIdx> {
    locations
        .iter()
        .copied()
        .filter(|&loc| state.can_reach_location(world, loc))
        .collect()
}

fn count_sphere(
    world: &MultiWorld,
    sphere: &BTreeSet<LocationIdx>,
    unchecked: &mut BTreeSet<LocationIdx>,
    reachable_count: &mut BTreeMap<PlayerId, usize>,
) {
    for loc in sphere {
        unchecked.remove(loc);
        let location = &world.locations[*loc];
        if !location.locked {
            if let Some(count) = reachable_count.get_mut(&location.player) {
                *count += 1;
            }
        }
    }
}

fn is_event(world: &MultiWorld, loc: LocationIdx) -> bool {
    world.locations[loc].event && world.locations[loc].item.is_some()
}

/// Moves progression items of players who fall far behind into earlier spheres.
///
/// Walks the spheres of the filled world. Whenever a balancing-enabled player can reach
/// `BALANCING_LOCATION_MARGIN` fewer locations than the best-off player, the items that player
/// needs from the upcoming spheres are swapped into already-reachable filler locations.
pub fn balance_multiworld_progression<R: Rng>(
    world: &mut MultiWorld,
    rng: &mut R,
) -> Result<(), FillError> {
    let balanceable_players: BTreeSet<PlayerId> = world
        .player_ids()
        .filter(|&p| world.players[p].progression_balancing)
        .collect();
    if balanceable_players.is_empty() {
        info!("Skipping multiworld progression balancing.");
        return Ok(());
    }
    info!(
        "Balancing multiworld progression for {} players.",
        balanceable_players.len()
    );

    let mut state = CollectionState::new(world);
    let mut checked_locations: BTreeSet<LocationIdx> = BTreeSet::new();
    let mut unchecked_locations: BTreeSet<LocationIdx> = (0..world.locations.len()).collect();
    let mut reachable_locations_count: BTreeMap<PlayerId, usize> = world
        .player_ids()
        .filter(|&p| !world.get_filled_locations(Some(p)).is_empty())
        .map(|p| (p, 0))
        .collect();
    let mut moved_item_count = 0;

    loop {
        let mut sphere_locations = get_sphere_locations(world, &mut state, &unchecked_locations);
        count_sphere(
            world,
            &sphere_locations,
            &mut unchecked_locations,
            &mut reachable_locations_count,
        );

        if !checked_locations.is_empty() {
            let max_count = reachable_locations_count.values().copied().max().unwrap_or(0);
            let threshold = max_count.saturating_sub(BALANCING_LOCATION_MARGIN);
            let balancing_players: BTreeSet<PlayerId> = reachable_locations_count
                .iter()
                .filter(|&(p, &count)| count < threshold && balanceable_players.contains(p))
                .map(|(&p, _)| p)
                .collect();
            if !balancing_players.is_empty() {
                let (moved, newly_reachable) = balance_sphere(
                    world,
                    rng,
                    &mut state,
                    &checked_locations,
                    &mut unchecked_locations,
                    &sphere_locations,
                    &mut reachable_locations_count,
                    &balancing_players,
                    threshold,
                )?;
                moved_item_count += moved;
                sphere_locations.extend(newly_reachable);
            }
        }

        for &loc in &sphere_locations {
            if is_event(world, loc) {
                state.collect_location(world, loc);
            }
        }
        checked_locations.extend(sphere_locations.iter().copied());

        if state.has_beaten_game(world, None) {
            break;
        } else if sphere_locations.is_empty() {
            warn!("Progression balancing ran out of paths.");
            break;
        }
    }
    info!("Progression balancing moved {moved_item_count} items");
    Ok(())
}

// Performs the swaps for one sphere. Returns the number of items moved and the locations
// that became reachable as a result.
#[allow(clippy::too_many_arguments)]
fn balance_sphere<R: Rng>(
    world: &mut MultiWorld,
    rng: &mut R,
    state: &mut CollectionState,
    checked_locations: &BTreeSet<LocationIdx>,
    unchecked_locations: &mut BTreeSet<LocationIdx>,
    sphere_locations: &BTreeSet<LocationIdx>,
    reachable_locations_count: &mut BTreeMap<PlayerId, usize>,
    balancing_players: &BTreeSet<PlayerId>,
    threshold: usize,
) -> Result<(usize, Vec<LocationIdx>), FillError> {
    // Look ahead to find the items the balancing players are waiting on.
    let mut balancing_state = state.clone();
    let mut balancing_unchecked_locations = unchecked_locations.clone();
    let mut balancing_reachables = reachable_locations_count.clone();
    let mut balancing_sphere = sphere_locations.clone();
    let mut candidate_items: BTreeMap<PlayerId, BTreeSet<LocationIdx>> = BTreeMap::new();
    loop {
        for &loc in &balancing_sphere {
            if !is_event(world, loc) {
                continue;
            }
            balancing_state.collect_location(world, loc);
            let location = &world.locations[loc];
            let Some(item) = location.item else {
                continue;
            };
            let player = world.items[item].player;
            // Only items that ended up in another player's world are moved.
            if !location.locked
                && balancing_players.contains(&player)
                && location.player != player
                && location.progress_type != LocationProgressType::Priority
            {
                candidate_items.entry(player).or_default().insert(loc);
                debug!("Candidate item: {}", world.item_label(item));
            }
        }
        balancing_sphere =
            get_sphere_locations(world, &mut balancing_state, &balancing_unchecked_locations);
        count_sphere(
            world,
            &balancing_sphere,
            &mut balancing_unchecked_locations,
            &mut balancing_reachables,
        );
        if balancing_state.has_beaten_game(world, None)
            || balancing_reachables.values().all(|&count| count >= threshold)
        {
            break;
        } else if balancing_sphere.is_empty() {
            return Err(FillError::Unbeatable(
                "not all required items reachable during progression balancing".to_string(),
            ));
        }
    }

    // Locations the look-ahead opened up, per player:
    let mut unlocked_locations: BTreeMap<PlayerId, BTreeSet<LocationIdx>> = BTreeMap::new();
    for &loc in unchecked_locations.difference(&balancing_unchecked_locations) {
        unlocked_locations
            .entry(world.locations[loc].player)
            .or_default()
            .insert(loc);
    }

    let mut items_to_replace: Vec<LocationIdx> = vec![];
    for &player in balancing_players {
        let locations_to_test: Vec<LocationIdx> = unlocked_locations
            .get(&player)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        let locations_to_test_set: BTreeSet<LocationIdx> =
            locations_to_test.iter().copied().collect();
        let mut items_to_test: Vec<LocationIdx> = candidate_items
            .get(&player)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        items_to_test.shuffle(rng);
        while let Some(testing) = items_to_test.pop() {
            let mut reducing_state = state.clone();
            let already_chosen = items_to_replace.iter().copied().filter(|&loc| {
                world.locations[loc]
                    .item
                    .is_some_and(|item| world.items[item].player == player)
            });
            let kept: Vec<LocationIdx> =
                already_chosen.chain(items_to_test.iter().copied()).collect();
            for loc in kept {
                reducing_state.collect_location(world, loc);
            }
            reducing_state.sweep_for_events(world, Some(locations_to_test.as_slice()));

            if balancing_state.has_beaten_game(world, None) {
                if !reducing_state.has_beaten_game(world, None) {
                    items_to_replace.push(testing);
                }
            } else {
                let reduced_sphere =
                    get_sphere_locations(world, &mut reducing_state, &locations_to_test_set);
                if reachable_locations_count[&player] + reduced_sphere.len() < threshold {
                    items_to_replace.push(testing);
                }
            }
        }
    }

    let mut replacement_locations: Vec<LocationIdx> = checked_locations
        .iter()
        .copied()
        .filter(|&loc| {
            let location = &world.locations[loc];
            !location.event
                && !location.locked
                && location.progress_type != LocationProgressType::Priority
        })
        .collect();
    replacement_locations.shuffle(rng);
    items_to_replace.sort();
    items_to_replace.shuffle(rng);

    // Swapping into earlier spheres, so no access checks are needed.
    let mut moved = 0;
    while !replacement_locations.is_empty() {
        let Some(old_location) = items_to_replace.pop() else {
            break;
        };
        let Some(old_item) = world.locations[old_location].item else {
            continue;
        };
        let found = replacement_locations.iter().position(|&new_location| {
            world.can_hold(new_location, old_item)
                && world.locations[new_location]
                    .item
                    .map_or(true, |new_item| world.can_hold(old_location, new_item))
        });
        match found {
            Some(i) => {
                let new_location = replacement_locations.remove(i);
                swap_location_item(world, old_location, new_location);
                debug!(
                    "Progression balancing moved {} to {}",
                    world.item_label(old_item),
                    world.location_label(new_location)
                );
                state.collect_location(world, new_location);
                moved += 1;
            }
            None => {
                warn!("Could not progression balance {}", world.item_label(old_item));
            }
        }
    }

    let mut newly_reachable: Vec<LocationIdx> = vec![];
    if moved > 0 {
        let unlocked: BTreeSet<LocationIdx> = balancing_players
            .iter()
            .filter_map(|p| unlocked_locations.get(p))
            .flat_map(|s| s.iter().copied())
            .filter(|loc| unchecked_locations.contains(loc))
            .collect();
        let sphere = get_sphere_locations(world, state, &unlocked);
        count_sphere(world, &sphere, unchecked_locations, reachable_locations_count);
        newly_reachable.extend(sphere);
    }
    Ok((moved, newly_reachable))
}
