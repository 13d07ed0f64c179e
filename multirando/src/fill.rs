use hashbrown::HashMap;
use log::{debug, warn};
use multirando_game::{Accessibility, ItemIdx, ItemNameId, LocationIdx, MultiWorld, PlayerId};
use multirando_logic::{can_beat_game, CollectionState};
use std::collections::VecDeque;
use thiserror::Error;

// An item (by owner and name) may be displaced by swap repair at most this many times per fill:
pub const MAX_SWAPS_PER_ITEM: usize = 2;

#[derive(Error, Debug)]
pub enum FillError {
    #[error("No more spots to place {item}: {remaining_locations} locations are invalid. Already placed {placed} items")]
    Unplaceable {
        item: String,
        remaining_locations: usize,
        placed: usize,
    },
    #[error("Not enough locations for {count} progression items (first: {first})")]
    NotEnoughLocations { count: usize, first: String },
    #[error("Not enough filler items for excluded locations: {excluded} excluded, {filler} filler")]
    NotEnoughFiller { excluded: usize, filler: usize },
    #[error("Game not beatable: {0}")]
    Unbeatable(String),
    #[error("{items} items and {locations} locations left over after fill")]
    Leftover { items: usize, locations: usize },
}

#[derive(Clone, Copy, Debug)]
pub struct FillOptions {
    // Try relocating earlier placements when an item has no direct candidate:
    pub swap: bool,
    // Leave unplaceable items in the item list instead of failing:
    pub allow_partial: bool,
    // Only place items in their owner's locations:
    pub single_player_placement: bool,
    pub lock: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        FillOptions {
            swap: true,
            allow_partial: false,
            single_player_placement: false,
            lock: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FillOutcome {
    // Filled locations, in the order their current item was placed:
    pub placements: Vec<LocationIdx>,
    pub unplaced: Vec<ItemIdx>,
}

/// Optimistic state: `base_state` plus every item in `pool`, swept for reachable events.
pub fn sweep_from_pool(
    world: &MultiWorld,
    base_state: &CollectionState,
    pool: &[ItemIdx],
) -> CollectionState {
    let mut new_state = base_state.clone();
    for &item in pool {
        new_state.collect(world, item);
    }
    new_state.sweep_for_events(world, None);
    new_state
}

fn uses_access_check(
    world: &MultiWorld,
    state: &CollectionState,
    item: ItemIdx,
    has_beaten_game: bool,
    single_player_placement: bool,
) -> bool {
    let player = world.items[item].player;
    if world.players[player].accessibility != Accessibility::Minimal {
        return true;
    }
    if single_player_placement {
        !state.has_beaten_game(world, Some(player))
    } else {
        !has_beaten_game
    }
}

struct SwapCandidate {
    placement_idx: usize,
    displaced: ItemIdx,
}

// Looks for an earlier placement whose location could take `item` instead, scanning oldest first.
// On success the displaced item has been removed from its location.
#[allow(clippy::too_many_arguments)]
fn find_swap(
    world: &mut MultiWorld,
    base_state: &CollectionState,
    pool: &[ItemIdx],
    placements: &[LocationIdx],
    swapped_items: &HashMap<(PlayerId, ItemNameId), usize>,
    item: ItemIdx,
    check_access: bool,
    single_player_placement: bool,
) -> Option<SwapCandidate> {
    for (i, &location) in placements.iter().enumerate() {
        let Some(placed_item) = world.locations[location].item else {
            continue;
        };
        let key = (world.items[placed_item].player, world.items[placed_item].name_id);
        if swapped_items.get(&key).copied().unwrap_or(0) >= MAX_SWAPS_PER_ITEM {
            continue;
        }
        if single_player_placement && world.locations[location].player != world.items[item].player
        {
            continue;
        }

        world.remove_item(location);
        let mut swap_state = sweep_from_pool(world, base_state, pool);
        if swap_state.can_fill(world, location, item, check_access) {
            // A swap that shrinks the reachable set is useless.
            let mut prev_state = swap_state.clone();
            prev_state.collect(world, placed_item);
            let prev_loc_count = prev_state.get_reachable_locations(world, None).len();
            swap_state.collect(world, item);
            let new_loc_count = swap_state.get_reachable_locations(world, None).len();
            if new_loc_count >= prev_loc_count {
                return Some(SwapCandidate {
                    placement_idx: i,
                    displaced: placed_item,
                });
            }
        }
        world.push_item(location, placed_item);
    }
    None
}

/// Places `items` into `locations`, one item per player per round, first-fit against the
/// optimistic state. Placed items are removed from `items` and their locations from
/// `locations`; items that could not be placed are returned to the end of `items`.
pub fn fill_restrictive(
    world: &mut MultiWorld,
    base_state: &CollectionState,
    locations: &mut Vec<LocationIdx>,
    items: &mut Vec<ItemIdx>,
    options: FillOptions,
) -> Result<FillOutcome, FillError> {
    let mut unplaced_items: Vec<ItemIdx> = vec![];
    let mut placements: Vec<LocationIdx> = vec![];
    let mut swapped_items: HashMap<(PlayerId, ItemNameId), usize> = HashMap::new();

    // Per-player queues, in order of each player's first appearance:
    let mut player_order: Vec<PlayerId> = vec![];
    let mut reachable_items: HashMap<PlayerId, VecDeque<ItemIdx>> = HashMap::new();
    for &item in items.iter() {
        let player = world.items[item].player;
        if !reachable_items.contains_key(&player) {
            player_order.push(player);
        }
        reachable_items.entry(player).or_default().push_back(item);
    }

    let mut round = 0;
    while !locations.is_empty() && reachable_items.values().any(|q| !q.is_empty()) {
        let mut items_to_place: VecDeque<ItemIdx> = player_order
            .iter()
            .filter_map(|p| reachable_items.get_mut(p).and_then(|q| q.pop_back()))
            .collect();
        for item in &items_to_place {
            if let Some(pos) = items.iter().position(|x| x == item) {
                items.remove(pos);
            }
        }
        let mut maximum_exploration_state = sweep_from_pool(world, base_state, items);
        let has_beaten_game = maximum_exploration_state.has_beaten_game(world, None);
        debug!(
            "Fill round {round}: placing {} items, {} locations left",
            items_to_place.len(),
            locations.len()
        );
        round += 1;

        while let Some(item_to_place) = items_to_place.pop_front() {
            if locations.is_empty() {
                unplaced_items.push(item_to_place);
                unplaced_items.extend(items_to_place.drain(..));
                break;
            }
            let check_access = uses_access_check(
                world,
                &maximum_exploration_state,
                item_to_place,
                has_beaten_game,
                options.single_player_placement,
            );

            let item_player = world.items[item_to_place].player;
            let direct = locations.iter().position(|&loc| {
                (!options.single_player_placement || world.locations[loc].player == item_player)
                    && maximum_exploration_state.can_fill(world, loc, item_to_place, check_access)
            });

            let spot_to_fill = match direct {
                Some(i) => locations.remove(i),
                None if options.swap => {
                    let candidate = find_swap(
                        world,
                        base_state,
                        items,
                        &placements,
                        &swapped_items,
                        item_to_place,
                        check_access,
                        options.single_player_placement,
                    );
                    let Some(SwapCandidate {
                        placement_idx,
                        displaced,
                    }) = candidate
                    else {
                        unplaced_items.push(item_to_place);
                        continue;
                    };
                    let location = placements.remove(placement_idx);
                    let displaced_item = &world.items[displaced];
                    *swapped_items
                        .entry((displaced_item.player, displaced_item.name_id))
                        .or_insert(0) += 1;
                    debug!(
                        "Swapping {} out of {} for {}",
                        world.item_label(displaced),
                        world.location_label(location),
                        world.item_label(item_to_place)
                    );
                    reachable_items
                        .entry(displaced_item.player)
                        .or_default()
                        .push_front(displaced);
                    items.push(displaced);
                    maximum_exploration_state.collect(world, item_to_place);
                    location
                }
                None => {
                    unplaced_items.push(item_to_place);
                    continue;
                }
            };

            world.push_item(spot_to_fill, item_to_place);
            world.locations[spot_to_fill].locked = options.lock;
            placements.push(spot_to_fill);
        }
    }

    if !unplaced_items.is_empty() && !locations.is_empty() && !options.allow_partial {
        let first = world.item_label(unplaced_items[0]);
        if can_beat_game(world, None) {
            warn!(
                "Not all items placed. Game beatable anyway. (Could not place {})",
                first
            );
        } else {
            return Err(FillError::Unplaceable {
                item: first,
                remaining_locations: locations.len(),
                placed: placements.len(),
            });
        }
    }

    items.extend(unplaced_items.iter().copied());
    Ok(FillOutcome {
        placements,
        unplaced: unplaced_items,
    })
}

/// Places filler without regard to reachability: first location whose rules accept the item.
/// When none accepts it, an earlier placement that does is taken over and its item re-queued.
pub fn remaining_fill(
    world: &mut MultiWorld,
    locations: &mut Vec<LocationIdx>,
    items: &mut Vec<ItemIdx>,
) -> Result<(), FillError> {
    let mut unplaced_items: Vec<ItemIdx> = vec![];
    let mut placements: Vec<LocationIdx> = vec![];
    let mut swapped_items: HashMap<(PlayerId, ItemNameId), usize> = HashMap::new();

    while !locations.is_empty() {
        let Some(item_to_place) = items.pop() else {
            break;
        };
        let spot_to_fill = match locations
            .iter()
            .position(|&loc| world.can_hold(loc, item_to_place))
        {
            Some(i) => locations.remove(i),
            None => {
                let swap = placements.iter().position(|&loc| {
                    world.locations[loc].item.is_some_and(|placed| {
                        let key = (world.items[placed].player, world.items[placed].name_id);
                        swapped_items.get(&key).copied().unwrap_or(0) < MAX_SWAPS_PER_ITEM
                    }) && world.can_hold(loc, item_to_place)
                });
                let Some(i) = swap else {
                    unplaced_items.push(item_to_place);
                    continue;
                };
                let location = placements.remove(i);
                if let Some(placed) = world.remove_item(location) {
                    let key = (world.items[placed].player, world.items[placed].name_id);
                    *swapped_items.entry(key).or_insert(0) += 1;
                    items.push(placed);
                }
                location
            }
        };
        world.push_item(spot_to_fill, item_to_place);
        placements.push(spot_to_fill);
    }

    if !unplaced_items.is_empty() && !locations.is_empty() {
        return Err(FillError::Unplaceable {
            item: world.item_label(unplaced_items[0]),
            remaining_locations: locations.len(),
            placed: placements.len(),
        });
    }
    items.extend(unplaced_items);
    Ok(())
}
