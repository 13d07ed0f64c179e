use log::{debug, info, warn};
use multirando_game::{
    util::sorted_counts, ItemIdx, LocationIdx, LocationProgressType, MultiWorld, PlayerId,
};
use multirando_logic::CollectionState;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use crate::fill::{fill_restrictive, remaining_fill, FillError, FillOptions};

/// The item pool split by placement constraint, plus the locations still to be filled.
#[derive(Clone, Debug, Default)]
pub struct FillBuckets {
    pub progression: Vec<ItemIdx>,
    // Non-progression items that must stay out of excluded locations:
    pub non_excluded: Vec<ItemIdx>,
    pub local: BTreeMap<PlayerId, Vec<ItemIdx>>,
    pub non_local: Vec<ItemIdx>,
    pub rest: Vec<ItemIdx>,
    pub fill_locations: Vec<LocationIdx>,
    // Placements a hook has decided itself; these are placed and locked as-is.
    pub reserved: Vec<(LocationIdx, ItemIdx)>,
}

impl FillBuckets {
    pub fn num_items(&self) -> usize {
        self.progression.len()
            + self.non_excluded.len()
            + self.local.values().map(|v| v.len()).sum::<usize>()
            + self.non_local.len()
            + self.rest.len()
    }
}

/// Per-world extension point, run once the priority locations have been filled.
///
/// The hook sees the remaining buckets and the still-unfilled locations, and may move pairs
/// into `reserved` to have them placed and locked before the remaining passes.
pub trait FillHook {
    fn fill_hook(&mut self, world: &MultiWorld, buckets: FillBuckets) -> FillBuckets;
}

pub fn classify_items(world: &MultiWorld, itempool: &[ItemIdx]) -> FillBuckets {
    let mut buckets = FillBuckets::default();
    for &item_idx in itempool {
        let item = &world.items[item_idx];
        let settings = &world.players[item.player];
        if item.advancement {
            buckets.progression.push(item_idx);
        } else if item.never_exclude {
            buckets.non_excluded.push(item_idx);
        } else if settings.local_items.contains(&item.name_id) {
            buckets.local.entry(item.player).or_default().push(item_idx);
        } else if settings.non_local_items.contains(&item.name_id) {
            buckets.non_local.push(item_idx);
        } else {
            buckets.rest.push(item_idx);
        }
    }
    buckets
}

fn sorted_fill_locations(world: &MultiWorld) -> Vec<LocationIdx> {
    let mut fill_locations = world.get_unfilled_locations(None);
    fill_locations.sort_by(|&a, &b| {
        let (la, lb) = (&world.locations[a], &world.locations[b]);
        (la.player, &la.name).cmp(&(lb.player, &lb.name))
    });
    fill_locations
}

fn sorted_item_pool(world: &MultiWorld) -> Vec<ItemIdx> {
    let mut itempool: Vec<ItemIdx> = world
        .itempool
        .iter()
        .copied()
        .filter(|&item| world.items[item].location.is_none())
        .collect();
    itempool.sort_by(|&a, &b| {
        let (ia, ib) = (&world.items[a], &world.items[b]);
        (ia.player, &ia.name, ia.advancement, ia.never_exclude, ia.code).cmp(&(
            ib.player,
            &ib.name,
            ib.advancement,
            ib.never_exclude,
            ib.code,
        ))
    });
    itempool
}

/// Fills every unfilled location from the unplaced part of the item pool.
///
/// Priority locations are filled first from the progression bucket, then the fill hooks run,
/// then the remaining progression and never-exclude items are placed logically, and finally
/// the filler buckets are distributed without access checks.
pub fn distribute_items_restrictive<R: Rng>(
    world: &mut MultiWorld,
    rng: &mut R,
    hooks: &mut [&mut dyn FillHook],
) -> Result<(), FillError> {
    let mut fill_locations = sorted_fill_locations(world);
    fill_locations.shuffle(rng);
    let mut itempool = sorted_item_pool(world);
    itempool.shuffle(rng);

    let buckets = classify_items(world, &itempool);
    let FillBuckets {
        progression: mut progitempool,
        non_excluded,
        local,
        non_local,
        rest,
        ..
    } = buckets;

    let (mut prioritylocations, mut fill_locations): (Vec<LocationIdx>, Vec<LocationIdx>) =
        fill_locations.into_iter().partition(|&loc| {
            world.locations[loc].progress_type == LocationProgressType::Priority
        });

    let base_state = CollectionState::new(world);

    if !prioritylocations.is_empty() {
        let options = FillOptions {
            swap: false,
            allow_partial: true,
            ..FillOptions::default()
        };
        let outcome = fill_restrictive(
            world,
            &base_state,
            &mut prioritylocations,
            &mut progitempool,
            options,
        )?;
        // Priority contents are final; the balancer must not move them.
        for loc in outcome.placements {
            world.locations[loc].locked = true;
        }
        prioritylocations.append(&mut fill_locations);
        fill_locations = prioritylocations;
    }

    let mut buckets = FillBuckets {
        progression: progitempool,
        non_excluded,
        local,
        non_local,
        rest,
        fill_locations,
        reserved: vec![],
    };
    for hook in hooks.iter_mut() {
        buckets = hook.fill_hook(world, buckets);
    }
    for &(location, item) in &buckets.reserved {
        world.place_locked_item(location, item);
    }
    let FillBuckets {
        progression: mut progitempool,
        non_excluded: mut nonexcludeditempool,
        local: localrestitempool,
        non_local: nonlocalrestitempool,
        rest: restitempool,
        fill_locations,
        ..
    } = buckets;

    // Leftover priority locations are filled like default ones from here on.
    let mut defaultlocations: Vec<LocationIdx> = vec![];
    let mut excludedlocations: Vec<LocationIdx> = vec![];
    for loc in fill_locations {
        if world.locations[loc].item.is_some() {
            continue;
        }
        match world.locations[loc].progress_type {
            LocationProgressType::Excluded => excludedlocations.push(loc),
            _ => defaultlocations.push(loc),
        }
    }
    info!(
        "Distributing {} progression, {} non-excluded, {} local, {} non-local, {} filler items \
         over {} default, {} excluded locations",
        progitempool.len(),
        nonexcludeditempool.len(),
        localrestitempool.values().map(|v| v.len()).sum::<usize>(),
        nonlocalrestitempool.len(),
        restitempool.len(),
        defaultlocations.len(),
        excludedlocations.len()
    );

    let filler_count = localrestitempool.values().map(|v| v.len()).sum::<usize>()
        + nonlocalrestitempool.len()
        + restitempool.len();
    if excludedlocations.len() > filler_count {
        return Err(FillError::NotEnoughFiller {
            excluded: excludedlocations.len(),
            filler: filler_count,
        });
    }

    if !progitempool.is_empty() {
        fill_restrictive(
            world,
            &base_state,
            &mut defaultlocations,
            &mut progitempool,
            FillOptions::default(),
        )?;
        if !progitempool.is_empty() {
            return Err(FillError::NotEnoughLocations {
                count: progitempool.len(),
                first: world.item_label(progitempool[0]),
            });
        }
    }

    if !nonexcludeditempool.is_empty() {
        defaultlocations.shuffle(rng);
        // Logical fill, so these cannot crowd out local items from a player's reachable spots.
        fill_restrictive(
            world,
            &base_state,
            &mut defaultlocations,
            &mut nonexcludeditempool,
            FillOptions::default(),
        )?;
        if !nonexcludeditempool.is_empty() {
            return Err(FillError::NotEnoughLocations {
                count: nonexcludeditempool.len(),
                first: world.item_label(nonexcludeditempool[0]),
            });
        }
    }

    defaultlocations.append(&mut excludedlocations);
    defaultlocations.shuffle(rng);

    let mut unplaced: Vec<ItemIdx> = vec![];
    if localrestitempool.values().any(|v| !v.is_empty()) {
        let mut local_locations: BTreeMap<PlayerId, Vec<LocationIdx>> = BTreeMap::new();
        for &loc in &defaultlocations {
            local_locations
                .entry(world.locations[loc].player)
                .or_default()
                .push(loc);
        }
        for player_locations in local_locations.values_mut() {
            player_locations.shuffle(rng);
        }
        debug!(
            "Local items per player: {:?}",
            sorted_counts(
                localrestitempool
                    .iter()
                    .flat_map(|(&p, items)| std::iter::repeat(p).take(items.len()))
            )
        );

        for (player, items) in &localrestitempool {
            let player_local_locations = local_locations.entry(*player).or_default();
            for &item_to_place in items {
                let spot = player_local_locations
                    .iter()
                    .rposition(|&loc| world.can_hold(loc, item_to_place));
                let Some(i) = spot else {
                    warn!(
                        "Ran out of local locations for {}, cannot place {}",
                        world.players[*player].name,
                        world.item_label(item_to_place)
                    );
                    unplaced.push(item_to_place);
                    continue;
                };
                let spot_to_fill = player_local_locations.remove(i);
                world.push_item(spot_to_fill, item_to_place);
                defaultlocations.retain(|&loc| loc != spot_to_fill);
            }
        }
    }

    for &item_to_place in &nonlocalrestitempool {
        let item_player = world.items[item_to_place].player;
        let spot = defaultlocations.iter().position(|&loc| {
            world.locations[loc].player != item_player && world.can_hold(loc, item_to_place)
        });
        match spot {
            Some(i) => {
                let spot_to_fill = defaultlocations.remove(i);
                world.push_item(spot_to_fill, item_to_place);
            }
            None => {
                warn!(
                    "Could not place non-local item {} in another world; tossing it",
                    world.item_label(item_to_place)
                );
            }
        }
    }

    defaultlocations.shuffle(rng);
    let mut restitempool = restitempool;
    remaining_fill(world, &mut defaultlocations, &mut restitempool)?;

    unplaced.extend(restitempool);
    if !unplaced.is_empty() || !defaultlocations.is_empty() {
        warn!(
            "Unplaced items: {}, unfilled locations: {}",
            unplaced.len(),
            defaultlocations.len()
        );
        return Err(FillError::Leftover {
            items: unplaced.len(),
            locations: defaultlocations.len(),
        });
    }
    Ok(())
}
