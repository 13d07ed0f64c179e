use hashbrown::{HashMap, HashSet};
use log::debug;
use multirando_game::{
    Accessibility, EntranceIdx, ItemIdx, ItemNameId, LocationIdx, MultiWorld, PlayerId, RegionIdx,
    Requirement,
};

/// Items held across all players, with memoized region reachability.
///
/// Holding more items can only grow the reachable sets, so a stale cache is refreshed
/// by retrying only the exits that were blocked the last time around.
#[derive(Clone, Debug)]
pub struct CollectionState {
    prog_items: HashMap<(PlayerId, ItemNameId), usize>,
    reachable_regions: Vec<HashSet<RegionIdx>>,
    blocked_exits: Vec<Vec<EntranceIdx>>,
    stale: Vec<bool>,
    // Locations whose item has already been collected:
    pub events: HashSet<LocationIdx>,
}

impl CollectionState {
    pub fn new(world: &MultiWorld) -> CollectionState {
        let num_players = world.num_players();
        CollectionState {
            prog_items: HashMap::new(),
            reachable_regions: vec![HashSet::new(); num_players],
            blocked_exits: vec![vec![]; num_players],
            stale: vec![true; num_players],
            events: HashSet::new(),
        }
    }

    pub fn count(&self, player: PlayerId, item: ItemNameId) -> usize {
        self.prog_items.get(&(player, item)).copied().unwrap_or(0)
    }

    pub fn has(&self, player: PlayerId, item: ItemNameId) -> bool {
        self.count(player, item) >= 1
    }

    pub fn has_all(&self, player: PlayerId, items: &[ItemNameId]) -> bool {
        items.iter().all(|&item| self.has(player, item))
    }

    /// Returns true if the item could change reachability (i.e. it is an advancement item).
    pub fn collect(&mut self, world: &MultiWorld, item: ItemIdx) -> bool {
        let item = &world.items[item];
        if !item.advancement {
            return false;
        }
        *self.prog_items.entry((item.player, item.name_id)).or_insert(0) += 1;
        // Requirements may refer to other players' items, so every cache is invalidated.
        self.stale.fill(true);
        true
    }

    pub fn collect_location(&mut self, world: &MultiWorld, location: LocationIdx) -> bool {
        if !self.events.insert(location) {
            return false;
        }
        match world.locations[location].item {
            Some(item) => self.collect(world, item),
            None => false,
        }
    }

    fn update_reachable_regions(&mut self, world: &MultiWorld, player: PlayerId) {
        if !self.stale[player] {
            return;
        }
        let reachable = &mut self.reachable_regions[player];
        let mut queue: Vec<EntranceIdx>;
        if reachable.is_empty() {
            let origin = world.players[player].origin_region;
            reachable.insert(origin);
            queue = world.regions[origin].exits.clone();
        } else {
            queue = std::mem::take(&mut self.blocked_exits[player]);
        }

        let mut blocked: Vec<EntranceIdx> = vec![];
        while let Some(exit_idx) = queue.pop() {
            let exit = &world.entrances[exit_idx];
            if reachable.contains(&exit.connected_region) {
                continue;
            }
            if apply_requirement(&exit.access_rule, &CountView(&self.prog_items)) {
                reachable.insert(exit.connected_region);
                queue.extend(world.regions[exit.connected_region].exits.iter().copied());
            } else {
                blocked.push(exit_idx);
            }
        }
        self.blocked_exits[player] = blocked;
        self.stale[player] = false;
    }

    pub fn can_reach_region(&mut self, world: &MultiWorld, region: RegionIdx) -> bool {
        let player = world.regions[region].player;
        self.update_reachable_regions(world, player);
        self.reachable_regions[player].contains(&region)
    }

    pub fn can_reach_location(&mut self, world: &MultiWorld, location: LocationIdx) -> bool {
        let loc = &world.locations[location];
        self.can_reach_region(world, loc.region) && apply_requirement(&loc.access_rule, &*self)
    }

    pub fn get_reachable_locations(
        &mut self,
        world: &MultiWorld,
        player: Option<PlayerId>,
    ) -> Vec<LocationIdx> {
        (0..world.locations.len())
            .filter(|&loc| {
                player.map_or(true, |p| world.locations[loc].player == p)
                    && self.can_reach_location(world, loc)
            })
            .collect()
    }

    /// Whether `item` may be placed at `location`, optionally also requiring that it be reachable.
    pub fn can_fill(
        &mut self,
        world: &MultiWorld,
        location: LocationIdx,
        item: ItemIdx,
        check_access: bool,
    ) -> bool {
        world.can_hold(location, item)
            && (!check_access || self.can_reach_location(world, location))
    }

    /// Collects items at reachable event locations until nothing new is found.
    pub fn sweep_for_events(&mut self, world: &MultiWorld, locations: Option<&[LocationIdx]>) {
        let candidates: Vec<LocationIdx> = match locations {
            Some(locs) => locs.to_vec(),
            None => (0..world.locations.len()).collect(),
        };
        let mut pending: Vec<LocationIdx> = candidates
            .into_iter()
            .filter(|&loc| world.locations[loc].event && world.locations[loc].item.is_some())
            .collect();
        loop {
            let reachable: Vec<LocationIdx> = pending
                .iter()
                .copied()
                .filter(|&loc| !self.events.contains(&loc) && self.can_reach_location(world, loc))
                .collect();
            if reachable.is_empty() {
                break;
            }
            for loc in reachable {
                self.collect_location(world, loc);
            }
            pending.retain(|loc| !self.events.contains(loc));
        }
    }

    pub fn has_beaten_game(&self, world: &MultiWorld, player: Option<PlayerId>) -> bool {
        match player {
            Some(p) => apply_requirement(&world.players[p].completion_condition, self),
            None => world
                .players
                .iter()
                .all(|p| apply_requirement(&p.completion_condition, self)),
        }
    }
}

pub trait ItemCounts {
    fn count(&self, player: PlayerId, item: ItemNameId) -> usize;
}

impl ItemCounts for CollectionState {
    fn count(&self, player: PlayerId, item: ItemNameId) -> usize {
        CollectionState::count(self, player, item)
    }
}

// Borrow of the item counts alone, so exits can be evaluated while the region caches are
// being mutated.
struct CountView<'a>(&'a HashMap<(PlayerId, ItemNameId), usize>);

impl ItemCounts for CountView<'_> {
    fn count(&self, player: PlayerId, item: ItemNameId) -> usize {
        self.0.get(&(player, item)).copied().unwrap_or(0)
    }
}

pub fn apply_requirement<S: ItemCounts>(req: &Requirement, state: &S) -> bool {
    match req {
        Requirement::Free => true,
        Requirement::Never => false,
        Requirement::Item {
            player,
            item,
            count,
        } => state.count(*player, *item) >= *count,
        Requirement::And(reqs) => reqs.iter().all(|r| apply_requirement(r, state)),
        Requirement::Or(reqs) => reqs.iter().any(|r| apply_requirement(r, state)),
    }
}

/// Collects placed items sphere by sphere, starting from `starting_state` (or nothing),
/// until every completion condition holds or no further progress is possible.
pub fn can_beat_game(world: &MultiWorld, starting_state: Option<&CollectionState>) -> bool {
    let mut state = match starting_state {
        Some(s) => s.clone(),
        None => CollectionState::new(world),
    };
    if state.has_beaten_game(world, None) {
        return true;
    }
    let mut prog_locations: Vec<LocationIdx> = (0..world.locations.len())
        .filter(|&loc| {
            world.locations[loc]
                .item
                .is_some_and(|item| world.items[item].advancement)
                && !state.events.contains(&loc)
        })
        .collect();
    loop {
        let sphere: Vec<LocationIdx> = prog_locations
            .iter()
            .copied()
            .filter(|&loc| state.can_reach_location(world, loc))
            .collect();
        if sphere.is_empty() {
            debug!("Game not beatable: {} progression locations unreachable", prog_locations.len());
            return false;
        }
        for &loc in &sphere {
            state.collect_location(world, loc);
        }
        prog_locations.retain(|loc| !state.events.contains(loc));
        if state.has_beaten_game(world, None) {
            return true;
        }
    }
}

/// The game is beatable, and every location of a player with full accessibility is reachable.
pub fn fulfills_accessibility(world: &MultiWorld) -> bool {
    let mut state = CollectionState::new(world);
    loop {
        let sphere: Vec<LocationIdx> = (0..world.locations.len())
            .filter(|&loc| {
                world.locations[loc].item.is_some()
                    && !state.events.contains(&loc)
                    && state.can_reach_location(world, loc)
            })
            .collect();
        if sphere.is_empty() {
            break;
        }
        for loc in sphere {
            state.collect_location(world, loc);
        }
    }
    if !state.has_beaten_game(world, None) {
        return false;
    }
    (0..world.locations.len()).all(|loc| {
        let player = world.locations[loc].player;
        world.players[player].accessibility != Accessibility::Full
            || state.can_reach_location(world, loc)
    })
}

/// State holding every pool item and every placed item.
pub fn get_all_state(world: &MultiWorld) -> CollectionState {
    let mut state = CollectionState::new(world);
    let mut seen: HashSet<ItemIdx> = HashSet::new();
    let placed = world.locations.iter().filter_map(|loc| loc.item);
    for item in world.itempool.iter().copied().chain(placed) {
        if seen.insert(item) {
            state.collect(world, item);
        }
    }
    state.sweep_for_events(world, None);
    state
}
