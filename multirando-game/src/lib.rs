// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod load;
pub mod rules;
pub mod util;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::ops::Range;
use strum_macros::{Display, EnumString, VariantNames};

pub type PlayerId = usize; // Index into MultiWorld.players
pub type ItemIdx = usize; // Index into MultiWorld.items (every item ever created, placed or not)
pub type LocationIdx = usize; // Index into MultiWorld.locations
pub type RegionIdx = usize; // Index into MultiWorld.regions
pub type EntranceIdx = usize; // Index into MultiWorld.entrances
pub type ItemNameId = usize; // Index into MultiWorld.item_name_isv.keys, shared across players

// Name of the region each player's traversal starts from:
pub const ORIGIN_REGION_NAME: &str = "Menu";

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    VariantNames,
)]
#[strum(ascii_case_insensitive)]
pub enum LocationProgressType {
    #[default]
    Default,
    // Must receive an advancement item if at all possible:
    Priority,
    // Must never receive an advancement (or never-exclude) item:
    Excluded,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    VariantNames,
)]
#[strum(ascii_case_insensitive)]
pub enum Accessibility {
    // Every location must be reachable through legal play.
    #[default]
    Full,
    // Only the completion condition must be reachable.
    Minimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Requirement {
    #[default]
    Free,
    Never,
    Item {
        player: PlayerId,
        item: ItemNameId,
        count: usize,
    },
    And(Vec<Requirement>),
    Or(Vec<Requirement>),
}

impl Requirement {
    pub fn item(player: PlayerId, item: ItemNameId) -> Requirement {
        Requirement::Item {
            player,
            item,
            count: 1,
        }
    }

    pub fn item_count(player: PlayerId, item: ItemNameId, count: usize) -> Requirement {
        if count == 0 {
            Requirement::Free
        } else {
            Requirement::Item {
                player,
                item,
                count,
            }
        }
    }

    /// Requirement satisfied by holding (an item with the same name and owner as) `item`.
    pub fn has(item: &Item) -> Requirement {
        Requirement::item(item.player, item.name_id)
    }

    pub fn has_all<'a>(items: impl IntoIterator<Item = &'a Item>) -> Requirement {
        Requirement::make_and(items.into_iter().map(Requirement::has).collect())
    }

    pub fn make_and(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                return Requirement::Never;
            } else if let Requirement::Free = req {
                continue;
            } else if let Requirement::And(and_reqs) = req {
                out_reqs.extend(and_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Free
        } else if out_reqs.len() == 1 {
            out_reqs.remove(0)
        } else {
            Requirement::And(out_reqs)
        }
    }

    pub fn make_or(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Never = req {
                continue;
            } else if let Requirement::Free = req {
                return Requirement::Free;
            } else if let Requirement::Or(or_reqs) = req {
                out_reqs.extend(or_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Never
        } else if out_reqs.len() == 1 {
            out_reqs.remove(0)
        } else {
            Requirement::Or(out_reqs)
        }
    }
}

/// Restriction on which items a location may hold, independent of reachability.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ItemRule {
    #[default]
    Any,
    Allow(Vec<(PlayerId, ItemNameId)>),
    Forbid(Vec<(PlayerId, ItemNameId)>),
    All(Vec<ItemRule>),
}

impl ItemRule {
    pub fn allows(&self, item: &Item) -> bool {
        match self {
            ItemRule::Any => true,
            ItemRule::Allow(keys) => keys.contains(&(item.player, item.name_id)),
            ItemRule::Forbid(keys) => !keys.contains(&(item.player, item.name_id)),
            ItemRule::All(rules) => rules.iter().all(|r| r.allows(item)),
        }
    }

    pub fn make_all(rules: Vec<ItemRule>) -> ItemRule {
        let mut out_rules: Vec<ItemRule> = vec![];
        for rule in rules {
            match rule {
                ItemRule::Any => {}
                ItemRule::All(inner) => out_rules.extend(inner),
                _ => out_rules.push(rule),
            }
        }
        if out_rules.is_empty() {
            ItemRule::Any
        } else if out_rules.len() == 1 {
            out_rules.remove(0)
        } else {
            ItemRule::All(out_rules)
        }
    }
}

#[derive(Clone, Debug)]
pub struct Item {
    pub name: String,
    pub name_id: ItemNameId,
    pub player: PlayerId,
    // Possession of this item can change which regions are reachable:
    pub advancement: bool,
    pub never_exclude: bool,
    pub code: Option<u64>,
    pub location: Option<LocationIdx>,
}

#[derive(Clone, Debug)]
pub struct Location {
    pub name: String,
    pub player: PlayerId,
    pub region: RegionIdx,
    pub address: Option<u64>,
    pub item: Option<ItemIdx>,
    pub progress_type: LocationProgressType,
    pub access_rule: Requirement,
    pub item_rule: ItemRule,
    // Location holds an advancement item and acts as a logical checkpoint:
    pub event: bool,
    pub locked: bool,
}

impl Location {
    /// Whether `item` may be placed here, ignoring reachability.
    pub fn can_hold(&self, item: &Item) -> bool {
        if self.progress_type == LocationProgressType::Excluded
            && (item.advancement || item.never_exclude)
        {
            return false;
        }
        self.item_rule.allows(item)
    }
}

#[derive(Clone, Debug)]
pub struct Region {
    pub name: String,
    pub player: PlayerId,
    pub locations: Vec<LocationIdx>,
    pub exits: Vec<EntranceIdx>,
}

#[derive(Clone, Debug)]
pub struct Entrance {
    pub name: String,
    pub player: PlayerId,
    pub parent_region: RegionIdx,
    pub connected_region: RegionIdx,
    pub access_rule: Requirement,
}

#[derive(Clone, Debug)]
pub struct PlayerSettings {
    pub name: String,
    pub origin_region: RegionIdx,
    pub accessibility: Accessibility,
    pub progression_balancing: bool,
    // Item names (owned by this player) that must stay in this player's world:
    pub local_items: HashSet<ItemNameId>,
    // Item names (owned by this player) that must go to some other player's world:
    pub non_local_items: HashSet<ItemNameId>,
    pub completion_condition: Requirement,
}

/// All players' graphs, the shared item pool and the current item placement.
#[derive(Clone, Debug, Default)]
pub struct MultiWorld {
    pub players: Vec<PlayerSettings>,
    pub item_name_isv: IndexedVec<String>,
    pub items: Vec<Item>,
    pub itempool: Vec<ItemIdx>,
    pub regions: Vec<Region>,
    pub locations: Vec<Location>,
    pub entrances: Vec<Entrance>,
    region_by_name: HashMap<(PlayerId, String), RegionIdx>,
    location_by_name: HashMap<(PlayerId, String), LocationIdx>,
}

impl MultiWorld {
    pub fn new(num_players: usize) -> MultiWorld {
        let mut world = MultiWorld::default();
        for player in 0..num_players {
            world.players.push(PlayerSettings {
                name: format!("Player {}", player + 1),
                origin_region: 0,
                accessibility: Accessibility::Full,
                progression_balancing: false,
                local_items: HashSet::new(),
                non_local_items: HashSet::new(),
                completion_condition: Requirement::Free,
            });
            let origin = world.add_region(player, ORIGIN_REGION_NAME);
            world.players[player].origin_region = origin;
        }
        world
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn player_ids(&self) -> Range<PlayerId> {
        0..self.players.len()
    }

    pub fn item_name_id(&mut self, name: &str) -> ItemNameId {
        self.item_name_isv.add(name)
    }

    pub fn add_region(&mut self, player: PlayerId, name: &str) -> RegionIdx {
        if let Some(&idx) = self.region_by_name.get(&(player, name.to_string())) {
            return idx;
        }
        let idx = self.regions.len();
        self.regions.push(Region {
            name: name.to_string(),
            player,
            locations: vec![],
            exits: vec![],
        });
        self.region_by_name.insert((player, name.to_string()), idx);
        idx
    }

    pub fn add_location(&mut self, player: PlayerId, region: RegionIdx, name: &str) -> LocationIdx {
        let idx = self.locations.len();
        self.locations.push(Location {
            name: name.to_string(),
            player,
            region,
            address: None,
            item: None,
            progress_type: LocationProgressType::Default,
            access_rule: Requirement::Free,
            item_rule: ItemRule::Any,
            event: false,
            locked: false,
        });
        self.regions[region].locations.push(idx);
        self.location_by_name.insert((player, name.to_string()), idx);
        idx
    }

    pub fn connect(
        &mut self,
        player: PlayerId,
        name: &str,
        from: RegionIdx,
        to: RegionIdx,
        access_rule: Requirement,
    ) -> EntranceIdx {
        let idx = self.entrances.len();
        self.entrances.push(Entrance {
            name: name.to_string(),
            player,
            parent_region: from,
            connected_region: to,
            access_rule,
        });
        self.regions[from].exits.push(idx);
        idx
    }

    /// Creates an item without adding it to the pool.
    pub fn create_item(&mut self, player: PlayerId, name: &str, advancement: bool) -> ItemIdx {
        let name_id = self.item_name_id(name);
        let idx = self.items.len();
        self.items.push(Item {
            name: name.to_string(),
            name_id,
            player,
            advancement,
            never_exclude: false,
            code: None,
            location: None,
        });
        idx
    }

    pub fn add_to_pool(&mut self, item: ItemIdx) {
        self.itempool.push(item);
    }

    pub fn get_region(&self, name: &str, player: PlayerId) -> Option<RegionIdx> {
        self.region_by_name.get(&(player, name.to_string())).copied()
    }

    pub fn get_location(&self, name: &str, player: PlayerId) -> Option<LocationIdx> {
        self.location_by_name.get(&(player, name.to_string())).copied()
    }

    /// Places `item` at `location`, keeping the item/location links a partial bijection.
    pub fn push_item(&mut self, location: LocationIdx, item: ItemIdx) {
        if let Some(old_item) = self.locations[location].item {
            self.items[old_item].location = None;
        }
        if let Some(old_location) = self.items[item].location {
            self.locations[old_location].item = None;
            self.locations[old_location].event = false;
        }
        self.locations[location].item = Some(item);
        self.locations[location].event = self.items[item].advancement;
        self.items[item].location = Some(location);
    }

    pub fn remove_item(&mut self, location: LocationIdx) -> Option<ItemIdx> {
        let item = self.locations[location].item.take()?;
        self.locations[location].event = false;
        self.items[item].location = None;
        Some(item)
    }

    pub fn place_locked_item(&mut self, location: LocationIdx, item: ItemIdx) {
        self.push_item(location, item);
        self.locations[location].locked = true;
    }

    pub fn can_hold(&self, location: LocationIdx, item: ItemIdx) -> bool {
        self.locations[location].can_hold(&self.items[item])
    }

    pub fn get_unfilled_locations(&self, player: Option<PlayerId>) -> Vec<LocationIdx> {
        self.locations
            .iter()
            .enumerate()
            .filter(|(_, loc)| loc.item.is_none() && player.map_or(true, |p| loc.player == p))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn get_filled_locations(&self, player: Option<PlayerId>) -> Vec<LocationIdx> {
        self.locations
            .iter()
            .enumerate()
            .filter(|(_, loc)| loc.item.is_some() && player.map_or(true, |p| loc.player == p))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn item_label(&self, item: ItemIdx) -> String {
        let item = &self.items[item];
        format!("{} ({})", item.name, self.players[item.player].name)
    }

    pub fn location_label(&self, location: LocationIdx) -> String {
        let loc = &self.locations[location];
        format!("{} ({})", loc.name, self.players[loc.player].name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_and_or() {
        let a = Requirement::item(0, 0);
        let b = Requirement::item(0, 1);
        assert_eq!(
            Requirement::make_and(vec![Requirement::Free, a.clone()]),
            a.clone()
        );
        assert_eq!(
            Requirement::make_and(vec![a.clone(), Requirement::Never, b.clone()]),
            Requirement::Never
        );
        assert_eq!(
            Requirement::make_and(vec![Requirement::And(vec![a.clone(), b.clone()]), a.clone()]),
            Requirement::And(vec![a.clone(), b.clone(), a.clone()])
        );
        assert_eq!(
            Requirement::make_or(vec![a.clone(), Requirement::Free]),
            Requirement::Free
        );
        assert_eq!(Requirement::make_or(vec![]), Requirement::Never);
        assert_eq!(Requirement::item_count(0, 0, 0), Requirement::Free);
    }

    #[test]
    fn test_excluded_location_rejects_progression() {
        let mut world = MultiWorld::new(1);
        let menu = world.players[0].origin_region;
        let loc = world.add_location(0, menu, "Chest");
        world.locations[loc].progress_type = LocationProgressType::Excluded;
        let sword = world.create_item(0, "Sword", true);
        let rupee = world.create_item(0, "Rupee", false);
        let map = world.create_item(0, "Map", false);
        world.items[map].never_exclude = true;
        assert!(!world.can_hold(loc, sword));
        assert!(world.can_hold(loc, rupee));
        assert!(!world.can_hold(loc, map));
    }

    #[test]
    fn test_push_item_keeps_bijection() {
        let mut world = MultiWorld::new(1);
        let menu = world.players[0].origin_region;
        let loc0 = world.add_location(0, menu, "Chest 0");
        let loc1 = world.add_location(0, menu, "Chest 1");
        let sword = world.create_item(0, "Sword", true);
        let rupee = world.create_item(0, "Rupee", false);

        world.push_item(loc0, sword);
        assert!(world.locations[loc0].event);
        world.push_item(loc1, sword);
        assert_eq!(world.locations[loc0].item, None);
        assert!(!world.locations[loc0].event);
        assert_eq!(world.items[sword].location, Some(loc1));

        world.push_item(loc1, rupee);
        assert_eq!(world.items[sword].location, None);
        assert_eq!(world.locations[loc1].item, Some(rupee));
        assert!(!world.locations[loc1].event);

        assert_eq!(world.remove_item(loc1), Some(rupee));
        assert_eq!(world.items[rupee].location, None);
        assert_eq!(world.remove_item(loc1), None);
        assert_eq!(world.get_unfilled_locations(None), vec![loc0, loc1]);
    }

    #[test]
    fn test_item_rule_all() {
        let mut world = MultiWorld::new(2);
        let sword = world.create_item(0, "Sword", true);
        let other_sword = world.create_item(1, "Sword", true);
        let name_id = world.items[sword].name_id;
        let rule = ItemRule::make_all(vec![
            ItemRule::Any,
            ItemRule::Forbid(vec![(0, name_id)]),
        ]);
        assert_eq!(rule, ItemRule::Forbid(vec![(0, name_id)]));
        assert!(!rule.allows(&world.items[sword]));
        assert!(rule.allows(&world.items[other_sword]));
    }
}
