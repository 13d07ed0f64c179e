use crate::{
    ItemNameId, ItemRule, LocationIdx, LocationProgressType, MultiWorld, PlayerId, Requirement,
};

pub fn set_rule(world: &mut MultiWorld, location: LocationIdx, rule: Requirement) {
    world.locations[location].access_rule = rule;
}

/// Strengthens a location's access rule with `rule`.
pub fn add_rule(world: &mut MultiWorld, location: LocationIdx, rule: Requirement) {
    let old_rule = std::mem::take(&mut world.locations[location].access_rule);
    world.locations[location].access_rule = Requirement::make_and(vec![old_rule, rule]);
}

/// Relaxes a location's access rule: either the old rule or `rule` is sufficient.
pub fn add_alternative_rule(world: &mut MultiWorld, location: LocationIdx, rule: Requirement) {
    let old_rule = std::mem::take(&mut world.locations[location].access_rule);
    world.locations[location].access_rule = Requirement::make_or(vec![old_rule, rule]);
}

pub fn add_item_rule(world: &mut MultiWorld, location: LocationIdx, rule: ItemRule) {
    let old_rule = std::mem::take(&mut world.locations[location].item_rule);
    world.locations[location].item_rule = ItemRule::make_all(vec![old_rule, rule]);
}

pub fn forbid_items_for_player(
    world: &mut MultiWorld,
    location: LocationIdx,
    items: &[ItemNameId],
    player: PlayerId,
) {
    if items.is_empty() {
        return;
    }
    let keys = items.iter().map(|&name_id| (player, name_id)).collect();
    add_item_rule(world, location, ItemRule::Forbid(keys));
}

/// Marks the named locations of `player` as excluded. Unknown names are skipped.
pub fn exclusion_rules(world: &mut MultiWorld, player: PlayerId, location_names: &[String]) {
    for name in location_names {
        if let Some(loc) = world.get_location(name, player) {
            world.locations[loc].progress_type = LocationProgressType::Excluded;
        }
    }
}

/// Translates each player's `local_items`/`non_local_items` into item rules:
/// local items are forbidden in other players' locations, non-local items in their owner's.
pub fn locality_rules(world: &mut MultiWorld) {
    for player in world.player_ids() {
        let mut local: Vec<ItemNameId> =
            world.players[player].local_items.iter().copied().collect();
        local.sort();
        let mut non_local: Vec<ItemNameId> =
            world.players[player].non_local_items.iter().copied().collect();
        non_local.sort();

        for loc in 0..world.locations.len() {
            if world.locations[loc].player == player {
                forbid_items_for_player(world, loc, &non_local, player);
            } else {
                forbid_items_for_player(world, loc, &local, player);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rule_combines() {
        let mut world = MultiWorld::new(1);
        let menu = world.players[0].origin_region;
        let loc = world.add_location(0, menu, "Chest");
        let lamp = world.item_name_id("Lamp");
        let torch = world.item_name_id("Torch");

        add_rule(&mut world, loc, Requirement::item(0, lamp));
        assert_eq!(world.locations[loc].access_rule, Requirement::item(0, lamp));
        add_alternative_rule(&mut world, loc, Requirement::item(0, torch));
        assert_eq!(
            world.locations[loc].access_rule,
            Requirement::Or(vec![Requirement::item(0, lamp), Requirement::item(0, torch)])
        );
        set_rule(&mut world, loc, Requirement::Free);
        assert_eq!(world.locations[loc].access_rule, Requirement::Free);
    }

    #[test]
    fn test_locality_rules() {
        let mut world = MultiWorld::new(2);
        let menu0 = world.players[0].origin_region;
        let menu1 = world.players[1].origin_region;
        let loc0 = world.add_location(0, menu0, "Chest");
        let loc1 = world.add_location(1, menu1, "Chest");
        let compass = world.create_item(0, "Compass", false);
        let map = world.create_item(0, "Map", false);
        let compass_id = world.items[compass].name_id;
        let map_id = world.items[map].name_id;
        world.players[0].local_items.insert(compass_id);
        world.players[0].non_local_items.insert(map_id);

        locality_rules(&mut world);

        assert!(world.can_hold(loc0, compass));
        assert!(!world.can_hold(loc1, compass));
        assert!(!world.can_hold(loc0, map));
        assert!(world.can_hold(loc1, map));
    }

    #[test]
    fn test_exclusion_rules() {
        let mut world = MultiWorld::new(2);
        let menu0 = world.players[0].origin_region;
        let menu1 = world.players[1].origin_region;
        let chest0 = world.add_location(0, menu0, "Chest");
        let shelf0 = world.add_location(0, menu0, "Shelf");
        let chest1 = world.add_location(1, menu1, "Chest");

        exclusion_rules(&mut world, 0, &["Chest".to_string(), "Attic".to_string()]);

        assert_eq!(
            world.locations[chest0].progress_type,
            LocationProgressType::Excluded
        );
        assert_eq!(
            world.locations[shelf0].progress_type,
            LocationProgressType::Default
        );
        assert_eq!(
            world.locations[chest1].progress_type,
            LocationProgressType::Default
        );
        let sword = world.create_item(0, "Sword", true);
        assert!(!world.can_hold(chest0, sword));
        assert!(world.can_hold(shelf0, sword));
    }
}
