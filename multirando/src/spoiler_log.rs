use multirando_game::{LocationIdx, MultiWorld};
use multirando_logic::CollectionState;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SpoilerPlacement {
    pub location: String,
    pub location_player: String,
    pub item: String,
    pub item_player: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SpoilerSphere {
    pub sphere: usize,
    pub items: Vec<SpoilerPlacement>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SpoilerLog {
    pub players: Vec<String>,
    pub placements: Vec<SpoilerPlacement>,
    pub playthrough: Vec<SpoilerSphere>,
}

fn get_spoiler_placement(world: &MultiWorld, loc: LocationIdx) -> Option<SpoilerPlacement> {
    let location = &world.locations[loc];
    let item = &world.items[location.item?];
    Some(SpoilerPlacement {
        location: location.name.clone(),
        location_player: world.players[location.player].name.clone(),
        item: item.name.clone(),
        item_player: world.players[item.player].name.clone(),
    })
}

pub fn get_placements(world: &MultiWorld) -> Vec<SpoilerPlacement> {
    (0..world.locations.len())
        .filter_map(|loc| get_spoiler_placement(world, loc))
        .collect()
}

/// Spheres of progression items, collected starting from nothing.
pub fn get_playthrough(world: &MultiWorld) -> Vec<SpoilerSphere> {
    let mut state = CollectionState::new(world);
    let mut remaining: Vec<LocationIdx> = (0..world.locations.len())
        .filter(|&loc| {
            world.locations[loc]
                .item
                .is_some_and(|item| world.items[item].advancement)
        })
        .collect();
    let mut playthrough: Vec<SpoilerSphere> = vec![];
    loop {
        let sphere: Vec<LocationIdx> = remaining
            .iter()
            .copied()
            .filter(|&loc| state.can_reach_location(world, loc))
            .collect();
        if sphere.is_empty() {
            break;
        }
        for &loc in &sphere {
            state.collect_location(world, loc);
        }
        remaining.retain(|loc| !state.events.contains(loc));
        playthrough.push(SpoilerSphere {
            sphere: playthrough.len() + 1,
            items: sphere
                .into_iter()
                .filter_map(|loc| get_spoiler_placement(world, loc))
                .collect(),
        });
    }
    playthrough
}

pub fn get_spoiler_log(world: &MultiWorld) -> SpoilerLog {
    SpoilerLog {
        players: world.players.iter().map(|p| p.name.clone()).collect(),
        placements: get_placements(world),
        playthrough: get_playthrough(world),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multirando_game::Requirement;

    #[test]
    fn test_playthrough_spheres() {
        let mut world = MultiWorld::new(1);
        let menu = world.players[0].origin_region;
        let cave = world.add_region(0, "Cave");
        let lamp = world.create_item(0, "Lamp", true);
        let sword = world.create_item(0, "Sword", true);
        let rupee = world.create_item(0, "Rupee", false);
        let lamp_id = world.items[lamp].name_id;
        world.connect(0, "Cave Entrance", menu, cave, Requirement::item(0, lamp_id));
        let chest = world.add_location(0, menu, "Chest");
        let pot = world.add_location(0, menu, "Pot");
        let altar = world.add_location(0, cave, "Altar");
        world.push_item(chest, lamp);
        world.push_item(pot, rupee);
        world.push_item(altar, sword);

        let spoiler = get_spoiler_log(&world);
        assert_eq!(spoiler.players, vec!["Player 1".to_string()]);
        assert_eq!(spoiler.placements.len(), 3);
        assert_eq!(spoiler.playthrough.len(), 2);
        assert_eq!(spoiler.playthrough[0].items[0].item, "Lamp");
        assert_eq!(spoiler.playthrough[1].items[0].location, "Altar");
    }
}
