use anyhow::Result;
use multirando::balance::{balance_multiworld_progression, swap_location_item};
use multirando::generate::get_rng;
use multirando_game::{
    ItemIdx, LocationIdx, LocationProgressType, MultiWorld, PlayerId, RegionIdx, Requirement,
};
use multirando_logic::{can_beat_game, CollectionState};

struct PlayerData {
    prog_items: Vec<ItemIdx>,
    regions: Vec<RegionIdx>,
}

fn generate_player_data(
    world: &mut MultiWorld,
    player: PlayerId,
    prog_item_count: usize,
) -> PlayerData {
    let prog_items: Vec<ItemIdx> = (0..prog_item_count)
        .map(|i| world.create_item(player, &format!("Prog Item {i}"), true))
        .collect();
    for &item in &prog_items {
        world.add_to_pool(item);
    }
    world.players[player].completion_condition =
        Requirement::has_all(prog_items.iter().map(|&i| &world.items[i]));
    PlayerData {
        prog_items,
        regions: vec![world.players[player].origin_region],
    }
}

fn generate_region(
    world: &mut MultiWorld,
    player: PlayerId,
    data: &mut PlayerData,
    parent: RegionIdx,
    size: usize,
    access_rule: Requirement,
) -> RegionIdx {
    let name = format!("Region {}", data.regions.len());
    let region = world.add_region(player, &name);
    for i in 0..size {
        world.add_location(player, region, &format!("{name} Location {i}"));
    }
    world.connect(player, &format!("{name} Entrance"), parent, region, access_rule);
    data.regions.push(region);
    region
}

// Fills the region's locations in order, returning the items that did not fit.
fn fill_region(world: &mut MultiWorld, region: RegionIdx, items: Vec<ItemIdx>) -> Vec<ItemIdx> {
    let locations = world.regions[region].locations.clone();
    let mut items = items.into_iter();
    for loc in locations {
        if let Some(item) = items.next() {
            world.push_item(loc, item);
        }
    }
    items.collect()
}

fn region_contains(world: &MultiWorld, region: RegionIdx, item: ItemIdx) -> bool {
    world.items[item]
        .location
        .is_some_and(|loc| world.locations[loc].region == region)
}

fn reachable_from_start(world: &MultiWorld, item: ItemIdx) -> bool {
    let Some(loc) = world.items[item].location else {
        return false;
    };
    let mut state = CollectionState::new(world);
    state.can_reach_location(world, loc)
}

struct BalanceWorld {
    world: MultiWorld,
    player1: PlayerData,
    player2: PlayerData,
}

// Player 2's first progression item sits deep in player 1's second sphere, so player 2
// can only reach their first region until player 1 is far along.
fn setup() -> BalanceWorld {
    let mut world = MultiWorld::new(2);
    let mut player1 = generate_player_data(&mut world, 0, 2);
    let mut player2 = generate_player_data(&mut world, 1, 2);
    let mut basic_items: Vec<ItemIdx> = vec![];
    for player in 0..2 {
        for i in 0..50 {
            let item = world.create_item(player, &format!("Basic Item {i}"), false);
            world.add_to_pool(item);
            basic_items.push(item);
        }
    }

    let menu1 = player1.regions[0];
    let region = generate_region(&mut world, 0, &mut player1, menu1, 20, Requirement::Free);
    let mut items = vec![player1.prog_items[0]];
    items.extend(basic_items);
    let items = fill_region(&mut world, region, items);

    let parent = player1.regions[1];
    let rule = Requirement::has(&world.items[player1.prog_items[0]]);
    let region = generate_region(&mut world, 0, &mut player1, parent, 30, rule);
    let mut next = vec![player1.prog_items[1], player2.prog_items[0]];
    next.extend(items);
    let items = fill_region(&mut world, region, next);

    let menu2 = player2.regions[0];
    let region = generate_region(&mut world, 1, &mut player2, menu2, 20, Requirement::Free);
    let items = fill_region(&mut world, region, items);

    let parent = player2.regions[1];
    let rule = Requirement::has(&world.items[player2.prog_items[0]]);
    let region = generate_region(&mut world, 1, &mut player2, parent, 20, rule);
    let mut next = vec![player2.prog_items[1]];
    next.extend(items);
    fill_region(&mut world, region, next);

    BalanceWorld {
        world,
        player1,
        player2,
    }
}

#[test]
fn balances_progression() -> Result<()> {
    let mut bw = setup();
    bw.world.players[0].progression_balancing = true;
    bw.world.players[1].progression_balancing = true;
    let item = bw.player2.prog_items[0];
    assert!(region_contains(&bw.world, bw.player1.regions[2], item));
    assert!(!reachable_from_start(&bw.world, item));

    balance_multiworld_progression(&mut bw.world, &mut get_rng(0))?;

    assert!(!region_contains(&bw.world, bw.player1.regions[2], item));
    assert!(reachable_from_start(&bw.world, item));
    assert!(can_beat_game(&bw.world, None));
    Ok(())
}

#[test]
fn balancing_only_for_enabled_players() -> Result<()> {
    let mut bw = setup();
    bw.world.players[0].progression_balancing = true;
    let item = bw.player2.prog_items[0];

    balance_multiworld_progression(&mut bw.world, &mut get_rng(0))?;

    assert!(region_contains(&bw.world, bw.player1.regions[2], item));
    Ok(())
}

#[test]
fn skips_when_no_player_balances() -> Result<()> {
    let mut bw = setup();
    let before: Vec<Option<ItemIdx>> = bw.world.locations.iter().map(|l| l.item).collect();

    balance_multiworld_progression(&mut bw.world, &mut get_rng(0))?;

    let after: Vec<Option<ItemIdx>> = bw.world.locations.iter().map(|l| l.item).collect();
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn priority_location_is_not_balanced() -> Result<()> {
    let mut bw = setup();
    bw.world.players[0].progression_balancing = true;
    bw.world.players[1].progression_balancing = true;
    let item = bw.player2.prog_items[0];
    let loc = bw.world.items[item].location.unwrap();
    bw.world.locations[loc].progress_type = LocationProgressType::Priority;

    balance_multiworld_progression(&mut bw.world, &mut get_rng(0))?;

    assert_eq!(bw.world.items[item].location, Some(loc));
    Ok(())
}

#[test]
fn swap_location_item_exchanges_contents() {
    let mut bw = setup();
    let a: LocationIdx = bw.world.items[bw.player1.prog_items[0]].location.unwrap();
    let b: LocationIdx = bw.world.items[bw.player2.prog_items[1]].location.unwrap();
    swap_location_item(&mut bw.world, a, b);
    assert_eq!(bw.world.locations[a].item, Some(bw.player2.prog_items[1]));
    assert_eq!(bw.world.locations[b].item, Some(bw.player1.prog_items[0]));
    assert!(bw.world.locations[a].event);
    assert_eq!(bw.world.items[bw.player1.prog_items[0]].location, Some(b));
}
