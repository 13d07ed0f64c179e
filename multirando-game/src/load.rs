use anyhow::{bail, Context, Result};
use hashbrown::HashSet;
use serde::Deserialize;
use std::path::Path;

use crate::{
    rules::{exclusion_rules, locality_rules},
    Accessibility, LocationProgressType, MultiWorld, PlayerId, Requirement, ORIGIN_REGION_NAME,
};

fn default_count() -> usize {
    1
}

#[derive(Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum RuleData {
    Name(String),
    Item {
        item: String,
        #[serde(default = "default_count")]
        count: usize,
        player: Option<PlayerId>,
    },
    All {
        all: Vec<RuleData>,
    },
    Any {
        any: Vec<RuleData>,
    },
}

#[derive(Deserialize, Clone, Debug)]
pub struct LockedItemData {
    pub name: String,
    #[serde(default = "default_advancement")]
    pub advancement: bool,
}

fn default_advancement() -> bool {
    true
}

#[derive(Deserialize, Clone, Debug)]
pub struct LocationData {
    pub name: String,
    pub address: Option<u64>,
    pub rule: Option<RuleData>,
    #[serde(default)]
    pub progress_type: LocationProgressType,
    // Event item placed and locked here while loading:
    pub locked_item: Option<LockedItemData>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ExitData {
    pub name: String,
    pub to: String,
    pub rule: Option<RuleData>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RegionData {
    pub name: String,
    #[serde(default)]
    pub locations: Vec<LocationData>,
    #[serde(default)]
    pub exits: Vec<ExitData>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ItemData {
    pub name: String,
    #[serde(default)]
    pub advancement: bool,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub never_exclude: bool,
    pub code: Option<u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PlayerData {
    pub name: Option<String>,
    #[serde(default)]
    pub accessibility: Accessibility,
    #[serde(default)]
    pub progression_balancing: bool,
    #[serde(default)]
    pub local_items: Vec<String>,
    #[serde(default)]
    pub non_local_items: Vec<String>,
    // Location names to mark as excluded, on top of per-location progress types:
    #[serde(default)]
    pub exclude_locations: Vec<String>,
    pub completion: Option<RuleData>,
    pub regions: Vec<RegionData>,
    #[serde(default)]
    pub items: Vec<ItemData>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MultiWorldData {
    pub players: Vec<PlayerData>,
}

struct RuleContext<'a> {
    // Item names that each player's pool or events can ever provide:
    known_items: &'a [HashSet<String>],
    owner: PlayerId,
}

fn parse_rule(
    world: &mut MultiWorld,
    ctx: &RuleContext,
    rule: &Option<RuleData>,
) -> Result<Requirement> {
    match rule {
        None => Ok(Requirement::Free),
        Some(r) => parse_rule_data(world, ctx, r),
    }
}

fn parse_rule_data(
    world: &mut MultiWorld,
    ctx: &RuleContext,
    rule: &RuleData,
) -> Result<Requirement> {
    Ok(match rule {
        RuleData::Name(name) => item_requirement(world, ctx, name, 1, None)?,
        RuleData::Item {
            item,
            count,
            player,
        } => item_requirement(world, ctx, item, *count, *player)?,
        RuleData::All { all } => {
            let reqs = all
                .iter()
                .map(|r| parse_rule_data(world, ctx, r))
                .collect::<Result<Vec<_>>>()?;
            Requirement::make_and(reqs)
        }
        RuleData::Any { any } => {
            let reqs = any
                .iter()
                .map(|r| parse_rule_data(world, ctx, r))
                .collect::<Result<Vec<_>>>()?;
            Requirement::make_or(reqs)
        }
    })
}

fn item_requirement(
    world: &mut MultiWorld,
    ctx: &RuleContext,
    name: &str,
    count: usize,
    player: Option<PlayerId>,
) -> Result<Requirement> {
    let player = player.unwrap_or(ctx.owner);
    if player >= ctx.known_items.len() {
        bail!("Rule refers to unknown player {}", player);
    }
    if !ctx.known_items[player].contains(name) {
        bail!("Rule refers to unknown item '{}' of player {}", name, player);
    }
    let name_id = world.item_name_id(name);
    Ok(Requirement::item_count(player, name_id, count))
}

pub fn build_multiworld(data: &MultiWorldData) -> Result<MultiWorld> {
    if data.players.is_empty() {
        bail!("World file contains no players");
    }
    let mut world = MultiWorld::new(data.players.len());

    let known_items: Vec<HashSet<String>> = data
        .players
        .iter()
        .map(|p| {
            let mut names: HashSet<String> = p.items.iter().map(|i| i.name.clone()).collect();
            for region in &p.regions {
                for loc in &region.locations {
                    if let Some(locked) = &loc.locked_item {
                        names.insert(locked.name.clone());
                    }
                }
            }
            names
        })
        .collect();

    for (player, player_data) in data.players.iter().enumerate() {
        if let Some(name) = &player_data.name {
            world.players[player].name = name.clone();
        }
        world.players[player].accessibility = player_data.accessibility;
        world.players[player].progression_balancing = player_data.progression_balancing;

        // Regions first, so that exits can refer to regions declared later.
        for region in &player_data.regions {
            if region.name != ORIGIN_REGION_NAME && world.get_region(&region.name, player).is_some()
            {
                bail!("Duplicate region '{}' for player {}", region.name, player);
            }
            world.add_region(player, &region.name);
        }
    }

    for (player, player_data) in data.players.iter().enumerate() {
        let ctx = RuleContext {
            known_items: &known_items,
            owner: player,
        };
        for region_data in &player_data.regions {
            let region = world
                .get_region(&region_data.name, player)
                .context("missing region")?;
            for loc_data in &region_data.locations {
                if world.get_location(&loc_data.name, player).is_some() {
                    bail!("Duplicate location '{}' for player {}", loc_data.name, player);
                }
                let access_rule = parse_rule(&mut world, &ctx, &loc_data.rule)
                    .with_context(|| format!("Invalid rule for location '{}'", loc_data.name))?;
                let loc = world.add_location(player, region, &loc_data.name);
                world.locations[loc].address = loc_data.address;
                world.locations[loc].progress_type = loc_data.progress_type;
                world.locations[loc].access_rule = access_rule;
                if let Some(locked) = &loc_data.locked_item {
                    let item = world.create_item(player, &locked.name, locked.advancement);
                    world.place_locked_item(loc, item);
                }
            }
            for exit in &region_data.exits {
                let Some(to) = world.get_region(&exit.to, player) else {
                    bail!(
                        "Exit '{}' leads to unknown region '{}' for player {}",
                        exit.name,
                        exit.to,
                        player
                    );
                };
                let access_rule = parse_rule(&mut world, &ctx, &exit.rule)
                    .with_context(|| format!("Invalid rule for exit '{}'", exit.name))?;
                world.connect(player, &exit.name, region, to, access_rule);
            }
        }

        for item_data in &player_data.items {
            for _ in 0..item_data.count {
                let item = world.create_item(player, &item_data.name, item_data.advancement);
                world.items[item].never_exclude = item_data.never_exclude;
                world.items[item].code = item_data.code;
                world.add_to_pool(item);
            }
        }

        for (names, is_local) in [
            (&player_data.local_items, true),
            (&player_data.non_local_items, false),
        ] {
            for name in names {
                if !known_items[player].contains(name) {
                    bail!("Locality setting refers to unknown item '{}'", name);
                }
                let name_id = world.item_name_id(name);
                if is_local {
                    world.players[player].local_items.insert(name_id);
                } else {
                    world.players[player].non_local_items.insert(name_id);
                }
            }
        }

        for name in &player_data.exclude_locations {
            if world.get_location(name, player).is_none() {
                bail!("Excluded location '{}' does not exist", name);
            }
        }
        exclusion_rules(&mut world, player, &player_data.exclude_locations);

        world.players[player].completion_condition =
            parse_rule(&mut world, &ctx, &player_data.completion)
                .context("Invalid completion condition")?;
    }

    locality_rules(&mut world);
    Ok(world)
}

pub fn parse_multiworld(json_str: &str) -> Result<MultiWorld> {
    let data: MultiWorldData = serde_json::from_str(json_str).context("Unable to parse world")?;
    build_multiworld(&data)
}

pub fn load_multiworld(path: &Path) -> Result<MultiWorld> {
    let json_str = std::fs::read_to_string(path)
        .with_context(|| format!("Unable to read world file at {}", path.display()))?;
    parse_multiworld(&json_str)
        .with_context(|| format!("Unable to load world file at {}", path.display()))
}
