//! Inventory: carrying, equipping, consuming, and giving items
//!
//! Items move between room floors, player inventories, and containers;
//! every move keeps the exclusive-location invariant and the owner's
//! weight/slot bookkeeping. Stacked floor items are picked up one unit at
//! a time.

use thiserror::Error;

use emberwake_types::{ItemId, PlayerId, TemplateId};

use crate::engine::WorldEngine;
use crate::systems::dispatcher::GameEvent;
use crate::systems::effects::{self, EffectSpec};
use crate::world::{EffectType, Item, World};

/// User-visible inventory refusals.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Your inventory is too heavy. ({current:.1}/{max:.1} kg)")]
    TooHeavy { current: f32, max: f32 },
    #[error("Your inventory is full. ({current}/{max} slots)")]
    NoSlots { current: u32, max: u32 },
    #[error("You don't have '{0}'.")]
    NotCarried(String),
    #[error("{0} cannot be equipped.")]
    NotEquippable(String),
    #[error("You don't have '{0}' equipped.")]
    NotEquipped(String),
}

/// Where to search for an item by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Inventory,
    Equipped,
    Both,
}

/// Find an item in a player's possession by name or keyword.
pub fn find_item_by_name(
    world: &World,
    player_id: &str,
    term: &str,
    scope: SearchScope,
) -> Option<ItemId> {
    let player = world.players.get(player_id)?;
    let mut fallback = None;
    for item_id in &player.inventory_items {
        let Some(item) = world.items.get(item_id) else {
            continue;
        };
        let in_scope = match scope {
            SearchScope::Inventory => !item.is_equipped(),
            SearchScope::Equipped => item.is_equipped(),
            SearchScope::Both => true,
        };
        if !in_scope || !item.matches_keyword(term) {
            continue;
        }
        // Exact name match beats the first partial hit.
        if item.name.eq_ignore_ascii_case(term) {
            return Some(item_id.clone());
        }
        fallback.get_or_insert_with(|| item_id.clone());
    }
    fallback
}

pub fn calculate_inventory_weight(world: &World, player_id: &str) -> f32 {
    let Some(player) = world.players.get(player_id) else {
        return 0.0;
    };
    player
        .inventory_items
        .iter()
        .filter_map(|id| world.items.get(id))
        .map(|item| {
            let unit = world
                .item_templates
                .get(&item.template_id)
                .map(|t| t.weight)
                .unwrap_or(0.0);
            unit * item.quantity as f32
        })
        .sum()
}

/// Recompute a player's weight/slot bookkeeping from the ground truth.
pub fn refresh_inventory_meta(world: &mut World, player_id: &str) {
    let weight = calculate_inventory_weight(world, player_id);
    let Some(player) = world.players.get_mut(player_id) else {
        return;
    };
    player.inventory_meta.current_weight = weight;
    player.inventory_meta.current_slots = player.inventory_items.len() as u32;
}

/// Move an existing item instance into a player's inventory, stacking onto
/// an existing stack when the template allows.
pub fn add_item_to_inventory(
    world: &mut World,
    player_id: &str,
    item_id: &str,
) -> Result<(), InventoryError> {
    let (template_id, quantity) = match world.items.get(item_id) {
        Some(item) => (item.template_id.clone(), item.quantity),
        None => return Ok(()),
    };
    let (unit_weight, max_stack) = world
        .item_templates
        .get(&template_id)
        .map(|t| (t.weight, t.max_stack_size))
        .unwrap_or((0.0, 1));

    // Capacity checks first so failures leave everything untouched.
    if let Some(player) = world.players.get(player_id) {
        let added_weight = unit_weight * quantity as f32;
        let new_weight = player.inventory_meta.current_weight + added_weight;
        if new_weight > player.inventory_meta.max_weight {
            return Err(InventoryError::TooHeavy {
                current: player.inventory_meta.current_weight,
                max: player.inventory_meta.max_weight,
            });
        }
        // A merge into an existing stack consumes no new slot.
        let merges = max_stack > 1 && stack_target(world, player_id, &template_id, quantity).is_some();
        if !merges && player.inventory_items.len() as u32 >= player.inventory_meta.max_slots {
            return Err(InventoryError::NoSlots {
                current: player.inventory_items.len() as u32,
                max: player.inventory_meta.max_slots,
            });
        }
    }

    if max_stack > 1
        && let Some(target_id) = stack_target(world, player_id, &template_id, quantity)
    {
        if let Some(target) = world.items.get_mut(&target_id) {
            target.quantity += quantity;
        }
        world.items.remove(item_id);
    } else {
        if let Some(item) = world.items.get_mut(item_id) {
            item.place_in_inventory(player_id.to_string());
        }
        if let Some(player) = world.players.get_mut(player_id) {
            player.inventory_items.insert(item_id.to_string());
        }
    }
    refresh_inventory_meta(world, player_id);
    Ok(())
}

/// An unequipped stack of the same template with room for `quantity` more.
fn stack_target(world: &World, player_id: &str, template_id: &str, quantity: u32) -> Option<ItemId> {
    let player = world.players.get(player_id)?;
    let max_stack = world.item_templates.get(template_id)?.max_stack_size;
    player
        .inventory_items
        .iter()
        .filter_map(|id| world.items.get(id))
        .find(|item| {
            item.template_id == template_id
                && !item.is_equipped()
                && item.quantity + quantity <= max_stack
        })
        .map(|item| item.id.clone())
}

/// Detach an item from a player's inventory (it ends up location-less;
/// the caller places it somewhere immediately).
pub fn remove_item_from_inventory(
    world: &mut World,
    player_id: &str,
    item_id: &str,
) -> Result<(), InventoryError> {
    let Some(player) = world.players.get_mut(player_id) else {
        return Ok(());
    };
    if !player.inventory_items.remove(item_id) {
        return Err(InventoryError::NotCarried(item_id.to_string()));
    }
    if let Some(item) = world.items.get_mut(item_id) {
        item.player_id = None;
        if let Some(slot) = item.equipped_slot.take()
            && let Some(player) = world.players.get_mut(player_id)
        {
            player.base.equipped_items.remove(&slot);
        }
    }
    refresh_inventory_meta(world, player_id);
    Ok(())
}

/// Equip an inventory item into its template slot, swapping out whatever
/// occupied it. Returns the displaced item, if any.
pub fn equip_item(
    world: &mut World,
    player_id: &str,
    item_id: &str,
) -> Result<Option<ItemId>, InventoryError> {
    let (template_id, name) = match world.items.get(item_id) {
        Some(item) => (item.template_id.clone(), item.name.clone()),
        None => return Err(InventoryError::NotCarried(item_id.to_string())),
    };
    let Some(slot) = world
        .item_templates
        .get(&template_id)
        .and_then(|t| t.equipment_slot.clone())
    else {
        return Err(InventoryError::NotEquippable(name));
    };

    // Swap out the current occupant of the slot.
    let mut displaced = None;
    let occupant: Option<ItemId> = world.players.get(player_id).and_then(|player| {
        player
            .inventory_items
            .iter()
            .filter_map(|id| world.items.get(id))
            .find(|item| item.equipped_slot.as_deref() == Some(slot.as_str()))
            .map(|item| item.id.clone())
    });
    if let Some(occupant_id) = occupant
        && occupant_id != item_id
    {
        if let Some(item) = world.items.get_mut(&occupant_id) {
            item.equipped_slot = None;
        }
        displaced = Some(occupant_id);
    }

    if let Some(item) = world.items.get_mut(item_id) {
        item.equipped_slot = Some(slot.clone());
    }
    if let Some(player) = world.players.get_mut(player_id) {
        player.base.equipped_items.insert(slot, template_id);
    }
    Ok(displaced)
}

pub fn unequip_item(world: &mut World, player_id: &str, item_id: &str) -> Result<(), InventoryError> {
    let Some(item) = world.items.get_mut(item_id) else {
        return Err(InventoryError::NotCarried(item_id.to_string()));
    };
    let Some(slot) = item.equipped_slot.take() else {
        return Err(InventoryError::NotEquipped(item.name.clone()));
    };
    if let Some(player) = world.players.get_mut(player_id) {
        player.base.equipped_items.remove(&slot);
    }
    Ok(())
}

/// Mint a fresh item from a template directly into a player's inventory.
/// Used by trigger grants and admin gifting. On a full inventory the item
/// lands on the floor instead.
pub fn grant_item(
    engine: &mut WorldEngine,
    player_id: &PlayerId,
    template_id: &TemplateId,
    quantity: u32,
) -> Vec<GameEvent> {
    let Some(template) = engine.world.item_templates.get(template_id).cloned() else {
        tracing::warn!(template = %template_id, "grant references unknown item template");
        return Vec::new();
    };
    let Some(room_id) = engine
        .world
        .players
        .get(player_id)
        .map(|p| p.base.room_id.clone())
    else {
        return Vec::new();
    };

    let id = engine.world.mint_id("item");
    let mut item = Item::in_inventory(id.clone(), template.id.clone(), template.name.clone(), player_id.clone());
    item.keywords = template.keywords.clone();
    item.description = template.description.clone();
    item.quantity = quantity.max(1);
    if template.has_durability {
        item.current_durability = Some(template.max_durability);
    }
    // Stage location-less, then place through the checked path.
    item.player_id = None;
    engine.world.items.insert(id.clone(), item);

    let mut events = Vec::new();
    match add_item_to_inventory(&mut engine.world, player_id, &id) {
        Ok(()) => {
            events.push(GameEvent::to_player(
                player_id.clone(),
                format!("You receive {}.", template.name),
            ));
        }
        Err(err) => {
            if let Some(item) = engine.world.items.get_mut(&id) {
                item.place_in_room(room_id.clone(), chrono::Utc::now());
            }
            if let Some(room) = engine.world.rooms.get_mut(&room_id) {
                room.items.insert(id.clone());
            }
            events.push(GameEvent::to_player(player_id.clone(), err.to_string()));
            events.push(GameEvent::to_player(
                player_id.clone(),
                format!("{} falls to the ground.", template.name),
            ));
        }
    }
    engine.dirty.mark(player_id);
    events
}

// ─────────────────────────────────────────────────────────────────────────────
// Command Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// `inventory`
pub fn inventory_command(world: &World, player_id: &PlayerId) -> Vec<GameEvent> {
    let Some(player) = world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    if player.inventory_items.is_empty() {
        return vec![GameEvent::to_player(player_id.clone(), "Your inventory is empty.")];
    }

    let mut item_lines = Vec::new();
    for item_id in &player.inventory_items {
        let Some(item) = world.items.get(item_id) else {
            continue;
        };
        let equipped = if item.is_equipped() { " [equipped]" } else { "" };
        let quantity = if item.quantity > 1 {
            format!(" x{}", item.quantity)
        } else {
            String::new()
        };
        item_lines.push(format!("  {}{quantity}{equipped}", item.name));
    }
    item_lines.sort();

    let weight = calculate_inventory_weight(world, player_id);
    let mut lines = vec!["=== Inventory ===".to_string()];
    lines.extend(item_lines);
    lines.push(String::new());
    lines.push(format!(
        "Weight: {weight:.1}/{:.1} kg",
        player.inventory_meta.max_weight
    ));
    lines.push(format!(
        "Slots: {}/{}",
        player.inventory_items.len(),
        player.inventory_meta.max_slots
    ));
    vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))]
}

/// `get <item> [from <container>]`
pub fn get_command(engine: &mut WorldEngine, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let args = args.trim();
    if args.is_empty() {
        return vec![GameEvent::to_player(player_id.clone(), "Get what?")];
    }
    if let Some((item_term, container_term)) = split_from_clause(args) {
        return get_from_container(engine, player_id, item_term, container_term);
    }
    get_from_room(engine, player_id, args)
}

/// Split "X from Y" into (X, Y); `None` when there is no from-clause.
/// ASCII-lowered for the search so byte offsets stay valid on the original.
fn split_from_clause(args: &str) -> Option<(&str, &str)> {
    let lower = args.to_ascii_lowercase();
    let index = lower.find(" from ")?;
    let item = args[..index].trim();
    let container = args[index + " from ".len()..].trim();
    if item.is_empty() || container.is_empty() {
        return None;
    }
    Some((item, container))
}

fn get_from_room(engine: &mut WorldEngine, player_id: &PlayerId, term: &str) -> Vec<GameEvent> {
    let Some(player) = engine.world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    let room_id = player.base.room_id.clone();
    let player_name = player.base.name.clone();

    let Some(found) = engine.world.find_item_in_room(&room_id, term) else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't see '{term}' here."),
        )];
    };
    let item_id = found.id.clone();
    let template_id = found.template_id.clone();
    let item_name = found.name.clone();
    let stacked = found.quantity > 1;

    if engine
        .world
        .item_templates
        .get(&template_id)
        .is_some_and(|t| t.flags.no_pickup)
    {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You cannot pick up {item_name}."),
        )];
    }

    let result = if stacked {
        // Peel one unit off the floor stack into a fresh instance.
        if let Some(item) = engine.world.items.get_mut(&item_id) {
            item.quantity -= 1;
        }
        let new_id = engine.world.mint_id("item");
        if let Some(mut unit) = engine.world.items.get(&item_id).cloned() {
            unit.id = new_id.clone();
            unit.quantity = 1;
            unit.room_id = None;
            unit.dropped_at = None;
            engine.world.items.insert(new_id.clone(), unit);
        }
        let result = add_item_to_inventory(&mut engine.world, player_id, &new_id);
        if result.is_err() {
            // Revert the peel
            engine.world.items.remove(&new_id);
            if let Some(item) = engine.world.items.get_mut(&item_id) {
                item.quantity += 1;
            }
        }
        result
    } else {
        if let Some(room) = engine.world.rooms.get_mut(&room_id) {
            room.items.remove(&item_id);
        }
        let result = add_item_to_inventory(&mut engine.world, player_id, &item_id);
        if result.is_err()
            && let Some(room) = engine.world.rooms.get_mut(&room_id)
        {
            room.items.insert(item_id.clone());
        }
        result
    };

    match result {
        Ok(()) => {
            engine.dirty.mark(player_id);
            let mut events = vec![
                GameEvent::to_player(player_id.clone(), format!("You pick up {item_name}.")),
                GameEvent::to_room_excluding(
                    room_id,
                    format!("{player_name} picks up {item_name}."),
                    [player_id.clone()],
                ),
            ];
            events.extend(crate::systems::quests::on_item_acquired(
                engine,
                player_id,
                &template_id,
                1,
            ));
            events
        }
        Err(err) => vec![GameEvent::to_player(player_id.clone(), err.to_string())],
    }
}

fn get_from_container(
    engine: &mut WorldEngine,
    player_id: &PlayerId,
    item_term: &str,
    container_term: &str,
) -> Vec<GameEvent> {
    let Some(player) = engine.world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    let room_id = player.base.room_id.clone();

    let container_id = find_item_by_name(&engine.world, player_id, container_term, SearchScope::Both)
        .or_else(|| {
            engine
                .world
                .find_item_in_room(&room_id, container_term)
                .map(|i| i.id.clone())
        });
    let Some(container_id) = container_id else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't see '{container_term}' anywhere."),
        )];
    };
    let container_name = engine
        .world
        .items
        .get(&container_id)
        .map(|c| c.name.clone())
        .unwrap_or_default();
    let is_container = engine
        .world
        .items
        .get(&container_id)
        .and_then(|c| engine.world.item_templates.get(&c.template_id))
        .is_some_and(|t| t.is_container);
    if !is_container {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("{container_name} is not a container."),
        )];
    }

    let found = engine
        .world
        .container_contents(&container_id)
        .into_iter()
        .filter_map(|id| engine.world.items.get(&id))
        .find(|item| item.matches_keyword(item_term))
        .map(|item| (item.id.clone(), item.name.clone()));
    let Some((item_id, item_name)) = found else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't see '{item_term}' in {container_name}."),
        )];
    };

    engine.world.remove_item_from_container(&item_id);
    match add_item_to_inventory(&mut engine.world, player_id, &item_id) {
        Ok(()) => {
            engine.dirty.mark(player_id);
            vec![GameEvent::to_player(
                player_id.clone(),
                format!("You take {item_name} from {container_name}."),
            )]
        }
        Err(err) => {
            engine.world.add_item_to_container(&item_id, &container_id);
            vec![GameEvent::to_player(player_id.clone(), err.to_string())]
        }
    }
}

/// `drop <item>`
pub fn drop_command(engine: &mut WorldEngine, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let term = args.trim();
    if term.is_empty() {
        return vec![GameEvent::to_player(player_id.clone(), "Drop what?")];
    }
    let Some(player) = engine.world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    let room_id = player.base.room_id.clone();
    let player_name = player.base.name.clone();

    let Some(item_id) = find_item_by_name(&engine.world, player_id, term, SearchScope::Inventory)
    else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't have '{term}'."),
        )];
    };
    let (item_name, template_id) = engine
        .world
        .items
        .get(&item_id)
        .map(|i| (i.name.clone(), i.template_id.clone()))
        .unwrap_or_default();
    if engine
        .world
        .item_templates
        .get(&template_id)
        .is_some_and(|t| t.flags.no_drop)
    {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You cannot drop {item_name}."),
        )];
    }

    if let Err(err) = remove_item_from_inventory(&mut engine.world, player_id, &item_id) {
        return vec![GameEvent::to_player(player_id.clone(), err.to_string())];
    }
    if let Some(item) = engine.world.items.get_mut(&item_id) {
        item.place_in_room(room_id.clone(), chrono::Utc::now());
    }
    if let Some(room) = engine.world.rooms.get_mut(&room_id) {
        room.items.insert(item_id.clone());
    }
    engine.dirty.mark(player_id);

    vec![
        GameEvent::to_player(player_id.clone(), format!("You drop {item_name}.")),
        GameEvent::to_room_excluding(
            room_id,
            format!("{player_name} drops {item_name}."),
            [player_id.clone()],
        ),
    ]
}

/// `equip <item>`
pub fn equip_command(engine: &mut WorldEngine, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let term = args.trim();
    if term.is_empty() {
        return vec![GameEvent::to_player(player_id.clone(), "Equip what?")];
    }
    let Some(item_id) = find_item_by_name(&engine.world, player_id, term, SearchScope::Inventory)
    else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't have '{term}'."),
        )];
    };
    let item_name = engine
        .world
        .items
        .get(&item_id)
        .map(|i| i.name.clone())
        .unwrap_or_default();

    match equip_item(&mut engine.world, player_id, &item_id) {
        Ok(displaced) => {
            engine.dirty.mark(player_id);
            let mut text = format!("You equip {item_name}.");
            if let Some(displaced_id) = displaced
                && let Some(displaced_item) = engine.world.items.get(&displaced_id)
            {
                text.push_str(&format!("\nYou unequip {}.", displaced_item.name));
            }
            let mut events = vec![GameEvent::to_player(player_id.clone(), text)];
            if let Some(player) = engine.world.players.get(player_id) {
                events.push(GameEvent::stat_update(player));
            }
            events
        }
        Err(err) => vec![GameEvent::to_player(player_id.clone(), err.to_string())],
    }
}

/// `unequip <item>`
pub fn unequip_command(engine: &mut WorldEngine, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let term = args.trim();
    if term.is_empty() {
        return vec![GameEvent::to_player(player_id.clone(), "Unequip what?")];
    }
    let Some(item_id) = find_item_by_name(&engine.world, player_id, term, SearchScope::Equipped)
    else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't have '{term}' equipped."),
        )];
    };
    let item_name = engine
        .world
        .items
        .get(&item_id)
        .map(|i| i.name.clone())
        .unwrap_or_default();

    match unequip_item(&mut engine.world, player_id, &item_id) {
        Ok(()) => {
            engine.dirty.mark(player_id);
            let mut events = vec![GameEvent::to_player(
                player_id.clone(),
                format!("You unequip {item_name}."),
            )];
            if let Some(player) = engine.world.players.get(player_id) {
                events.push(GameEvent::stat_update(player));
            }
            events
        }
        Err(err) => vec![GameEvent::to_player(player_id.clone(), err.to_string())],
    }
}

/// `use <item>`: consume a consumable, applying its effect.
pub fn use_command(engine: &mut WorldEngine, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let term = args.trim();
    if term.is_empty() {
        return vec![GameEvent::to_player(player_id.clone(), "Use what?")];
    }
    let Some(item_id) = find_item_by_name(&engine.world, player_id, term, SearchScope::Inventory)
    else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't have '{term}'."),
        )];
    };
    let (item_name, template_id) = engine
        .world
        .items
        .get(&item_id)
        .map(|i| (i.name.clone(), i.template_id.clone()))
        .unwrap_or_default();
    let Some(template) = engine.world.item_templates.get(&template_id).cloned() else {
        return vec![GameEvent::to_player(player_id.clone(), "Something is wrong with that item.")];
    };
    if !template.is_consumable {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You can't consume {item_name}."),
        )];
    }

    let mut events = vec![GameEvent::to_player(
        player_id.clone(),
        format!("You consume {item_name}."),
    )];

    if let Some(effect) = &template.consume_effect {
        // Instant heal: a heal-over-time shape with no tick interval.
        if effect.magnitude > 0
            && effect.effect_type == EffectType::Hot
            && effect.interval_secs <= 0.0
        {
            if let Some(player) = engine.world.players.get_mut(player_id) {
                let old = player.base.current_health;
                player.base.current_health =
                    (player.base.current_health + effect.magnitude).min(player.base.max_health);
                let healed = player.base.current_health - old;
                if healed > 0 {
                    events.push(GameEvent::to_player(
                        player_id.clone(),
                        format!("You heal for {healed} health."),
                    ));
                }
            }
        } else if effect.duration_secs > 0.0 || !effect.stat_modifiers.is_empty() {
            let mut spec = EffectSpec::new(effect.name.clone(), effect.effect_type)
                .duration(effect.duration_secs)
                .periodic(
                    // Periodic magnitude harms when positive; consumable
                    // heal-over-time stores a heal as negative magnitude.
                    if effect.effect_type == EffectType::Hot {
                        -effect.magnitude
                    } else {
                        effect.magnitude
                    },
                    effect.interval_secs,
                );
            spec.stat_modifiers = effect.stat_modifiers.clone();
            effects::apply_effect(engine, player_id, spec);
        }
    }

    // Spend one unit.
    let exhausted = engine
        .world
        .items
        .get_mut(&item_id)
        .map(|item| {
            if item.quantity > 1 {
                item.quantity -= 1;
                false
            } else {
                true
            }
        })
        .unwrap_or(false);
    if exhausted {
        let _ = remove_item_from_inventory(&mut engine.world, player_id, &item_id);
        engine.world.items.remove(&item_id);
    }
    refresh_inventory_meta(&mut engine.world, player_id);
    engine.dirty.mark(player_id);

    if let Some(player) = engine.world.players.get(player_id) {
        events.push(GameEvent::stat_update(player));
    }
    events
}

/// `give <item> to <target>` — hand an item to a player or NPC here.
pub fn give_command(engine: &mut WorldEngine, player_id: &PlayerId, args: &str) -> Vec<GameEvent> {
    let args = args.trim();
    let Some((item_term, target_term)) = split_to_clause(args) else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "Give what to whom? Usage: give <item> to <target>",
        )];
    };

    let Some(player) = engine.world.players.get(player_id) else {
        return vec![GameEvent::to_player(player_id.clone(), "You have no form.")];
    };
    let room_id = player.base.room_id.clone();
    let player_name = player.base.name.clone();

    let Some(item_id) = find_item_by_name(&engine.world, player_id, item_term, SearchScope::Inventory)
    else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't have '{item_term}'."),
        )];
    };
    let item_name = engine
        .world
        .items
        .get(&item_id)
        .map(|i| i.name.clone())
        .unwrap_or_default();

    let target = engine
        .world
        .find_entity_in_room(&room_id, target_term, true, true);
    let Some(target) = target else {
        return vec![GameEvent::to_player(
            player_id.clone(),
            format!("You don't see '{target_term}' here."),
        )];
    };
    let target_id = target.base().id.clone();
    let target_is_player = target.is_player();
    let target_name = target.name().to_string();

    if target_id == *player_id {
        return vec![GameEvent::to_player(
            player_id.clone(),
            "You can't give items to yourself.",
        )];
    }

    if target_is_player {
        let connected = engine
            .world
            .players
            .get(&target_id)
            .is_some_and(|p| p.is_connected);
        if !connected {
            return vec![GameEvent::to_player(
                player_id.clone(),
                format!("{target_name} is in stasis and cannot receive items."),
            )];
        }
        if let Err(err) = remove_item_from_inventory(&mut engine.world, player_id, &item_id) {
            return vec![GameEvent::to_player(player_id.clone(), err.to_string())];
        }
        match add_item_to_inventory(&mut engine.world, &target_id, &item_id) {
            Ok(()) => {
                engine.dirty.mark(player_id);
                engine.dirty.mark(&target_id);
                vec![
                    GameEvent::to_player(
                        player_id.clone(),
                        format!("You give {item_name} to {target_name}."),
                    ),
                    GameEvent::to_player(
                        target_id.clone(),
                        format!("{player_name} gives you {item_name}."),
                    ),
                    GameEvent::to_room_excluding(
                        room_id,
                        format!("{player_name} gives {item_name} to {target_name}."),
                        [player_id.clone(), target_id],
                    ),
                ]
            }
            Err(_) => {
                // Hand it back.
                let _ = add_item_to_inventory(&mut engine.world, player_id, &item_id);
                vec![GameEvent::to_player(
                    player_id.clone(),
                    format!("{target_name}'s inventory is full."),
                )]
            }
        }
    } else {
        if let Err(err) = remove_item_from_inventory(&mut engine.world, player_id, &item_id) {
            return vec![GameEvent::to_player(player_id.clone(), err.to_string())];
        }
        let npc_line = engine
            .world
            .npcs
            .get(&target_id)
            .and_then(|npc| engine.world.npc_templates.get(&npc.template_id))
            .map(|template| match template.npc_type {
                crate::world::templates::NpcType::Merchant => {
                    format!("\n{target_name} says \"Hmm, interesting. I'll take a look at this.\"")
                }
                crate::world::templates::NpcType::Friendly => {
                    format!("\n{target_name} accepts your gift graciously.")
                }
                crate::world::templates::NpcType::Hostile => {
                    format!("\n{target_name} snatches the item from your hand.")
                }
                crate::world::templates::NpcType::Neutral => {
                    format!("\n{target_name} takes the item.")
                }
            })
            .unwrap_or_default();
        if let Some(npc) = engine.world.npcs.get_mut(&target_id) {
            npc.inventory_items.insert(item_id.clone());
        }
        if let Some(item) = engine.world.items.get_mut(&item_id) {
            // NPC possession rides the container-free player slot.
            item.player_id = Some(target_id.clone());
        }
        engine.dirty.mark(player_id);
        vec![
            GameEvent::to_player(
                player_id.clone(),
                format!("You give {item_name} to {target_name}.{npc_line}"),
            ),
            GameEvent::to_room_excluding(
                room_id,
                format!("{player_name} gives {item_name} to {target_name}."),
                [player_id.clone()],
            ),
        ]
    }
}

/// Split "X to Y" into (X, Y).
fn split_to_clause(args: &str) -> Option<(&str, &str)> {
    let lower = args.to_ascii_lowercase();
    let index = lower.find(" to ")?;
    let item = args[..index].trim();
    let target = args[index + " to ".len()..].trim();
    if item.is_empty() || target.is_empty() {
        return None;
    }
    Some((item, target))
}

#[cfg(test)]
mod inventory_tests;
