//! Tests for inventory flows: pickup, drop, equip, consume, give,
//! containers, and capacity limits.

use super::*;
use crate::systems::dispatcher::EventBody;
use crate::test_support::{
    connected_player, drain_texts, goblin_ear_template, test_engine, training_weapon_template,
    two_room_world,
};
use crate::world::templates::{ConsumeEffect, ContainerType, ItemTemplate};
use crate::world::EffectType;

fn potion_template() -> ItemTemplate {
    ItemTemplate {
        id: "healing_draught".into(),
        name: "healing draught".into(),
        description: "Red liquid in a stoppered vial.".into(),
        flavor_text: None,
        keywords: vec!["draught".into(), "potion".into()],
        item_type: "consumable".into(),
        item_subtype: None,
        rarity: "common".into(),
        weight: 0.5,
        value: 10,
        max_stack_size: 5,
        equipment_slot: None,
        stat_modifiers: Default::default(),
        weapon: None,
        is_container: false,
        container_capacity: None,
        container_type: Default::default(),
        is_consumable: true,
        consume_effect: Some(ConsumeEffect {
            name: "Mending".into(),
            effect_type: EffectType::Hot,
            duration_secs: 0.0,
            stat_modifiers: Default::default(),
            magnitude: 25,
            interval_secs: 0.0,
        }),
        has_durability: false,
        max_durability: 0,
        flags: Default::default(),
    }
}

fn satchel_template() -> ItemTemplate {
    ItemTemplate {
        id: "satchel".into(),
        name: "leather satchel".into(),
        description: "A worn leather satchel.".into(),
        flavor_text: None,
        keywords: vec!["satchel".into(), "bag".into()],
        item_type: "container".into(),
        item_subtype: None,
        rarity: "common".into(),
        weight: 1.0,
        value: 3,
        max_stack_size: 1,
        equipment_slot: None,
        stat_modifiers: Default::default(),
        weapon: None,
        is_container: true,
        container_capacity: Some(4.0),
        container_type: ContainerType::SlotBased,
        is_consumable: false,
        consume_effect: None,
        has_durability: false,
        max_durability: 0,
        flags: Default::default(),
    }
}

fn arena() -> (crate::engine::WorldEngine, crate::engine::EngineHandle) {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    connected_player(&mut world, "p2", "Witness", "start");
    world.insert_item_template(training_weapon_template());
    world.insert_item_template(goblin_ear_template());
    world.insert_item_template(potion_template());
    world.insert_item_template(satchel_template());
    test_engine(world)
}

#[tokio::test(start_paused = true)]
async fn get_and_drop_round_trip() {
    let (mut engine, _handle) = arena();
    engine.world.spawn_item("training_blade", "start", 1);
    let mut rx2 = engine.connect_player(&"p2".to_string());
    crate::test_support::drain_events(&mut rx2);

    let events = get_command(&mut engine, &"p1".to_string(), "blade");
    engine.dispatch_events(events);
    assert_eq!(engine.world.players["p1"].inventory_items.len(), 1);
    assert!(engine.world.rooms["start"].items.is_empty());
    let texts = drain_texts(&mut rx2);
    assert!(texts.iter().any(|t| t.contains("Marn picks up training blade.")));

    let events = drop_command(&mut engine, &"p1".to_string(), "blade");
    engine.dispatch_events(events);
    assert!(engine.world.players["p1"].inventory_items.is_empty());
    assert_eq!(engine.world.rooms["start"].items.len(), 1);
    let dropped = engine.world.rooms["start"].items.iter().next().unwrap();
    assert!(engine.world.items[dropped].dropped_at.is_some());
    engine.world.check_invariants().unwrap();
}

#[tokio::test(start_paused = true)]
async fn stacked_floor_items_are_picked_up_one_at_a_time() {
    let (mut engine, _handle) = arena();
    engine.world.spawn_item("goblin_ear", "start", 3);

    get_command(&mut engine, &"p1".to_string(), "ear");

    let floor_item = engine.world.rooms["start"].items.iter().next().unwrap().clone();
    assert_eq!(engine.world.items[&floor_item].quantity, 2, "stack reduced");
    let carried = engine.world.players["p1"].inventory_items.iter().next().unwrap().clone();
    assert_eq!(engine.world.items[&carried].quantity, 1);
}

#[tokio::test(start_paused = true)]
async fn equip_swaps_and_updates_stats() {
    let (mut engine, _handle) = arena();
    engine.world.spawn_item("training_blade", "start", 1);
    get_command(&mut engine, &"p1".to_string(), "blade");

    let events = equip_command(&mut engine, &"p1".to_string(), "blade");
    assert!(events
        .iter()
        .any(|e| matches!(&e.body, EventBody::StatUpdate { .. })));
    let player = &engine.world.players["p1"];
    assert_eq!(
        player.base.equipped_items.get("weapon").map(String::as_str),
        Some("training_blade")
    );

    // The equipped blade now drives combat weapon resolution.
    let weapon = crate::systems::combat::equipped_weapon(&engine.world, "p1");
    assert_eq!(weapon.name, "training blade");

    let events = unequip_command(&mut engine, &"p1".to_string(), "blade");
    assert!(!events.is_empty());
    assert!(engine.world.players["p1"].base.equipped_items.is_empty());
}

#[tokio::test(start_paused = true)]
async fn consume_heals_and_spends_a_unit() {
    let (mut engine, _handle) = arena();
    engine.world.spawn_item("healing_draught", "start", 2);
    get_command(&mut engine, &"p1".to_string(), "draught");
    // One unit of the floor stack came along.
    get_command(&mut engine, &"p1".to_string(), "draught");
    engine.world.players.get_mut("p1").unwrap().base.current_health = 60;

    let events = use_command(&mut engine, &"p1".to_string(), "draught");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("You heal for 25 health.")
    )));
    let player = &engine.world.players["p1"];
    assert_eq!(player.base.current_health, 85);
    // Two units were stacked; one remains.
    let remaining: u32 = player
        .inventory_items
        .iter()
        .filter_map(|id| engine.world.items.get(id))
        .map(|i| i.quantity)
        .sum();
    assert_eq!(remaining, 1);
}

#[tokio::test(start_paused = true)]
async fn give_hands_items_between_players() {
    let (mut engine, _handle) = arena();
    engine.world.spawn_item("training_blade", "start", 1);
    get_command(&mut engine, &"p1".to_string(), "blade");

    let events = give_command(&mut engine, &"p1".to_string(), "blade to Witness");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("You give training blade to Witness.")
    )));
    assert!(engine.world.players["p1"].inventory_items.is_empty());
    assert_eq!(engine.world.players["p2"].inventory_items.len(), 1);
    engine.world.check_invariants().unwrap();
}

#[tokio::test(start_paused = true)]
async fn get_from_container() {
    let (mut engine, _handle) = arena();
    engine.world.spawn_item("satchel", "start", 1);
    let ear_id = engine.world.spawn_item("goblin_ear", "start", 1).unwrap();
    let satchel_id = engine
        .world
        .rooms["start"]
        .items
        .iter()
        .find(|id| engine.world.items[*id].template_id == "satchel")
        .cloned()
        .unwrap();
    // Stash the ear inside the satchel.
    engine.world.rooms.get_mut("start").unwrap().items.remove(&ear_id);
    engine.world.add_item_to_container(&ear_id, &satchel_id);
    assert_eq!(engine.world.container_slot_count(&satchel_id), 1);

    let events = get_command(&mut engine, &"p1".to_string(), "ear from satchel");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("You take goblin ear from leather satchel.")
    )));
    assert_eq!(engine.world.container_slot_count(&satchel_id), 0);
    assert_eq!(engine.world.players["p1"].inventory_items.len(), 1);
    engine.world.check_invariants().unwrap();
}

#[tokio::test(start_paused = true)]
async fn slot_capacity_refuses_overflow() {
    let (mut engine, _handle) = arena();
    engine
        .world
        .players
        .get_mut("p1")
        .unwrap()
        .inventory_meta
        .max_slots = 1;
    engine.world.spawn_item("training_blade", "start", 1);
    engine.world.spawn_item("satchel", "start", 1);

    get_command(&mut engine, &"p1".to_string(), "blade");
    let events = get_command(&mut engine, &"p1".to_string(), "satchel");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("inventory is full")
    )));
    // The refused item stayed on the floor.
    assert_eq!(engine.world.rooms["start"].items.len(), 1);
    assert_eq!(engine.world.players["p1"].inventory_items.len(), 1);
    engine.world.check_invariants().unwrap();
}

#[tokio::test(start_paused = true)]
async fn grant_item_lands_in_inventory() {
    let (mut engine, _handle) = arena();
    let events = grant_item(&mut engine, &"p1".to_string(), &"goblin_ear".to_string(), 2);
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("You receive goblin ear.")
    )));
    let total: u32 = engine.world.players["p1"]
        .inventory_items
        .iter()
        .filter_map(|id| engine.world.items.get(id))
        .map(|i| i.quantity)
        .sum();
    assert_eq!(total, 2);
}
