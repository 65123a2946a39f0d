//! Shared fixtures for the engine test suites

use tokio::sync::mpsc::UnboundedReceiver;

use emberwake_types::Direction;

use crate::config::EngineConfig;
use crate::engine::WorldEngine;
use crate::systems::dispatcher::{EventBody, WireEvent};
use crate::world::templates::{DropEntry, DropQuantity, ItemTemplate, NpcTemplate};
use crate::world::{Player, Room, WeaponStats, World};

/// Two connected rooms: `start` (north → hall) and `hall` (south → start).
pub fn two_room_world() -> World {
    let mut world = World::new();
    let mut start = Room::new("start".into(), "Dusty Crossroads", "A dusty crossroads under a grey sky.");
    start.exits.insert(Direction::North, "hall".into());
    let mut hall = Room::new("hall".into(), "Great Hall", "A vaulted hall of cold stone.");
    hall.exits.insert(Direction::South, "start".into());
    world.rooms.insert("start".into(), start);
    world.rooms.insert("hall".into(), hall);
    world
}

/// Engine over a world with default config; the handle is kept alive so
/// the control channel stays open.
pub fn test_engine(world: World) -> (WorldEngine, crate::engine::EngineHandle) {
    WorldEngine::new(world, EngineConfig::default())
}

/// A connected player standing in `room`.
pub fn connected_player(world: &mut World, id: &str, name: &str, room: &str) {
    let mut player = Player::new(id.to_string(), name, room.to_string());
    player.is_connected = true;
    world.insert_player(player);
}

/// A goblin template: 2 HP, no armor, rewards 25 XP, one guaranteed drop.
pub fn goblin_template() -> NpcTemplate {
    let mut template = NpcTemplate {
        id: "goblin".into(),
        name: "goblin".into(),
        description: "A scrawny cave goblin.".into(),
        keywords: vec!["goblin".into()],
        npc_type: crate::world::templates::NpcType::Hostile,
        level: 1,
        max_health: 2,
        armor_class: 0,
        strength: 10,
        dexterity: 10,
        intelligence: 10,
        vitality: 10,
        weapon: WeaponStats {
            name: "claws".into(),
            damage_min: 1,
            damage_max: 1,
            damage_type: "slashing".into(),
            windup_time: 5.0,
            swing_time: 5.0,
        },
        experience_reward: 25,
        drop_table: vec![DropEntry {
            template_id: "goblin_ear".into(),
            chance: 1.0,
            quantity: DropQuantity::Fixed(1),
        }],
        behaviors: Vec::new(),
        resolved_behavior: Default::default(),
        faction_id: None,
        idle_messages: Vec::new(),
        dialogue: None,
    };
    template.resolve_behaviors();
    template
}

/// Trophy item template dropped by the goblin.
pub fn goblin_ear_template() -> ItemTemplate {
    ItemTemplate {
        id: "goblin_ear".into(),
        name: "goblin ear".into(),
        description: "A leathery trophy.".into(),
        flavor_text: None,
        keywords: vec!["ear".into()],
        item_type: "misc".into(),
        item_subtype: None,
        rarity: "common".into(),
        weight: 0.1,
        value: 1,
        max_stack_size: 10,
        equipment_slot: None,
        stat_modifiers: Default::default(),
        weapon: None,
        is_container: false,
        container_capacity: None,
        container_type: Default::default(),
        is_consumable: false,
        consume_effect: None,
        has_durability: false,
        max_durability: 0,
        flags: Default::default(),
    }
}

/// A test weapon template: exact 1 damage, 0.1s windup and swing.
pub fn training_weapon_template() -> ItemTemplate {
    ItemTemplate {
        id: "training_blade".into(),
        name: "training blade".into(),
        description: "A blunt practice blade.".into(),
        flavor_text: None,
        keywords: vec!["blade".into(), "training".into()],
        item_type: "weapon".into(),
        item_subtype: None,
        rarity: "common".into(),
        weight: 1.0,
        value: 5,
        max_stack_size: 1,
        equipment_slot: Some("weapon".into()),
        stat_modifiers: Default::default(),
        weapon: Some(WeaponStats {
            name: "training blade".into(),
            damage_min: 1,
            damage_max: 1,
            damage_type: "slashing".into(),
            windup_time: 0.1,
            swing_time: 0.1,
        }),
        is_container: false,
        container_capacity: None,
        container_type: Default::default(),
        is_consumable: false,
        consume_effect: None,
        has_durability: false,
        max_durability: 0,
        flags: Default::default(),
    }
}

/// Drain every message text currently queued on a listener.
pub fn drain_texts(rx: &mut UnboundedReceiver<WireEvent>) -> Vec<String> {
    let mut texts = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EventBody::Message { text, .. } = event.body {
            texts.push(text);
        }
    }
    texts
}

/// Drain every wire event currently queued on a listener.
pub fn drain_events(rx: &mut UnboundedReceiver<WireEvent>) -> Vec<WireEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Step paused tokio time forward in small increments, firing due events
/// after each step so chained timers (windup → swing → recovery) keep
/// flowing.
pub async fn run_for(engine: &mut WorldEngine, seconds: f64) {
    let step = std::time::Duration::from_millis(50);
    let mut elapsed = 0.0;
    while elapsed < seconds {
        tokio::time::advance(step).await;
        engine.fire_due();
        elapsed += step.as_secs_f64();
    }
}
