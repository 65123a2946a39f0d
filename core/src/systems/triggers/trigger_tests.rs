//! Tests for the trigger system
//!
//! Covers wildcard command matching, the secret-exit scenario with a
//! one-shot fire budget, cooldowns, conditions, and timer triggers.

use std::time::Duration;

use emberwake_types::Direction;
use hashbrown::HashMap;

use super::{
    fire_event, wildcard_match, Trigger, TriggerAction, TriggerCondition, TriggerContext,
    TriggerEventKind, TriggerOwner,
};
use crate::test_support::{connected_player, test_engine, two_room_world};
use crate::world::Room;

#[test]
fn wildcard_patterns() {
    assert!(wildcard_match("pull*lever", "pull rusty lever"));
    assert!(wildcard_match("pull*lever", "pull lever"));
    assert!(wildcard_match("pull*lever", "PULL THE LEVER"));
    assert!(!wildcard_match("pull*lever", "pull the chain"));
    assert!(wildcard_match("*", "anything at all"));
    assert!(wildcard_match("knock", "knock"));
    assert!(!wildcard_match("knock", "knock twice"));
    assert!(wildcard_match("say * softly", "say hello softly"));
}

fn lever_trigger() -> Trigger {
    let mut exits = HashMap::new();
    exits.insert("down".to_string(), "secret".to_string());
    let mut trigger = Trigger::new(
        "lever",
        TriggerEventKind::OnCommand,
        vec![
            TriggerAction::MessageRoom {
                text: "Stone grinds against stone.".into(),
            },
            TriggerAction::OverrideRoomExits { exits },
        ],
    );
    trigger.command_pattern = Some("pull*lever".into());
    trigger.max_fires = 1;
    trigger
}

#[tokio::test(start_paused = true)]
async fn on_command_opens_the_secret_exit_once() {
    let mut world = two_room_world();
    world
        .rooms
        .insert("secret".into(), Room::new("secret".into(), "Hidden Vault", "A vault of old gold."));
    world.rooms.get_mut("start").unwrap().triggers.push(lever_trigger());
    connected_player(&mut world, "p1", "Marn", "start");
    let (mut engine, _handle) = test_engine(world);

    // The unknown token falls through the router into the trigger.
    let events = engine.handle_command(&"p1".to_string(), "pull rusty lever");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        crate::systems::dispatcher::EventBody::Message { text, .. }
            if text.contains("Stone grinds")
    )));

    // The override added `down` on top of the authored exits.
    let exits = engine.world.rooms["start"].effective_exits().clone();
    assert_eq!(exits.get(&Direction::Down), Some(&"secret".to_string()));
    assert_eq!(exits.get(&Direction::North), Some(&"hall".to_string()));

    // `down` now works.
    let events = engine.move_player(&"p1".to_string(), Direction::Down);
    assert!(!events.is_empty());
    assert_eq!(engine.world.players["p1"].base.room_id, "secret");

    // Walk back and pull again: the fire budget is spent.
    engine.world.rooms.get_mut("secret").unwrap().entities.remove("p1");
    engine.world.rooms.get_mut("start").unwrap().entities.insert("p1".into());
    engine.world.players.get_mut("p1").unwrap().base.room_id = "start".into();

    let events = engine.handle_command(&"p1".to_string(), "pull rusty lever");
    assert!(
        events.iter().any(|e| matches!(
            &e.body,
            crate::systems::dispatcher::EventBody::Message { text, .. }
                if text.contains("unintelligible")
        )),
        "spent trigger no longer consumes the command"
    );
    assert_eq!(engine.world.rooms["start"].triggers[0].fire_count, 1);
}

#[tokio::test(start_paused = true)]
async fn cooldown_gates_refiring() {
    let mut world = two_room_world();
    let mut trigger = Trigger::new(
        "chime",
        TriggerEventKind::OnEnter,
        vec![TriggerAction::MessagePlayer {
            text: "A chime rings.".into(),
        }],
    );
    trigger.cooldown = 10.0;
    world.rooms.get_mut("hall").unwrap().triggers.push(trigger);
    connected_player(&mut world, "p1", "Marn", "start");
    let (mut engine, _handle) = test_engine(world);

    let ctx = TriggerContext::movement("p1", "hall", TriggerEventKind::OnEnter, Direction::North);
    let owner = TriggerOwner::Room("hall".to_string());

    let first = fire_event(&mut engine, &owner, TriggerEventKind::OnEnter, &ctx);
    assert_eq!(first.fired, 1);

    let blocked = fire_event(&mut engine, &owner, TriggerEventKind::OnEnter, &ctx);
    assert_eq!(blocked.fired, 0, "cooldown holds");

    tokio::time::advance(Duration::from_secs(11)).await;
    let again = fire_event(&mut engine, &owner, TriggerEventKind::OnEnter, &ctx);
    assert_eq!(again.fired, 1, "cooldown elapsed");
}

#[tokio::test(start_paused = true)]
async fn conditions_all_must_hold() {
    let mut world = two_room_world();
    let mut trigger = Trigger::new(
        "warded_door",
        TriggerEventKind::OnEnter,
        vec![TriggerAction::MessagePlayer {
            text: "The ward recognizes you.".into(),
        }],
    );
    trigger.conditions = vec![
        TriggerCondition::FlagSet {
            flag: "ward_attuned".into(),
        },
        TriggerCondition::PlayerLevelAtLeast { level: 2 },
    ];
    world.rooms.get_mut("hall").unwrap().triggers.push(trigger);
    connected_player(&mut world, "p1", "Marn", "start");
    let (mut engine, _handle) = test_engine(world);

    let ctx = TriggerContext::movement("p1", "hall", TriggerEventKind::OnEnter, Direction::North);
    let owner = TriggerOwner::Room("hall".to_string());

    assert_eq!(
        fire_event(&mut engine, &owner, TriggerEventKind::OnEnter, &ctx).fired,
        0,
        "no flag, no level"
    );

    engine
        .world
        .players
        .get_mut("p1")
        .unwrap()
        .player_flags
        .insert("ward_attuned".into());
    assert_eq!(
        fire_event(&mut engine, &owner, TriggerEventKind::OnEnter, &ctx).fired,
        0,
        "level still short"
    );

    engine.world.players.get_mut("p1").unwrap().level = 2;
    assert_eq!(
        fire_event(&mut engine, &owner, TriggerEventKind::OnEnter, &ctx).fired,
        1
    );
}

#[tokio::test(start_paused = true)]
async fn set_flag_and_teleport_actions() {
    let mut world = two_room_world();
    let trigger = Trigger::new(
        "trapdoor",
        TriggerEventKind::OnEnter,
        vec![
            TriggerAction::SetFlag {
                flag: "fell_through".into(),
            },
            TriggerAction::Teleport {
                room_id: "start".into(),
            },
        ],
    );
    world.rooms.get_mut("hall").unwrap().triggers.push(trigger);
    connected_player(&mut world, "p1", "Marn", "hall");
    let (mut engine, _handle) = test_engine(world);

    let ctx = TriggerContext::movement("p1", "hall", TriggerEventKind::OnEnter, Direction::North);
    let owner = TriggerOwner::Room("hall".to_string());
    fire_event(&mut engine, &owner, TriggerEventKind::OnEnter, &ctx);

    let player = &engine.world.players["p1"];
    assert!(player.player_flags.contains("fell_through"));
    assert_eq!(player.base.room_id, "start");
    engine.world.check_invariants().unwrap();
}

#[tokio::test(start_paused = true)]
async fn timer_trigger_fires_on_interval() {
    let mut world = two_room_world();
    let mut trigger = Trigger::new(
        "drip",
        TriggerEventKind::OnTimer,
        vec![TriggerAction::MessageRoom {
            text: "Water drips from the ceiling.".into(),
        }],
    );
    trigger.timer_interval = Some(5.0);
    trigger.timer_initial_delay = Some(2.0);
    world.rooms.get_mut("start").unwrap().triggers.push(trigger);
    connected_player(&mut world, "p1", "Marn", "start");
    let (mut engine, _handle) = test_engine(world);
    let mut rx = engine.connect_player(&"p1".to_string());
    crate::test_support::drain_events(&mut rx);

    super::initialize_all_timers(&mut engine);

    tokio::time::advance(Duration::from_secs(2)).await;
    engine.fire_due();
    tokio::time::advance(Duration::from_secs(5)).await;
    engine.fire_due();

    let texts = crate::test_support::drain_texts(&mut rx);
    assert_eq!(
        texts.iter().filter(|t| t.contains("Water drips")).count(),
        2,
        "initial delay then interval"
    );
}
