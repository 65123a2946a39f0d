//! Tests for behavior resolution and hook execution

use super::{instances_for, merged_config, process_result, run_hook, BehaviorResult, HookArgs};
use crate::test_support::{connected_player, goblin_template, test_engine, two_room_world};
use crate::world::CombatPhase;

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn instances_sort_by_priority() {
    let instances = instances_for(&tags(&["wanders_sometimes", "stationary", "aggressive"]));
    let names: Vec<&str> = instances.iter().map(|b| b.name()).collect();
    // stationary (50) before aggressive (80) before wanderer (100)
    assert_eq!(names, vec!["stationary", "aggressive", "wanders_sometimes"]);
}

#[test]
fn unknown_tags_are_skipped() {
    let instances = instances_for(&tags(&["aggressive", "does_not_exist"]));
    assert_eq!(instances.len(), 1);
}

#[test]
fn higher_priority_defaults_win_the_merge() {
    // The wanderer enables wandering; stationary (priority 50) overrides.
    let config = merged_config(&tags(&["wanders_sometimes", "stationary"]));
    assert!(!config.wander_enabled);

    let config = merged_config(&tags(&["wanders_sometimes"]));
    assert!(config.wander_enabled);
    assert!((config.wander_chance - 0.1).abs() < f64::EPSILON);
}

fn arena_with_npc(behaviors: &[&str]) -> (crate::engine::WorldEngine, String) {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    let mut template = goblin_template();
    template.behaviors = tags(behaviors);
    template.resolve_behaviors();
    world.insert_npc_template(template);
    world.spawn_npc("goblin", "start");
    let (engine, _handle) = test_engine(world);
    let npc_id = engine.world.npcs.keys().next().cloned().unwrap();
    (engine, npc_id)
}

#[tokio::test(start_paused = true)]
async fn aggressive_npc_attacks_on_sight() {
    let (mut engine, npc_id) = arena_with_npc(&["aggressive"]);

    let result = run_hook(&mut engine, &npc_id, HookArgs::PlayerEnter("p1"))
        .expect("aggressive handles player entry");
    assert!(result.handled);
    assert_eq!(result.attack_target.as_deref(), Some("p1"));
    assert!(result.message.as_deref().is_some_and(|m| m.contains("snarls")));

    process_result(&mut engine, &npc_id, &result);
    let npc = &engine.world.npcs[&npc_id];
    assert_eq!(npc.base.combat.phase, CombatPhase::Windup);
    assert_eq!(npc.base.combat.target_id.as_deref(), Some("p1"));
}

#[tokio::test(start_paused = true)]
async fn pacifist_preempts_aggression() {
    let (mut engine, npc_id) = arena_with_npc(&["aggressive", "pacifist"]);

    let result = run_hook(&mut engine, &npc_id, HookArgs::PlayerEnter("p1"))
        .expect("pacifist handles player entry");
    assert!(result.handled);
    assert!(result.attack_target.is_none(), "pacifist suppressed the attack");
}

#[tokio::test(start_paused = true)]
async fn defensive_npc_retaliates_when_struck() {
    let (mut engine, npc_id) = arena_with_npc(&["defensive"]);

    let result = run_hook(
        &mut engine,
        &npc_id,
        HookArgs::Damaged {
            attacker: "p1",
            damage: 3,
        },
    )
    .expect("defensive handles damage");
    assert_eq!(result.attack_target.as_deref(), Some("p1"));
}

#[tokio::test(start_paused = true)]
async fn calls_for_help_is_advisory_when_allies_present() {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    let mut template = goblin_template();
    template.behaviors = tags(&["calls_for_help"]);
    template.resolve_behaviors();
    world.insert_npc_template(template);
    world.spawn_npc("goblin", "start");
    world.spawn_npc("goblin", "start");
    let (mut engine, _handle) = test_engine(world);
    let npc_id = engine.world.npcs.keys().next().cloned().unwrap();

    let result = run_hook(
        &mut engine,
        &npc_id,
        HookArgs::Damaged {
            attacker: "p1",
            damage: 3,
        },
    )
    .expect("advisory result returned");
    assert!(!result.handled, "cry for help does not stop the chain");
    assert!(result.call_for_help);
    assert!(result.message.as_deref().is_some_and(|m| m.contains("cries out")));
}

#[tokio::test(start_paused = true)]
async fn lone_npc_does_not_cry_for_help() {
    let (mut engine, npc_id) = arena_with_npc(&["calls_for_help"]);
    let result = run_hook(
        &mut engine,
        &npc_id,
        HookArgs::Damaged {
            attacker: "p1",
            damage: 3,
        },
    );
    assert!(result.is_some_and(|r| !r.call_for_help), "no allies in the room");
}

#[tokio::test(start_paused = true)]
async fn movement_results_are_suppressed_in_combat()
{
    let (mut engine, npc_id) = arena_with_npc(&[]);
    // Pin the NPC in combat.
    {
        let npc = engine.world.npcs.get_mut(&npc_id).unwrap();
        npc.base.combat.engage(
            "p1".to_string(),
            crate::world::WeaponStats::unarmed(),
            tokio::time::Instant::now(),
        );
    }

    let result = BehaviorResult::move_to(
        emberwake_types::Direction::North,
        "hall".to_string(),
        "a goblin wanders north.".to_string(),
    );
    process_result(&mut engine, &npc_id, &result);

    assert_eq!(
        engine.world.npcs[&npc_id].base.room_id,
        "start",
        "engaged NPCs hold their ground"
    );
}

#[tokio::test(start_paused = true)]
async fn wander_result_moves_the_npc_and_announces() {
    let mut world = two_room_world();
    connected_player(&mut world, "p2", "Witness", "hall");
    let mut template = goblin_template();
    template.behaviors = tags(&["wanders_frequently"]);
    template.resolve_behaviors();
    world.insert_npc_template(template);
    world.spawn_npc("goblin", "start");
    let (mut engine, _handle) = test_engine(world);
    let npc_id = engine.world.npcs.keys().next().cloned().unwrap();
    let mut rx = engine.connect_player(&"p2".to_string());
    crate::test_support::drain_events(&mut rx);

    let result = BehaviorResult::move_to(
        emberwake_types::Direction::North,
        "hall".to_string(),
        "a goblin wanders north.".to_string(),
    );
    let events = process_result(&mut engine, &npc_id, &result);
    engine.dispatch_events(events);

    assert_eq!(engine.world.npcs[&npc_id].base.room_id, "hall");
    assert!(engine.world.rooms["hall"].entities.contains(&npc_id));
    let texts = crate::test_support::drain_texts(&mut rx);
    assert!(texts.iter().any(|t| t.contains("arrives from the south")));
    engine.world.check_invariants().unwrap();
}
