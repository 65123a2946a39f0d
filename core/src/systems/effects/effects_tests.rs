//! Tests for the effect system
//!
//! Walks the poison timeline end to end, checks expiration ordering
//! against the final periodic tick, and verifies stat-modifier summation.

use std::time::Duration;

use super::{apply_effect, remove_effect, EffectSpec};
use crate::test_support::{connected_player, test_engine, two_room_world};
use crate::world::{EffectType, Stat, World};

fn poisoned_engine() -> (crate::engine::WorldEngine, crate::engine::EngineHandle, String) {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    let (mut engine, handle) = test_engine(world);
    let effect_id = apply_effect(
        &mut engine,
        &"p1".to_string(),
        EffectSpec::new("Poisoned", EffectType::Dot)
            .duration(15.0)
            .periodic(5, 3.0),
    )
    .expect("player exists");
    (engine, handle, effect_id)
}

fn player_health(engine: &crate::engine::WorldEngine) -> i32 {
    engine.world.players["p1"].base.current_health
}

#[tokio::test(start_paused = true)]
async fn dot_ticks_then_expires_without_a_final_tick() {
    let (mut engine, _handle, effect_id) = poisoned_engine();
    let mut rx = engine.connect_player(&"p1".to_string());
    crate::test_support::drain_events(&mut rx);

    assert_eq!(player_health(&engine), 100);

    // Ticks at t = 3, 6, 9, 12
    for expected in [95, 90, 85, 80] {
        tokio::time::advance(Duration::from_secs(3)).await;
        engine.fire_due();
        assert_eq!(player_health(&engine), expected);
    }

    let texts = crate::test_support::drain_texts(&mut rx);
    assert_eq!(
        texts.iter().filter(|t| t.contains("poison")).count(),
        4,
        "one damage message per tick"
    );

    // t = 15: the expiration (scheduled at apply time) outranks the
    // periodic tick requeued at t = 12, so no fifth tick lands.
    tokio::time::advance(Duration::from_secs(3)).await;
    engine.fire_due();
    assert_eq!(player_health(&engine), 80);
    assert!(
        !engine.world.players["p1"].base.active_effects.contains_key(&effect_id),
        "effect removed at expiry"
    );

    let texts = crate::test_support::drain_texts(&mut rx);
    assert!(texts.iter().any(|t| t.contains("run its course")));

    // Nothing further fires.
    tokio::time::advance(Duration::from_secs(10)).await;
    engine.fire_due();
    assert_eq!(player_health(&engine), 80);

    engine.world.check_invariants().unwrap();
}

#[tokio::test(start_paused = true)]
async fn dot_cannot_kill() {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    let (mut engine, _handle) = test_engine(world);
    engine.world.players.get_mut("p1").unwrap().base.current_health = 6;

    apply_effect(
        &mut engine,
        &"p1".to_string(),
        EffectSpec::new("Venom", EffectType::Dot)
            .duration(30.0)
            .periodic(5, 3.0),
    );

    for _ in 0..4 {
        tokio::time::advance(Duration::from_secs(3)).await;
        engine.fire_due();
    }
    // Clamped at the floor of 1; periodic damage never kills.
    assert_eq!(player_health(&engine), 1);
}

#[tokio::test(start_paused = true)]
async fn heal_over_time_respects_max_health() {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    let (mut engine, _handle) = test_engine(world);
    engine.world.players.get_mut("p1").unwrap().base.current_health = 92;

    // Negative magnitude heals.
    apply_effect(
        &mut engine,
        &"p1".to_string(),
        EffectSpec::new("Regeneration", EffectType::Hot)
            .duration(30.0)
            .periodic(-5, 3.0),
    );

    tokio::time::advance(Duration::from_secs(3)).await;
    engine.fire_due();
    assert_eq!(player_health(&engine), 97);

    tokio::time::advance(Duration::from_secs(3)).await;
    engine.fire_due();
    assert_eq!(player_health(&engine), 100, "healing caps at max health");
}

#[tokio::test(start_paused = true)]
async fn stat_modifiers_sum_and_lapse() {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    let (mut engine, _handle) = test_engine(world);

    apply_effect(
        &mut engine,
        &"p1".to_string(),
        EffectSpec::new("Blessed", EffectType::Buff)
            .duration(30.0)
            .modifier(Stat::ArmorClass, 5),
    );
    apply_effect(
        &mut engine,
        &"p1".to_string(),
        EffectSpec::new("Shielded", EffectType::Buff)
            .duration(10.0)
            .modifier(Stat::ArmorClass, 3),
    );

    let player = &engine.world.players["p1"];
    assert_eq!(player.base.effective_armor_class(), 18);
    assert_eq!(player.base.armor_class, 10, "base stat never mutated");

    // The shorter buff lapses first.
    tokio::time::advance(Duration::from_secs(10)).await;
    engine.fire_due();
    assert_eq!(engine.world.players["p1"].base.effective_armor_class(), 15);

    tokio::time::advance(Duration::from_secs(20)).await;
    engine.fire_due();
    assert_eq!(engine.world.players["p1"].base.effective_armor_class(), 10);
}

#[tokio::test(start_paused = true)]
async fn remove_effect_cancels_scheduled_events() {
    let (mut engine, _handle, effect_id) = poisoned_engine();

    let removed = remove_effect(&mut engine, &"p1".to_string(), &effect_id).expect("effect live");
    assert_eq!(removed.name, "Poisoned");

    // Neither the tick nor the expiry ever fires.
    tokio::time::advance(Duration::from_secs(20)).await;
    engine.fire_due();
    assert_eq!(player_health(&engine), 100);
}

#[test]
fn effect_summary_lists_active_effects() {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    let mut mods = hashbrown::HashMap::new();
    mods.insert(Stat::ArmorClass, 5);
    world
        .players
        .get_mut("p1")
        .unwrap()
        .base
        .apply_effect(crate::world::Effect {
            effect_id: "fx1".into(),
            name: "Blessed".into(),
            effect_type: EffectType::Buff,
            stat_modifiers: mods,
            duration_secs: 30.0,
            applied_at: chrono::Utc::now(),
            interval_secs: 0.0,
            magnitude: 0,
            expiration_event_id: None,
            periodic_event_id: None,
        });

    let summary = super::effect_summary(&world, &"p1".to_string());
    assert!(summary.contains("Blessed"));
    assert!(summary.contains("armor_class +5"));

    let empty = super::effect_summary(&World::new(), &"ghost".to_string());
    assert!(empty.contains("no active effects"));
}
