//! Tests for quests and dialogue

use hashbrown::HashMap;

use super::*;
use crate::systems::dispatcher::EventBody;
use crate::test_support::{connected_player, goblin_template, test_engine, two_room_world};
use crate::world::templates::{
    DialogueNode, DialogueOption, DialogueTree, QuestObjective, QuestTemplate,
};

fn ear_quest() -> QuestTemplate {
    QuestTemplate {
        id: "cull_the_caves".into(),
        name: "Cull the Caves".into(),
        description: "Thin out the goblins plaguing the crossroads.".into(),
        objectives: vec![QuestObjective::Kill {
            template_id: "goblin".into(),
            count: 2,
        }],
        xp_reward: 50,
    }
}

fn greeter_dialogue() -> DialogueTree {
    let mut nodes = HashMap::new();
    nodes.insert(
        "hello".to_string(),
        DialogueNode {
            text: "The roads are crawling with goblins. Will you help?".into(),
            options: vec![
                DialogueOption {
                    text: "I'll handle it.".into(),
                    next: None,
                    offer_quest: Some("cull_the_caves".into()),
                },
                DialogueOption {
                    text: "Not my problem.".into(),
                    next: None,
                    offer_quest: None,
                },
            ],
        },
    );
    DialogueTree {
        start: "hello".into(),
        nodes,
    }
}

fn quest_arena() -> (crate::engine::WorldEngine, String) {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    world.insert_quest_template(ear_quest());

    let mut warden = goblin_template();
    warden.id = "warden".into();
    warden.name = "road warden".into();
    warden.keywords = vec!["warden".into()];
    warden.npc_type = crate::world::templates::NpcType::Friendly;
    warden.max_health = 50;
    warden.dialogue = Some(greeter_dialogue());
    world.insert_npc_template(warden);
    world.spawn_npc("warden", "start");

    let (engine, _handle) = test_engine(world);
    let warden_id = engine.world.npcs.keys().next().cloned().unwrap();
    (engine, warden_id)
}

#[tokio::test(start_paused = true)]
async fn dialogue_offers_and_accepts_a_quest() {
    let (mut engine, _warden) = quest_arena();

    let events = talk_command(&mut engine, &"p1".to_string(), "warden");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("Will you help?") && text.contains("1. I'll handle it.")
    )));
    assert!(engine.world.players["p1"].active_dialogue.is_some());

    // Raw input routes to the dialogue while it is active.
    let events = engine.handle_command(&"p1".to_string(), "1");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("Quest accepted")
    )));
    assert!(
        engine.world.players["p1"].active_dialogue.is_none(),
        "option with no next node ends the conversation"
    );
    assert!(engine.world.players["p1"].quest_progress.contains_key("cull_the_caves"));
}

#[tokio::test(start_paused = true)]
async fn nonsense_dialogue_input_gets_a_hint() {
    let (mut engine, _warden) = quest_arena();
    talk_command(&mut engine, &"p1".to_string(), "warden");

    let events = engine.handle_command(&"p1".to_string(), "attack warden");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("Enter a number")
    )));
    // Still talking.
    assert!(engine.world.players["p1"].active_dialogue.is_some());

    let events = engine.handle_command(&"p1".to_string(), "bye");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("end the conversation")
    )));
    assert!(engine.world.players["p1"].active_dialogue.is_none());
}

#[tokio::test(start_paused = true)]
async fn kill_objectives_complete_and_reward() {
    let (mut engine, _warden) = quest_arena();
    accept_quest(&mut engine, &"p1".to_string(), "cull_the_caves");

    let events = on_npc_killed(&mut engine, &"p1".to_string(), "goblin");
    assert!(events.is_empty(), "one of two kills is quiet");
    {
        let progress = &engine.world.players["p1"].quest_progress["cull_the_caves"];
        assert_eq!(progress.objective_progress, vec![1]);
    }

    let events = on_npc_killed(&mut engine, &"p1".to_string(), "goblin");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("Quest Complete")
    )));
    let player = &engine.world.players["p1"];
    assert!(player.completed_quests.contains("cull_the_caves"));
    assert!(!player.quest_progress.contains_key("cull_the_caves"));
    assert_eq!(player.experience, 50);
}

#[tokio::test(start_paused = true)]
async fn visit_objectives_advance_on_movement() {
    let mut world = two_room_world();
    connected_player(&mut world, "p1", "Marn", "start");
    world.insert_quest_template(QuestTemplate {
        id: "see_the_hall".into(),
        name: "See the Hall".into(),
        description: "Lay eyes on the Great Hall.".into(),
        objectives: vec![QuestObjective::Visit {
            room_id: "hall".into(),
        }],
        xp_reward: 10,
    });
    let (mut engine, _handle) = test_engine(world);
    accept_quest(&mut engine, &"p1".to_string(), "see_the_hall");

    let events = engine.move_player(&"p1".to_string(), emberwake_types::Direction::North);
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("Quest Complete")
    )));
    assert_eq!(engine.world.players["p1"].experience, 10);
}

#[tokio::test(start_paused = true)]
async fn journal_and_abandon() {
    let (mut engine, _warden) = quest_arena();
    accept_quest(&mut engine, &"p1".to_string(), "cull_the_caves");

    let events = journal_command(&engine.world, &"p1".to_string());
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. }
            if text.contains("Cull the Caves") && text.contains("(0/2)")
    )));

    let events = abandon_command(&mut engine, &"p1".to_string(), "cull");
    assert!(events.iter().any(|e| matches!(
        &e.body,
        EventBody::Message { text, .. } if text.contains("You abandon the quest")
    )));
    assert!(engine.world.players["p1"].quest_progress.is_empty());
}
