//! Event dispatcher
//!
//! Constructs typed game events and routes them to per-connection outbound
//! queues. Scoping (`player` / `room` / `all` with exclusions) is an
//! engine-internal concern: the wire shape a client sees is the event body
//! with `player_id` stamped, scope and exclusions stripped.

use hashbrown::{HashMap, HashSet};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use emberwake_types::{PlayerId, RoomId};

use crate::world::{Player, World};

// ─────────────────────────────────────────────────────────────────────────────
// Event Shapes
// ─────────────────────────────────────────────────────────────────────────────

/// Full character sheet payload for `stat_update` events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatSheet {
    pub health: i32,
    pub max_health: i32,
    pub energy: i32,
    pub max_energy: i32,
    pub armor_class: i32,
    pub level: u32,
    pub experience: u64,
}

impl StatSheet {
    pub fn for_player(player: &Player) -> Self {
        Self {
            health: player.base.current_health,
            max_health: player.base.max_health,
            energy: player.current_energy,
            max_energy: player.max_energy,
            armor_class: player.base.effective_armor_class(),
            level: player.level,
            experience: player.experience,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RespawnPayload {
    pub seconds_remaining: u32,
    pub respawn_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbilityOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_dealt: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets_hit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceState {
    pub current: i32,
    pub max: i32,
    pub percent: f32,
}

/// The typed body of an outbound event. Serializes with a `type` tag into
/// the wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventBody {
    Message {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    StatUpdate {
        payload: StatSheet,
    },
    RespawnCountdown {
        payload: RespawnPayload,
    },
    /// Signals the client to return to character selection.
    Quit {
        text: String,
    },
    AbilityCast {
        caster_id: PlayerId,
        ability_id: String,
        ability_name: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        target_ids: Vec<PlayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    AbilityError {
        ability_id: String,
        ability_name: String,
        error: String,
    },
    AbilityCastComplete {
        ability_id: String,
        ability_name: String,
        payload: AbilityOutcome,
    },
    CooldownUpdate {
        ability_id: String,
        cooldown_remaining: f32,
    },
    ResourceUpdate {
        payload: HashMap<String, ResourceState>,
    },
    AbilityLearned {
        ability_id: String,
        ability_name: String,
    },
}

/// Routing scope, stripped before the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum EventScope {
    Player(PlayerId),
    Room {
        room_id: RoomId,
        exclude: HashSet<PlayerId>,
    },
    All {
        exclude: HashSet<PlayerId>,
    },
}

/// An event produced by game logic, before routing.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEvent {
    pub scope: EventScope,
    pub body: EventBody,
}

impl GameEvent {
    /// Per-player message event.
    pub fn to_player(player_id: impl Into<PlayerId>, text: impl Into<String>) -> Self {
        Self {
            scope: EventScope::Player(player_id.into()),
            body: EventBody::Message {
                text: text.into(),
                payload: None,
            },
        }
    }

    /// Room-broadcast message event.
    pub fn to_room(room_id: impl Into<RoomId>, text: impl Into<String>) -> Self {
        Self {
            scope: EventScope::Room {
                room_id: room_id.into(),
                exclude: HashSet::new(),
            },
            body: EventBody::Message {
                text: text.into(),
                payload: None,
            },
        }
    }

    /// Room-broadcast message excluding the given players.
    pub fn to_room_excluding<I>(
        room_id: impl Into<RoomId>,
        text: impl Into<String>,
        exclude: I,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PlayerId>,
    {
        Self {
            scope: EventScope::Room {
                room_id: room_id.into(),
                exclude: exclude.into_iter().map(Into::into).collect(),
            },
            body: EventBody::Message {
                text: text.into(),
                payload: None,
            },
        }
    }

    /// Message to every connected listener.
    pub fn broadcast(text: impl Into<String>) -> Self {
        Self {
            scope: EventScope::All {
                exclude: HashSet::new(),
            },
            body: EventBody::Message {
                text: text.into(),
                payload: None,
            },
        }
    }

    /// Arbitrary body scoped to one player.
    pub fn player_event(player_id: impl Into<PlayerId>, body: EventBody) -> Self {
        Self {
            scope: EventScope::Player(player_id.into()),
            body,
        }
    }

    /// Full-sheet stat update for a player.
    pub fn stat_update(player: &Player) -> Self {
        Self::player_event(
            player.base.id.clone(),
            EventBody::StatUpdate {
                payload: StatSheet::for_player(player),
            },
        )
    }
}

/// The envelope a connection actually receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireEvent {
    pub player_id: PlayerId,
    #[serde(flatten)]
    pub body: EventBody,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Routes game events onto per-player unbounded outbound queues.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    listeners: HashMap<PlayerId, UnboundedSender<WireEvent>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player's outbound queue at login. The connection layer
    /// drains the returned receiver.
    pub fn register(&mut self, player_id: &str) -> UnboundedReceiver<WireEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.insert(player_id.to_string(), tx);
        rx
    }

    pub fn unregister(&mut self, player_id: &str) {
        self.listeners.remove(player_id);
    }

    pub fn has_listener(&self, player_id: &str) -> bool {
        self.listeners.contains_key(player_id)
    }

    /// Route events per scope. Events to players without listeners are
    /// dropped; a closed queue unregisters its listener with a log line.
    pub fn dispatch(&mut self, world: &World, events: Vec<GameEvent>) {
        let mut dead: Vec<PlayerId> = Vec::new();
        for event in events {
            match event.scope {
                EventScope::Player(player_id) => {
                    self.send_to(&player_id, event.body, &mut dead);
                }
                EventScope::Room { room_id, exclude } => {
                    for player_id in world.player_ids_in_room(&room_id) {
                        if exclude.contains(&player_id) {
                            continue;
                        }
                        self.send_to(&player_id, event.body.clone(), &mut dead);
                    }
                }
                EventScope::All { exclude } => {
                    let targets: Vec<PlayerId> = self
                        .listeners
                        .keys()
                        .filter(|id| !exclude.contains(*id))
                        .cloned()
                        .collect();
                    for player_id in targets {
                        self.send_to(&player_id, event.body.clone(), &mut dead);
                    }
                }
            }
        }
        for player_id in dead {
            tracing::debug!(player = %player_id, "dropping closed listener queue");
            self.listeners.remove(&player_id);
        }
    }

    fn send_to(&self, player_id: &str, body: EventBody, dead: &mut Vec<PlayerId>) {
        let Some(sender) = self.listeners.get(player_id) else {
            return;
        };
        let wire = WireEvent {
            player_id: player_id.to_string(),
            body,
        };
        if sender.send(wire).is_err() {
            dead.push(player_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Room;

    fn world_with_players(ids: &[&str], room: &str) -> World {
        let mut world = World::new();
        world.rooms.insert(room.to_string(), Room::new(room.to_string(), "Room", "A room."));
        for id in ids {
            world.insert_player(Player::new(id.to_string(), *id, room.to_string()));
        }
        world
    }

    #[test]
    fn player_scope_routes_to_one_queue() {
        let world = world_with_players(&["a", "b"], "r");
        let mut dispatcher = EventDispatcher::new();
        let mut rx_a = dispatcher.register("a");
        let mut rx_b = dispatcher.register("b");

        dispatcher.dispatch(&world, vec![GameEvent::to_player("a", "hello")]);

        let got = rx_a.try_recv().unwrap();
        assert_eq!(got.player_id, "a");
        assert!(matches!(got.body, EventBody::Message { ref text, .. } if text == "hello"));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn room_scope_respects_exclusions_and_stamps_ids() {
        let world = world_with_players(&["a", "b", "c"], "r");
        let mut dispatcher = EventDispatcher::new();
        let mut rx_a = dispatcher.register("a");
        let mut rx_b = dispatcher.register("b");
        let mut rx_c = dispatcher.register("c");

        dispatcher.dispatch(
            &world,
            vec![GameEvent::to_room_excluding("r", "boom", ["a"])],
        );

        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap().player_id, "b");
        assert_eq!(rx_c.try_recv().unwrap().player_id, "c");
    }

    #[test]
    fn missing_listener_drops_event() {
        let world = world_with_players(&["a"], "r");
        let mut dispatcher = EventDispatcher::new();
        // No registration for "a"
        dispatcher.dispatch(&world, vec![GameEvent::to_player("a", "lost")]);
        assert!(!dispatcher.has_listener("a"));
    }

    #[test]
    fn wire_shape_has_type_tag_and_no_scope() {
        let event = WireEvent {
            player_id: "a".to_string(),
            body: EventBody::Message {
                text: "hi".to_string(),
                payload: None,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["player_id"], "a");
        assert_eq!(json["text"], "hi");
        assert!(json.get("scope").is_none());
        assert!(json.get("exclude").is_none());
    }

    #[test]
    fn respawn_countdown_payload_shape() {
        let event = WireEvent {
            player_id: "a".to_string(),
            body: EventBody::RespawnCountdown {
                payload: RespawnPayload {
                    seconds_remaining: 7,
                    respawn_location: "Verdant Fields".to_string(),
                },
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "respawn_countdown");
        assert_eq!(json["payload"]["seconds_remaining"], 7);
    }
}
