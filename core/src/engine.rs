//! The world engine
//!
//! One `WorldEngine` value owns the entire world graph and every system
//! riding on it. All mutation happens on one task: the `run` loop selects
//! between the inbound control channel (commands, connect/disconnect) and
//! the next time-event deadline, so command handlers, timer callbacks,
//! behavior hooks, and trigger actions never race. Connection I/O lives
//! elsewhere and talks to the loop through an `EngineHandle`.

use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use emberwake_types::{Direction, EntityId, PlayerId, RoomId};

use crate::behaviors;
use crate::config::EngineConfig;
use crate::inventory;
use crate::persistence::{self, DirtyTracker, PersistenceStore};
use crate::systems::combat;
use crate::systems::dice::{Dice, ThreadDice};
use crate::systems::dispatcher::{EventBody, EventDispatcher, GameEvent, WireEvent};
use crate::systems::effects;
use crate::systems::look;
use crate::systems::quests;
use crate::systems::router::{CommandResult, CommandRouter};
use crate::systems::time_manager::TimeEventManager;
use crate::systems::triggers::{self, TriggerContext, TriggerEventKind, TriggerOwner};
use crate::world::{time::WorldTime, World};

// ─────────────────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────────────────

/// Capabilities the admin command set checks. The predicate itself is
/// supplied by the host (the engine has no account model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ModifyStats,
    KickPlayer,
    Teleport,
    SpawnNpc,
    SpawnItem,
    ServerCommands,
}

pub type PermissionPredicate = Box<dyn Fn(&str, Permission) -> bool + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Control Channel
// ─────────────────────────────────────────────────────────────────────────────

/// Messages the engine loop consumes.
pub enum EngineMsg {
    /// A raw command line from a connection.
    Command(PlayerId, String),
    /// Register a connection; replies with the outbound queue.
    Connect(PlayerId, oneshot::Sender<mpsc::UnboundedReceiver<WireEvent>>),
    Disconnect(PlayerId),
    /// A background persistence write failed; re-mark the entities dirty.
    PersistFailed(Vec<EntityId>),
    Shutdown,
}

impl std::fmt::Debug for EngineMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineMsg::Command(pid, text) => write!(f, "Command({pid}, {text:?})"),
            EngineMsg::Connect(pid, _) => write!(f, "Connect({pid})"),
            EngineMsg::Disconnect(pid) => write!(f, "Disconnect({pid})"),
            EngineMsg::PersistFailed(ids) => write!(f, "PersistFailed({} ids)", ids.len()),
            EngineMsg::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Clonable handle the connection layer uses to talk to the engine loop.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMsg>,
}

impl EngineHandle {
    /// Enqueue a raw command line for a player.
    pub async fn submit_command(&self, player_id: &str, text: &str) {
        if self
            .tx
            .send(EngineMsg::Command(player_id.to_string(), text.to_string()))
            .await
            .is_err()
        {
            tracing::warn!(player = %player_id, "engine loop gone; command dropped");
        }
    }

    /// Register a connection; the returned receiver is the outbound queue.
    pub async fn connect(&self, player_id: &str) -> Option<mpsc::UnboundedReceiver<WireEvent>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineMsg::Connect(player_id.to_string(), reply_tx))
            .await
            .ok()?;
        reply_rx.await.ok()
    }

    pub async fn disconnect(&self, player_id: &str) {
        let _ = self
            .tx
            .send(EngineMsg::Disconnect(player_id.to_string()))
            .await;
    }

    /// Stop the loop after a final persistence flush.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(EngineMsg::Shutdown).await;
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<EngineMsg> {
        self.tx.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

pub struct WorldEngine {
    pub world: World,
    pub config: EngineConfig,
    pub timers: TimeEventManager,
    pub dispatcher: EventDispatcher,
    pub router: CommandRouter,
    pub dice: Box<dyn Dice>,
    pub dirty: DirtyTracker,
    pub store: Option<Arc<dyn PersistenceStore>>,
    permissions: PermissionPredicate,
    last_commands: HashMap<PlayerId, String>,
    rx: Option<mpsc::Receiver<EngineMsg>>,
    handle: EngineHandle,
}

impl WorldEngine {
    pub fn new(world: World, config: EngineConfig) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(config.command_queue_depth.max(1));
        let handle = EngineHandle { tx };
        let mut engine = Self {
            world,
            config,
            timers: TimeEventManager::new(),
            dispatcher: EventDispatcher::new(),
            router: CommandRouter::new(),
            dice: Box::new(ThreadDice),
            dirty: DirtyTracker::default(),
            store: None,
            permissions: Box::new(|_, _| false),
            last_commands: HashMap::new(),
            rx: Some(rx),
            handle: handle.clone(),
        };
        engine.register_commands();
        (engine, handle)
    }

    pub fn with_store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_permissions(mut self, predicate: PermissionPredicate) -> Self {
        self.permissions = predicate;
        self
    }

    pub fn with_dice(mut self, dice: Box<dyn Dice>) -> Self {
        self.dice = dice;
        self
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    fn has_permission(&self, player_id: &str, permission: Permission) -> bool {
        (self.permissions)(player_id, permission)
    }

    // ─── Main Loop ──────────────────────────────────────────────────────────

    /// Run the engine loop until shutdown. Consumes the engine; all further
    /// interaction goes through the handle.
    pub async fn run(mut self) {
        let Some(mut rx) = self.rx.take() else {
            tracing::error!("engine loop started twice");
            return;
        };
        self.startup();
        tracing::info!("engine loop running");

        loop {
            let deadline = self.timers.next_deadline();
            tokio::select! {
                biased;
                msg = rx.recv() => {
                    match msg {
                        Some(msg) => {
                            if !self.handle_msg(msg).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                () = sleep_until_deadline(deadline) => {
                    self.fire_due();
                }
            }
        }
        tracing::info!("engine loop stopped");
    }

    async fn handle_msg(&mut self, msg: EngineMsg) -> bool {
        match msg {
            EngineMsg::Command(player_id, text) => {
                tracing::debug!(player = %player_id, command = %text, "command received");
                let events = self.handle_command(&player_id, &text);
                self.dispatch_events(events);
            }
            EngineMsg::Connect(player_id, reply) => {
                let receiver = self.connect_player(&player_id);
                let _ = reply.send(receiver);
                // Rehydrate saved effects for a player coming back after a
                // restart (an in-memory stasis return still has them).
                let needs_rehydration = self
                    .world
                    .players
                    .get(&player_id)
                    .is_some_and(|p| p.base.active_effects.is_empty());
                if needs_rehydration && let Some(store) = self.store.clone() {
                    match store.load_player_effects(&player_id).await {
                        Ok(rows) if !rows.is_empty() => {
                            let events = persistence::rehydrate_effects(self, &player_id, rows);
                            self.dispatch_events(events);
                        }
                        Ok(_) => {}
                        Err(error) => {
                            tracing::warn!(player = %player_id, %error, "effect rehydration failed");
                        }
                    }
                }
            }
            EngineMsg::Disconnect(player_id) => {
                self.disconnect_player(&player_id);
            }
            EngineMsg::PersistFailed(ids) => {
                for id in &ids {
                    self.dirty.mark(id);
                }
                tracing::warn!(count = ids.len(), "persistence flush failed; entities stay dirty");
            }
            EngineMsg::Shutdown => {
                persistence::flush_on_shutdown(self).await;
                return false;
            }
        }
        true
    }

    /// Execute every due time event. Callbacks run one at a time with full
    /// engine access; a recurring event re-enqueues after its callback
    /// returns unless it cancelled itself. Events a callback schedules are
    /// held for the next pass.
    pub fn fire_due(&mut self) {
        let now = Instant::now();
        let cutoff = self.timers.current_seq();
        while let Some(mut event) = self.timers.pop_due(now, cutoff) {
            self.timers.begin_execution(&event.event_id);
            let events = (event.callback)(self);
            let cancelled = self.timers.end_execution();
            self.dispatch_events(events);
            if event.recurring && !cancelled {
                self.timers.requeue(event, Instant::now());
            }
        }
    }

    pub fn dispatch_events(&mut self, events: Vec<GameEvent>) {
        if events.is_empty() {
            return;
        }
        let WorldEngine { world, dispatcher, .. } = self;
        dispatcher.dispatch(world, events);
    }

    /// One-time startup scheduling: area clocks, NPC housekeeping and
    /// behaviors, trigger timers, periodic persistence.
    pub fn startup(&mut self) {
        self.schedule_world_time_tick();
        self.schedule_npc_housekeeping();
        self.init_npc_behaviors();
        triggers::initialize_all_timers(self);
        if self.store.is_some() {
            persistence::schedule_periodic_flush(self);
        }
    }

    // ─── Command Handling ───────────────────────────────────────────────────

    /// Parse one raw command line into events. This is the single entry
    /// point for player input: `!` repeat, `self` substitution, dialogue
    /// routing, registered handlers, then `on_command` triggers.
    pub fn handle_command(&mut self, player_id: &PlayerId, command: &str) -> Vec<GameEvent> {
        let mut raw = command.trim().to_string();
        if raw.is_empty() {
            return Vec::new();
        }

        // `!` repeats the last non-`!` command.
        if raw == "!" {
            match self.last_commands.get(player_id) {
                Some(last) => raw = last.clone(),
                None => {
                    return vec![GameEvent::to_player(
                        player_id.clone(),
                        "No previous command to repeat.",
                    )];
                }
            }
        } else {
            self.last_commands.insert(player_id.clone(), raw.clone());
        }

        // The literal token "self" becomes the player's own name.
        if let Some(player) = self.world.players.get(player_id) {
            raw = substitute_self(&raw, &player.base.name);
        }

        // Active dialogue captures raw input.
        if self
            .world
            .players
            .get(player_id)
            .is_some_and(|p| p.active_dialogue.is_some())
        {
            return quests::handle_dialogue_input(self, player_id, &raw);
        }

        let (token, args) = match raw.split_once(char::is_whitespace) {
            Some((token, rest)) => (token.to_lowercase(), rest.trim().to_string()),
            None => (raw.to_lowercase(), String::new()),
        };

        match self.router.lookup(&token) {
            Some(meta) => match (meta.handler)(self, player_id, &token, &args) {
                Ok(events) => events,
                Err(error) => {
                    tracing::error!(player = %player_id, command = %token, %error, "command handler failed");
                    vec![GameEvent::to_player(
                        player_id.clone(),
                        "Something went wrong executing that command.",
                    )]
                }
            },
            None => {
                // Unregistered tokens are offered to the room's triggers.
                let Some(room_id) = self
                    .world
                    .players
                    .get(player_id)
                    .map(|p| p.base.room_id.clone())
                else {
                    return vec![GameEvent::to_player(
                        player_id.clone(),
                        "You mutter something unintelligible. (Unknown command)",
                    )];
                };
                let ctx = TriggerContext::command(player_id, &room_id, &raw);
                let outcome = triggers::fire_event(
                    self,
                    &TriggerOwner::Room(room_id),
                    TriggerEventKind::OnCommand,
                    &ctx,
                );
                if outcome.fired > 0 {
                    outcome.events
                } else {
                    vec![GameEvent::to_player(
                        player_id.clone(),
                        "You mutter something unintelligible. (Unknown command)",
                    )]
                }
            }
        }
    }

    fn register_commands(&mut self) {
        // Movement: every direction and its one-letter alias.
        for direction in Direction::ALL {
            self.router.register(
                direction.as_str(),
                &[direction.as_str(), direction.short()],
                cmd_move,
                "movement",
                &format!("Move {direction}"),
                "",
            );
        }
        self.router.register(
            "look",
            &["look", "l"],
            cmd_look,
            "view",
            "Examine your surroundings or a specific target",
            "[target_name]",
        );
        self.router.register(
            "time",
            &["time"],
            cmd_time,
            "view",
            "Check the local time of day",
            "",
        );
        self.router.register(
            "stats",
            &["stats", "sheet", "status"],
            cmd_stats,
            "character",
            "View your character sheet",
            "",
        );
        self.router.register(
            "effects",
            &["effects"],
            cmd_effects,
            "character",
            "Show your active effects",
            "",
        );
        self.router.register(
            "say",
            &["say"],
            cmd_say,
            "social",
            "Speak to others in the room",
            "<message>",
        );
        self.router.register(
            "emote",
            &[
                "smile", "nod", "laugh", "cringe", "smirk", "frown", "wink", "lookaround",
            ],
            cmd_emote,
            "social",
            "Show an emote",
            "",
        );
        self.router.register(
            "talk",
            &["talk", "speak"],
            cmd_talk,
            "social",
            "Talk to an NPC",
            "<npc_name>",
        );
        self.router.register(
            "inventory",
            &["inventory", "inv", "i"],
            cmd_inventory,
            "inventory",
            "View your inventory",
            "",
        );
        self.router.register(
            "get",
            &["get", "take", "pickup"],
            cmd_get,
            "inventory",
            "Pick up an item",
            "<item_name> [from <container>]",
        );
        self.router.register(
            "drop",
            &["drop"],
            cmd_drop,
            "inventory",
            "Drop an item",
            "<item_name>",
        );
        self.router.register(
            "equip",
            &["equip", "wear", "wield"],
            cmd_equip,
            "inventory",
            "Equip an item",
            "<item_name>",
        );
        self.router.register(
            "unequip",
            &["unequip", "remove"],
            cmd_unequip,
            "inventory",
            "Unequip an item",
            "<item_name>",
        );
        self.router.register(
            "use",
            &["use", "consume", "drink"],
            cmd_use,
            "inventory",
            "Use a consumable item",
            "<item_name>",
        );
        self.router.register(
            "give",
            &["give"],
            cmd_give,
            "inventory",
            "Give an item to someone here",
            "<item_name> to <target>",
        );
        self.router.register(
            "attack",
            &["attack", "kill", "fight", "hit"],
            cmd_attack,
            "combat",
            "Attack a target",
            "<target_name>",
        );
        self.router.register(
            "stop",
            &["stop", "disengage"],
            cmd_stop,
            "combat",
            "Stop attacking",
            "",
        );
        self.router.register(
            "flee",
            &["flee"],
            cmd_flee,
            "combat",
            "Attempt to flee from combat",
            "",
        );
        self.router.register(
            "combat",
            &["combat", "cs"],
            cmd_combat_status,
            "combat",
            "Show combat status",
            "",
        );
        self.router.register(
            "journal",
            &["journal", "quests", "j"],
            cmd_journal,
            "quest",
            "View your quest journal",
            "",
        );
        self.router.register(
            "quest",
            &["quest"],
            cmd_quest,
            "quest",
            "View details of a specific quest",
            "<quest_name>",
        );
        self.router.register(
            "abandon",
            &["abandon"],
            cmd_abandon,
            "quest",
            "Abandon a quest",
            "<quest_name>",
        );
        self.router.register(
            "help",
            &["help"],
            cmd_help,
            "system",
            "List available commands",
            "[category]",
        );
        self.router.register(
            "quit",
            &["quit", "logout", "exit"],
            cmd_quit,
            "system",
            "Disconnect and return to character selection",
            "",
        );

        // Admin surface, gated by the host's permission predicate.
        self.router.register(
            "heal",
            &["heal"],
            cmd_heal,
            "admin",
            "[Admin] Heal a target",
            "<target_name>",
        );
        self.router.register(
            "hurt",
            &["hurt"],
            cmd_hurt,
            "admin",
            "[Admin] Hurt a target",
            "<target_name>",
        );
        self.router.register(
            "who",
            &["who", "online"],
            cmd_who,
            "admin",
            "[Mod] List online players",
            "",
        );
        self.router.register(
            "where",
            &["where", "locate"],
            cmd_where,
            "admin",
            "[Mod] Find a player's location",
            "<player_name>",
        );
        self.router.register(
            "goto",
            &["goto", "tp"],
            cmd_goto,
            "admin",
            "[GM] Teleport to a room or player",
            "<room_id|player_name>",
        );
        self.router.register(
            "summon",
            &["summon"],
            cmd_summon,
            "admin",
            "[GM] Summon a player to your location",
            "<player_name>",
        );
        self.router.register(
            "spawn",
            &["spawn"],
            cmd_spawn,
            "admin",
            "[GM] Spawn an NPC or item",
            "npc|item <template_id>",
        );
        self.router.register(
            "despawn",
            &["despawn"],
            cmd_despawn,
            "admin",
            "[GM] Despawn an NPC",
            "<npc_name>",
        );
        self.router.register(
            "inspect",
            &["inspect", "examine"],
            cmd_inspect,
            "admin",
            "[GM] Get detailed info on a target",
            "<target_name>",
        );
        self.router.register(
            "broadcast",
            &["broadcast", "announce"],
            cmd_broadcast,
            "admin",
            "[Admin] Broadcast a message to all players",
            "<message>",
        );
    }

    // ─── Movement ───────────────────────────────────────────────────────────

    /// Move a player through an exit, firing room and area triggers,
    /// rendering the destination, and waking the NPCs there.
    pub fn move_player(&mut self, player_id: &PlayerId, direction: Direction) -> Vec<GameEvent> {
        let mut events = Vec::new();

        let Some(player) = self.world.players.get(player_id) else {
            return vec![GameEvent::to_player(
                player_id.clone(),
                "You feel incorporeal. (Player not found)",
            )];
        };
        let old_room_id = player.base.room_id.clone();
        let player_name = player.base.name.clone();
        let on_move_effect = player.on_move_effect.clone();
        if player.base.combat.is_in_combat() {
            return vec![GameEvent::to_player(
                player_id.clone(),
                "You are engaged in combat and cannot leave. Try 'flee' to escape.",
            )];
        }

        let Some(old_room) = self.world.rooms.get(&old_room_id) else {
            return vec![GameEvent::to_player(
                player_id.clone(),
                "You are lost in the void. (Room not found)",
            )];
        };
        let Some(new_room_id) = old_room.effective_exits().get(&direction).cloned() else {
            return vec![GameEvent::to_player(player_id.clone(), "You can't go that way.")];
        };
        let old_area_id = old_room.area_id.clone();
        let on_exit_effect = old_room.on_exit_effect.clone();
        let Some(new_room) = self.world.rooms.get(&new_room_id) else {
            return vec![GameEvent::to_player(
                player_id.clone(),
                "The way blurs and collapses. (Destination room missing)",
            )];
        };
        let new_area_id = new_room.area_id.clone();
        let on_enter_effect = new_room.on_enter_effect.clone();

        // Exit triggers fire before the player leaves.
        let exit_ctx =
            TriggerContext::movement(player_id, &old_room_id, TriggerEventKind::OnExit, direction);
        events.extend(
            triggers::fire_event(
                self,
                &TriggerOwner::Room(old_room_id.clone()),
                TriggerEventKind::OnExit,
                &exit_ctx,
            )
            .events,
        );

        // Area boundary crossings.
        if old_area_id != new_area_id {
            if let Some(area_id) = &old_area_id {
                let ctx = TriggerContext::movement(
                    player_id,
                    &old_room_id,
                    TriggerEventKind::OnAreaExit,
                    direction,
                );
                events.extend(
                    triggers::fire_event(
                        self,
                        &TriggerOwner::Area(area_id.clone()),
                        TriggerEventKind::OnAreaExit,
                        &ctx,
                    )
                    .events,
                );
            }
            if let Some(area_id) = &new_area_id {
                let ctx = TriggerContext::movement(
                    player_id,
                    &new_room_id,
                    TriggerEventKind::OnAreaEnter,
                    direction,
                );
                events.extend(
                    triggers::fire_event(
                        self,
                        &TriggerOwner::Area(area_id.clone()),
                        TriggerEventKind::OnAreaEnter,
                        &ctx,
                    )
                    .events,
                );
            }
        }

        // Occupancy swap.
        if let Some(room) = self.world.rooms.get_mut(&old_room_id) {
            room.entities.remove(player_id.as_str());
        }
        if let Some(room) = self.world.rooms.get_mut(&new_room_id) {
            room.entities.insert(player_id.clone());
        }
        if let Some(player) = self.world.players.get_mut(player_id) {
            player.base.room_id = new_room_id.clone();
        }
        self.dirty.mark(player_id);

        // Build the traveller's view.
        let mut lines = vec![format!("You move {direction}.")];
        if let Some(effect) = on_exit_effect {
            lines.push(effect);
        }
        if let Some(effect) = on_move_effect {
            lines.push(effect);
        }
        lines.push(String::new());
        if let Some(new_room) = self.world.rooms.get(&new_room_id) {
            lines.extend(look::room_body(&self.world, new_room, player_id));
        }
        if let Some(effect) = on_enter_effect {
            lines.push(String::new());
            lines.push(effect);
        }
        events.push(GameEvent::to_player(player_id.clone(), lines.join("\n")));

        // Departure and arrival broadcasts.
        events.push(GameEvent::to_room_excluding(
            old_room_id,
            format!("{player_name} leaves."),
            [player_id.clone()],
        ));
        events.push(GameEvent::to_room_excluding(
            new_room_id.clone(),
            format!("{player_name} arrives {}.", direction.arrival_phrase()),
            [player_id.clone()],
        ));

        // NPCs notice the newcomer.
        events.extend(behaviors::player_entered_room(self, &new_room_id, player_id));

        // Enter triggers fire after arrival.
        let enter_ctx =
            TriggerContext::movement(player_id, &new_room_id, TriggerEventKind::OnEnter, direction);
        events.extend(
            triggers::fire_event(
                self,
                &TriggerOwner::Room(new_room_id.clone()),
                TriggerEventKind::OnEnter,
                &enter_ctx,
            )
            .events,
        );

        // Quest visit objectives.
        events.extend(quests::on_room_entered(self, player_id, &new_room_id));

        events
    }

    // ─── Connection Lifecycle ───────────────────────────────────────────────

    /// Register a connection for a player. Returns the outbound queue; the
    /// caller drains it. Reconnection wakes the player out of stasis.
    pub fn connect_player(&mut self, player_id: &PlayerId) -> mpsc::UnboundedReceiver<WireEvent> {
        let receiver = self.dispatcher.register(player_id);

        if self.world.players.contains_key(player_id) {
            let was_in_stasis = self
                .world
                .players
                .get(player_id)
                .is_some_and(|p| !p.is_connected);
            if let Some(player) = self.world.players.get_mut(player_id) {
                player.is_connected = true;
            }

            let mut events = Vec::new();
            if let Some(player) = self.world.players.get(player_id) {
                events.push(GameEvent::stat_update(player));
            }
            events.extend(look::look_at_room(&self.world, player_id));

            if was_in_stasis {
                let room_id = self
                    .world
                    .players
                    .get(player_id)
                    .map(|p| p.base.room_id.clone());
                let name = self
                    .world
                    .players
                    .get(player_id)
                    .map(|p| p.base.name.clone())
                    .unwrap_or_default();
                events.push(GameEvent::to_player(
                    player_id.clone(),
                    "The prismatic stasis shatters around you like glass. \
                     You gasp as awareness floods back into your form.",
                ));
                if let Some(room_id) = room_id {
                    events.push(GameEvent::to_room_excluding(
                        room_id,
                        format!(
                            "The prismatic light around {name} shatters like glass. \
                             They gasp and return to awareness, freed from stasis."
                        ),
                        [player_id.clone()],
                    ));
                }
            }
            self.dispatch_events(events);
            tracing::info!(player = %player_id, "player connected");
        } else {
            tracing::warn!(player = %player_id, "connection for unknown player");
        }
        receiver
    }

    /// Tear down a connection: persist, cancel any pending respawn, put
    /// the player in stasis, and drop the listener.
    pub fn disconnect_player(&mut self, player_id: &PlayerId) {
        self.cancel_player_respawn(player_id);
        self.dirty.mark(player_id);
        if self.store.is_some() {
            persistence::flush(self);
        }

        if let Some(player) = self.world.players.get_mut(player_id) {
            player.is_connected = false;
            let room_id = player.base.room_id.clone();
            let name = player.base.name.clone();
            let stasis = GameEvent::to_room_excluding(
                room_id,
                format!(
                    "A bright flash of light engulfs {name}. Their form flickers \
                     and freezes, suddenly suspended in a prismatic stasis."
                ),
                [player_id.clone()],
            );
            self.dispatch_events(vec![stasis]);
        }
        self.dispatcher.unregister(player_id);
        tracing::info!(player = %player_id, "player disconnected");
    }

    // ─── Player Respawn ─────────────────────────────────────────────────────

    /// Schedule the countdown and respawn after a player death. The target
    /// room is a uniform pick among the area's entry points, falling back
    /// to the death room.
    pub fn schedule_player_respawn(&mut self, player_id: &str) {
        let countdown = self.config.respawn_countdown_secs.max(1);

        let Some(player) = self.world.players.get(player_id) else {
            return;
        };
        let current_room = player.base.room_id.clone();

        let area = self.world.room_area(&current_room);
        let area_name = area.map(|a| a.name.clone()).unwrap_or_else(|| "Unknown".to_string());
        let entry_points: Vec<RoomId> = area
            .map(|a| {
                let mut rooms: Vec<RoomId> = a.entry_points.iter().cloned().collect();
                rooms.sort();
                rooms
            })
            .unwrap_or_default();
        let respawn_room_id = if entry_points.is_empty() {
            current_room
        } else {
            entry_points[self.dice.pick_index(entry_points.len())].clone()
        };

        if let Some(player) = self.world.players.get_mut(player_id) {
            player.death_time = Some(chrono::Utc::now());
        }

        for seconds_remaining in (1..=countdown).rev() {
            let delay = countdown - seconds_remaining;
            let event_id = format!("respawn_countdown_{player_id}_{seconds_remaining}");
            let target = player_id.to_string();
            let location = area_name.clone();
            self.timers.schedule_once(
                Duration::from_secs(delay as u64),
                Some(&event_id),
                Box::new(move |_engine| {
                    let text = match seconds_remaining {
                        10.. => format!(
                            "💀 Your flesh failed you, but your spirit is not yet defeated... ({seconds_remaining}s)"
                        ),
                        7..=9 => format!("Darkness surrounds you... ({seconds_remaining}s)"),
                        4..=6 => format!("A distant light calls to you... ({seconds_remaining}s)"),
                        2..=3 => format!("You feel yourself being pulled back... ({seconds_remaining}s)"),
                        _ => format!("Reality snaps back into focus... ({seconds_remaining}s)"),
                    };
                    vec![
                        GameEvent::to_player(target.clone(), text),
                        GameEvent::player_event(
                            target.clone(),
                            EventBody::RespawnCountdown {
                                payload: crate::systems::dispatcher::RespawnPayload {
                                    seconds_remaining,
                                    respawn_location: location.clone(),
                                },
                            },
                        ),
                    ]
                }),
            );
        }

        let respawn_event_id = format!("respawn_{player_id}");
        if let Some(player) = self.world.players.get_mut(player_id) {
            player.respawn_event_id = Some(respawn_event_id.clone());
        }
        let target = player_id.to_string();
        let destination = respawn_room_id.clone();
        self.timers.schedule_once(
            Duration::from_secs(countdown as u64),
            Some(&respawn_event_id),
            Box::new(move |engine| execute_player_respawn(engine, &target, &destination)),
        );
        tracing::info!(player = %player_id, room = %respawn_room_id, countdown, "respawn scheduled");
    }

    /// Cancel a pending respawn and its countdown events (disconnects).
    pub fn cancel_player_respawn(&mut self, player_id: &str) {
        let pending = self
            .world
            .players
            .get_mut(player_id)
            .and_then(|p| p.respawn_event_id.take());
        if let Some(event_id) = pending {
            self.timers.cancel(&event_id);
        }
        let countdown = self.config.respawn_countdown_secs.max(1);
        for i in 1..=countdown {
            self.timers
                .cancel(&format!("respawn_countdown_{player_id}_{i}"));
        }
    }

    // ─── World Clock & NPC Housekeeping ─────────────────────────────────────

    fn schedule_world_time_tick(&mut self) {
        let tick = Duration::from_secs(self.config.world_time_tick_secs.max(1));
        let tick_secs = tick.as_secs_f64();
        self.timers.schedule_recurring(
            tick,
            tick,
            Some("world_time_tick"),
            Box::new(move |engine| {
                for area in engine.world.areas.values_mut() {
                    area.area_time.advance(tick_secs, area.time_scale);
                }
                engine.world.world_time.advance(tick_secs, 1.0);
                Vec::new()
            }),
        );
    }

    fn schedule_npc_housekeeping(&mut self) {
        let interval = Duration::from_secs(self.config.npc_housekeeping_interval_secs.max(1));
        self.timers.schedule_recurring(
            interval,
            interval,
            Some("npc_housekeeping_tick"),
            Box::new(|engine| engine.npc_housekeeping()),
        );
    }

    /// Respawn sweep for dead NPCs. Delay resolves as instance override,
    /// then area default, then 300 seconds; negative means never.
    fn npc_housekeeping(&mut self) -> Vec<GameEvent> {
        let now = chrono::Utc::now();
        let mut events = Vec::new();

        let due: Vec<EntityId> = self
            .world
            .npcs
            .iter()
            .filter(|(_, npc)| !npc.base.is_alive())
            .filter(|(_, npc)| {
                let respawn_time = npc.respawn_time_override.unwrap_or_else(|| {
                    self.world
                        .room_area(&npc.spawn_room_id)
                        .map(|a| a.default_respawn_time)
                        .unwrap_or(300)
                });
                if respawn_time < 0 {
                    return false;
                }
                npc.last_killed_at
                    .is_some_and(|killed| (now - killed).num_seconds() >= respawn_time)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for npc_id in due {
            let spawn_info = self.world.npcs.get(&npc_id).map(|npc| {
                (
                    npc.spawn_room_id.clone(),
                    npc.template_id.clone(),
                    npc.display_name().to_string(),
                )
            });
            let Some((spawn_room_id, template_id, name)) = spawn_info else {
                continue;
            };
            let max_health = self
                .world
                .npc_templates
                .get(&template_id)
                .map(|t| t.max_health)
                .unwrap_or(1);

            if let Some(npc) = self.world.npcs.get_mut(&npc_id) {
                npc.base.current_health = max_health;
                npc.last_killed_at = None;
                npc.base.room_id = spawn_room_id.clone();
                npc.target_id = None;
            }
            if let Some(room) = self.world.rooms.get_mut(&spawn_room_id) {
                room.entities.insert(npc_id.clone());
            }
            events.push(GameEvent::to_room(
                spawn_room_id.clone(),
                format!("{name} appears."),
            ));
            tracing::debug!(npc = %npc_id, room = %spawn_room_id, "npc respawned");

            self.schedule_npc_idle(&npc_id);
            self.schedule_npc_wander(&npc_id);
        }
        events
    }

    fn init_npc_behaviors(&mut self) {
        let living: Vec<EntityId> = self
            .world
            .npcs
            .iter()
            .filter(|(_, npc)| npc.base.is_alive())
            .map(|(id, _)| id.clone())
            .collect();
        for npc_id in living {
            self.schedule_npc_idle(&npc_id);
            self.schedule_npc_wander(&npc_id);
        }
    }

    /// Schedule the next idle tick for an NPC at a uniform delay within
    /// its configured window. Reschedules itself after each fire.
    pub fn schedule_npc_idle(&mut self, npc_id: &str) {
        let config = match self.npc_behavior_config(npc_id) {
            Some(config) if config.idle_enabled => config,
            _ => return,
        };
        let previous = self
            .world
            .npcs
            .get_mut(npc_id)
            .and_then(|n| n.idle_event_id.take());
        if let Some(event_id) = previous {
            self.timers.cancel(&event_id);
        }

        let delay = self
            .dice
            .uniform(config.idle_interval_min, config.idle_interval_max)
            .max(0.1);
        let event_id = self.world.mint_id(&format!("npc_idle_{npc_id}"));
        if let Some(npc) = self.world.npcs.get_mut(npc_id) {
            npc.idle_event_id = Some(event_id.clone());
        }
        let target = npc_id.to_string();
        self.timers.schedule_once(
            Duration::from_secs_f32(delay),
            Some(&event_id),
            Box::new(move |engine| {
                let mut events = Vec::new();
                let alive = engine
                    .world
                    .npcs
                    .get(&target)
                    .is_some_and(|n| n.base.is_alive());
                if alive {
                    if let Some(result) =
                        behaviors::run_hook(engine, &target, behaviors::HookArgs::IdleTick)
                        && result.handled
                    {
                        events.extend(behaviors::process_result(engine, &target, &result));
                    }
                    engine.schedule_npc_idle(&target);
                }
                events
            }),
        );
    }

    /// Schedule the next wander tick for an NPC, if wandering is enabled.
    pub fn schedule_npc_wander(&mut self, npc_id: &str) {
        let config = match self.npc_behavior_config(npc_id) {
            Some(config) if config.wander_enabled => config,
            _ => return,
        };
        let previous = self
            .world
            .npcs
            .get_mut(npc_id)
            .and_then(|n| n.wander_event_id.take());
        if let Some(event_id) = previous {
            self.timers.cancel(&event_id);
        }

        let delay = self
            .dice
            .uniform(config.wander_interval_min, config.wander_interval_max)
            .max(0.1);
        let event_id = self.world.mint_id(&format!("npc_wander_{npc_id}"));
        if let Some(npc) = self.world.npcs.get_mut(npc_id) {
            npc.wander_event_id = Some(event_id.clone());
        }
        let target = npc_id.to_string();
        self.timers.schedule_once(
            Duration::from_secs_f32(delay),
            Some(&event_id),
            Box::new(move |engine| {
                let mut events = Vec::new();
                let alive = engine
                    .world
                    .npcs
                    .get(&target)
                    .is_some_and(|n| n.base.is_alive());
                if alive {
                    if let Some(result) =
                        behaviors::run_hook(engine, &target, behaviors::HookArgs::WanderTick)
                        && result.handled
                    {
                        events.extend(behaviors::process_result(engine, &target, &result));
                    }
                    engine.schedule_npc_wander(&target);
                }
                events
            }),
        );
    }

    fn npc_behavior_config(&self, npc_id: &str) -> Option<behaviors::BehaviorConfig> {
        let npc = self.world.npcs.get(npc_id)?;
        if !npc.base.is_alive() {
            return None;
        }
        self.world
            .npc_templates
            .get(&npc.template_id)
            .map(|t| t.resolved_behavior.clone())
    }

    /// Cancel an NPC's behavior timers (death, despawn).
    pub fn cancel_npc_timers(&mut self, npc_id: &str) {
        let ids = self.world.npcs.get_mut(npc_id).map(|npc| {
            (npc.idle_event_id.take(), npc.wander_event_id.take())
        });
        if let Some((idle, wander)) = ids {
            if let Some(id) = idle {
                self.timers.cancel(&id);
            }
            if let Some(id) = wander {
                self.timers.cancel(&id);
            }
        }
    }
}

/// Respawn execution: restore health, clear combat, move to the target
/// room, show it, and refresh the sheet.
fn execute_player_respawn(
    engine: &mut WorldEngine,
    player_id: &str,
    respawn_room_id: &str,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let Some(player) = engine.world.players.get(player_id) else {
        return events;
    };
    let old_room_id = player.base.room_id.clone();
    let name = player.base.name.clone();
    if !engine.world.rooms.contains_key(respawn_room_id) {
        tracing::error!(room = %respawn_room_id, "respawn room missing");
        return events;
    }

    if let Some(player) = engine.world.players.get_mut(player_id) {
        player.base.current_health = player.base.max_health;
        player.death_time = None;
        player.respawn_event_id = None;
        player.base.combat.clear_combat();
    }
    if let Some(room) = engine.world.rooms.get_mut(&old_room_id) {
        room.entities.remove(player_id);
    }
    if let Some(room) = engine.world.rooms.get_mut(respawn_room_id) {
        room.entities.insert(player_id.to_string());
    }
    if let Some(player) = engine.world.players.get_mut(player_id) {
        player.base.room_id = respawn_room_id.to_string();
    }
    engine.dirty.mark(player_id);

    events.push(GameEvent::to_player(
        player_id.to_string(),
        "**Sensation floods into you.** Every nerve prickles with fresh \
         sensitivity as your spirit and your body are restored.",
    ));
    events.extend(look::look_at_room(&engine.world, &player_id.to_string()));
    if let Some(player) = engine.world.players.get(player_id) {
        events.push(GameEvent::stat_update(player));
    }
    if old_room_id != respawn_room_id {
        events.push(GameEvent::to_room_excluding(
            respawn_room_id.to_string(),
            format!("{name} materializes in a shimmer of light."),
            [player_id.to_string()],
        ));
    }
    tracing::info!(player = %player_id, room = %respawn_room_id, "player respawned");
    events
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Replace the standalone word "self" (any case) with the player's name,
/// leaving words like "yourself" untouched.
fn substitute_self(raw: &str, name: &str) -> String {
    fn is_word_char(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        let matches = i + 4 <= chars.len()
            && chars[i..i + 4]
                .iter()
                .collect::<String>()
                .eq_ignore_ascii_case("self")
            && (i == 0 || !is_word_char(chars[i - 1]))
            && (i + 4 == chars.len() || !is_word_char(chars[i + 4]));
        if matches {
            out.push_str(name);
            i += 4;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Command Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_move(engine: &mut WorldEngine, player_id: &PlayerId, token: &str, _args: &str) -> CommandResult {
    match token.parse::<Direction>() {
        Ok(direction) => Ok(engine.move_player(player_id, direction)),
        Err(_) => Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "You can't go that way.",
        )]),
    }
}

fn cmd_look(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    let term = args.trim();
    if term.is_empty() {
        Ok(look::look_at_room(&engine.world, player_id))
    } else {
        Ok(look::look_at_target(&engine.world, player_id, term))
    }
}

fn cmd_time(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    let Some(player) = engine.world.players.get(player_id) else {
        return Ok(vec![GameEvent::to_player(player_id.clone(), "You have no form.")]);
    };
    let room_id = player.base.room_id.clone();

    let text = match engine.world.room_area(&room_id) {
        Some(area) => {
            let mut parts = vec![area.area_time.format_full(), format!("*{}*", area.name)];
            let flavor = area.phase_flavor();
            if !flavor.is_empty() {
                parts.push(String::new());
                parts.push(flavor.to_string());
            }
            if !area.ambient_sound.is_empty() {
                parts.push(String::new());
                parts.push(format!("*{}*", area.ambient_sound));
            }
            if area.time_scale != 1.0 {
                parts.push(String::new());
                if area.time_scale > 1.0 {
                    parts.push(format!("*Time flows {:.1}x faster here.*", area.time_scale));
                } else {
                    parts.push(format!("🐌 *Time flows {:.1}x slower here.*", area.time_scale));
                }
            }
            parts.join("\n")
        }
        None => {
            let clock: &WorldTime = &engine.world.world_time;
            format!("{}\n\n{}", clock.format_full(), clock.phase().default_flavor())
        }
    };
    Ok(vec![GameEvent::to_player(player_id.clone(), text)])
}

fn cmd_stats(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    let Some(player) = engine.world.players.get(player_id) else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "You have no form. (Player not found)",
        )]);
    };

    let effective_ac = player.base.effective_armor_class();
    let mut ac_line = format!("Armor Class: {effective_ac}");
    if effective_ac != player.base.armor_class {
        ac_line.push_str(&format!(" ({} base)", player.base.armor_class));
    }

    let mut lines = vec![
        format!("═══ Character Sheet: {} ═══", player.base.name),
        String::new(),
        format!("Class: {}", capitalize(&player.character_class)),
        format!("Level: {}", player.level),
        format!("Experience: {} XP", player.experience),
        String::new(),
        "═══ Base Attributes ═══".to_string(),
        format!("Strength:     {}", player.base.strength),
        format!("Dexterity:    {}", player.base.dexterity),
        format!("Intelligence: {}", player.base.intelligence),
        format!("Vitality:     {}", player.base.vitality),
        String::new(),
        "═══ Combat Stats ═══".to_string(),
        format!("Health: {}/{}", player.base.current_health, player.base.max_health),
        format!("Energy: {}/{}", player.current_energy, player.max_energy),
        ac_line,
    ];
    if !player.base.active_effects.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Active Effects: {} (use 'effects' to view)",
            player.base.active_effects.len()
        ));
    }
    Ok(vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))])
}

fn cmd_effects(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    Ok(vec![GameEvent::to_player(
        player_id.clone(),
        effects::effect_summary(&engine.world, player_id),
    )])
}

fn cmd_say(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    let text = args.trim();
    if text.is_empty() {
        return Ok(vec![GameEvent::to_player(player_id.clone(), "Say what?")]);
    }
    let Some(player) = engine.world.players.get(player_id) else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "No one hears you. (Player not found)",
        )]);
    };
    Ok(vec![
        GameEvent::to_player(player_id.clone(), format!("You say: \"{text}\"")),
        GameEvent::to_room_excluding(
            player.base.room_id.clone(),
            format!("{} says: \"{text}\"", player.base.name),
            [player_id.clone()],
        ),
    ])
}

static EMOTES: phf::Map<&'static str, (&'static str, &'static str)> = phf::phf_map! {
    "smile" => ("😊 You smile.", "😊 {} smiles."),
    "nod" => ("🙂 You nod.", "🙂 {} nods."),
    "laugh" => ("😄 You laugh.", "😄 {} laughs."),
    "cringe" => ("😖 You cringe.", "😖 {} cringes."),
    "smirk" => ("😏 You smirk.", "😏 {} smirks."),
    "frown" => ("🙁 You frown.", "🙁 {} frowns."),
    "wink" => ("😉 You wink.", "😉 {} winks."),
    "lookaround" => ("👀 You look around.", "👀 {} looks around."),
};

fn cmd_emote(engine: &mut WorldEngine, player_id: &PlayerId, token: &str, _args: &str) -> CommandResult {
    let Some(player) = engine.world.players.get(player_id) else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "No one perceives you. (Player not found)",
        )]);
    };
    let (first_person, third_person) = EMOTES
        .get(token)
        .copied()
        .unwrap_or(("You do something.", "{} does something."));
    Ok(vec![
        GameEvent::to_player(player_id.clone(), first_person),
        GameEvent::to_room_excluding(
            player.base.room_id.clone(),
            third_person.replace("{}", &player.base.name),
            [player_id.clone()],
        ),
    ])
}

fn cmd_talk(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    Ok(quests::talk_command(engine, player_id, args))
}

fn cmd_inventory(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    Ok(inventory::inventory_command(&engine.world, player_id))
}

fn cmd_get(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    Ok(inventory::get_command(engine, player_id, args))
}

fn cmd_drop(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    Ok(inventory::drop_command(engine, player_id, args))
}

fn cmd_equip(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    Ok(inventory::equip_command(engine, player_id, args))
}

fn cmd_unequip(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    Ok(inventory::unequip_command(engine, player_id, args))
}

fn cmd_use(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    Ok(inventory::use_command(engine, player_id, args))
}

/// `give` is dual-purpose: "give <item> to <target>" hands over an item;
/// the admin form "give <player> <template_id>" mints one.
fn cmd_give(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if args.to_ascii_lowercase().contains(" to ") {
        return Ok(inventory::give_command(engine, player_id, args));
    }

    if !engine.has_permission(player_id, Permission::SpawnItem) {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Give what to whom? Usage: give <item> to <target>",
        )]);
    }
    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let (Some(target_name), Some(template_id)) = (parts.next(), parts.next()) else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Usage: give <player_name> <item_template>",
        )]);
    };
    let target = engine
        .world
        .players
        .values()
        .find(|p| name_matches(&p.base.name, target_name))
        .map(|p| p.base.id.clone());
    let Some(target_id) = target else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            format!("Player '{target_name}' not found."),
        )]);
    };
    if !engine.world.item_templates.contains_key(template_id.trim()) {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            format!("Item template '{}' not found.", template_id.trim()),
        )]);
    }
    let mut events = inventory::grant_item(engine, &target_id, &template_id.trim().to_string(), 1);
    let item_name = engine
        .world
        .item_templates
        .get(template_id.trim())
        .map(|t| t.name.clone())
        .unwrap_or_default();
    let target_name = engine
        .world
        .players
        .get(&target_id)
        .map(|p| p.base.name.clone())
        .unwrap_or_default();
    events.push(GameEvent::to_player(
        player_id.clone(),
        format!("Gave {item_name} to {target_name}."),
    ));
    Ok(events)
}

fn cmd_attack(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    Ok(combat::attack_command(engine, player_id, args))
}

fn cmd_stop(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    Ok(combat::stop_command(engine, player_id))
}

fn cmd_flee(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    Ok(combat::flee_command(engine, player_id))
}

fn cmd_combat_status(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    Ok(combat::status_command(engine, player_id))
}

fn cmd_journal(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    Ok(quests::journal_command(&engine.world, player_id))
}

fn cmd_quest(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    Ok(quests::quest_detail_command(&engine.world, player_id, args))
}

fn cmd_abandon(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    Ok(quests::abandon_command(engine, player_id, args))
}

fn cmd_help(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    let category = args.trim();
    let category = if category.is_empty() { None } else { Some(category) };
    Ok(vec![GameEvent::to_player(
        player_id.clone(),
        engine.router.help(category),
    )])
}

fn cmd_quit(_engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    Ok(vec![
        GameEvent::to_player(
            player_id.clone(),
            "\nYou feel the world fade away as you enter a state of stasis...\n\
             Farewell, brave adventurer. May your return be swift.\n",
        ),
        GameEvent::player_event(
            player_id.clone(),
            EventBody::Quit {
                text: "Disconnecting...".to_string(),
            },
        ),
    ])
}

// ─── Admin Handlers ─────────────────────────────────────────────────────────

const NO_PERMISSION: &str = "You don't have permission to use this command.";

fn name_matches(name: &str, term: &str) -> bool {
    let name = name.to_lowercase();
    let term = term.to_lowercase();
    name == term || name.starts_with(&term)
}

fn cmd_who(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, _args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::KickPlayer) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let mut online: Vec<&crate::world::Player> = engine
        .world
        .players
        .values()
        .filter(|p| p.is_connected)
        .collect();
    if online.is_empty() {
        return Ok(vec![GameEvent::to_player(player_id.clone(), "No players online.")]);
    }
    online.sort_by(|a, b| a.base.name.cmp(&b.base.name));

    let mut lines = vec!["📋 Online Players:".to_string(), "-".repeat(40)];
    for player in &online {
        let room_name = engine
            .world
            .rooms
            .get(&player.base.room_id)
            .map(|r| r.name.as_str())
            .unwrap_or("Unknown");
        let hp_pct = if player.base.max_health > 0 {
            player.base.current_health * 100 / player.base.max_health
        } else {
            0
        };
        lines.push(format!(
            "  {} (Lv{}) - {room_name} [{hp_pct}% HP]",
            player.base.name, player.level
        ));
    }
    lines.push("-".repeat(40));
    lines.push(format!("Total: {} player(s)", online.len()));
    Ok(vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))])
}

fn cmd_where(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::KickPlayer) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let term = args.trim();
    if term.is_empty() {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Where is whom? Usage: where <player_name>",
        )]);
    }
    let Some(target) = engine
        .world
        .players
        .values()
        .find(|p| name_matches(&p.base.name, term))
    else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            format!("Player '{term}' not found."),
        )]);
    };
    let room = engine.world.rooms.get(&target.base.room_id);
    let location = match room {
        Some(room) => match room.area_id.as_deref().and_then(|a| engine.world.areas.get(a)) {
            Some(area) => format!("{} ({})", room.name, area.name),
            None => room.name.clone(),
        },
        None => "Unknown".to_string(),
    };
    let status = if target.is_connected {
        "online"
    } else {
        "offline (stasis)"
    };
    Ok(vec![GameEvent::to_player(
        player_id.clone(),
        format!("📍 {}: {location} [{status}]", target.base.name),
    )])
}

fn cmd_goto(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::Teleport) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let term = args.trim();
    if term.is_empty() {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Go to where? Usage: goto <room_id|player_name>",
        )]);
    }

    let target_room_id = if engine.world.rooms.contains_key(term) {
        Some(term.to_string())
    } else {
        engine
            .world
            .players
            .values()
            .find(|p| name_matches(&p.base.name, term))
            .map(|p| p.base.room_id.clone())
    };
    let Some(target_room_id) = target_room_id else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            format!("Room or player '{term}' not found."),
        )]);
    };

    let old_room_id = engine
        .world
        .players
        .get(player_id)
        .map(|p| p.base.room_id.clone());
    let Some(old_room_id) = old_room_id else {
        return Ok(vec![GameEvent::to_player(player_id.clone(), "You have no form.")]);
    };
    if let Some(room) = engine.world.rooms.get_mut(&old_room_id) {
        room.entities.remove(player_id.as_str());
    }
    if let Some(room) = engine.world.rooms.get_mut(&target_room_id) {
        room.entities.insert(player_id.clone());
    }
    if let Some(player) = engine.world.players.get_mut(player_id) {
        player.base.room_id = target_room_id.clone();
    }
    engine.dirty.mark(player_id);

    let room_name = engine
        .world
        .rooms
        .get(&target_room_id)
        .map(|r| r.name.clone())
        .unwrap_or_default();
    let mut events = vec![GameEvent::to_player(
        player_id.clone(),
        format!("You teleport to {room_name}."),
    )];
    events.extend(look::look_at_room(&engine.world, player_id));
    Ok(events)
}

fn cmd_summon(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::Teleport) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let term = args.trim();
    if term.is_empty() {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Summon whom? Usage: summon <player_name>",
        )]);
    }
    let destination = engine
        .world
        .players
        .get(player_id)
        .map(|p| p.base.room_id.clone());
    let Some(destination) = destination else {
        return Ok(vec![GameEvent::to_player(player_id.clone(), "You have no form.")]);
    };
    let summoner = engine
        .world
        .players
        .get(player_id)
        .map(|p| p.base.name.clone())
        .unwrap_or_default();

    let target_id = engine
        .world
        .players
        .values()
        .find(|p| p.base.id != *player_id && name_matches(&p.base.name, term))
        .map(|p| p.base.id.clone());
    let Some(target_id) = target_id else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            format!("Player '{term}' not found."),
        )]);
    };

    let old_room = engine
        .world
        .players
        .get(&target_id)
        .map(|p| p.base.room_id.clone());
    if let Some(old_room) = old_room
        && let Some(room) = engine.world.rooms.get_mut(&old_room)
    {
        room.entities.remove(target_id.as_str());
    }
    if let Some(room) = engine.world.rooms.get_mut(&destination) {
        room.entities.insert(target_id.clone());
    }
    if let Some(target) = engine.world.players.get_mut(&target_id) {
        target.base.room_id = destination.clone();
    }
    engine.dirty.mark(&target_id);

    let target_name = engine
        .world
        .players
        .get(&target_id)
        .map(|p| p.base.name.clone())
        .unwrap_or_default();
    let mut events = vec![GameEvent::to_player(
        player_id.clone(),
        format!("You summon {target_name} to your location."),
    )];
    if engine.dispatcher.has_listener(&target_id) {
        events.push(GameEvent::to_player(
            target_id.clone(),
            format!("You have been summoned by {summoner}."),
        ));
        events.extend(look::look_at_room(&engine.world, &target_id));
    }
    Ok(events)
}

fn cmd_spawn(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::SpawnNpc) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let (Some(kind), Some(template_id)) = (parts.next(), parts.next().map(str::trim)) else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Spawn what? Usage: spawn npc|item <template_id>",
        )]);
    };
    let room_id = engine
        .world
        .players
        .get(player_id)
        .map(|p| p.base.room_id.clone());
    let Some(room_id) = room_id else {
        return Ok(vec![GameEvent::to_player(player_id.clone(), "You have no form.")]);
    };

    match kind.to_lowercase().as_str() {
        "npc" => {
            let Some(npc_id) = engine.world.spawn_npc(template_id, &room_id) else {
                return Ok(vec![GameEvent::to_player(
                    player_id.clone(),
                    format!("NPC template '{template_id}' not found."),
                )]);
            };
            engine.schedule_npc_idle(&npc_id);
            engine.schedule_npc_wander(&npc_id);
            let name = engine
                .world
                .npcs
                .get(&npc_id)
                .map(|n| n.display_name().to_string())
                .unwrap_or_default();
            Ok(vec![GameEvent::to_player(
                player_id.clone(),
                format!("Spawned {name} ({npc_id})."),
            )])
        }
        "item" => {
            if engine.world.spawn_item(template_id, &room_id, 1).is_none() {
                return Ok(vec![GameEvent::to_player(
                    player_id.clone(),
                    format!("Item template '{template_id}' not found."),
                )]);
            }
            let name = engine
                .world
                .item_templates
                .get(template_id)
                .map(|t| t.name.clone())
                .unwrap_or_default();
            Ok(vec![GameEvent::to_player(
                player_id.clone(),
                format!("Spawned {name} on the ground."),
            )])
        }
        _ => Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Usage: spawn npc|item <template_id>",
        )]),
    }
}

fn cmd_despawn(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::SpawnNpc) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let term = args.trim();
    if term.is_empty() {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Despawn whom? Usage: despawn <npc_name>",
        )]);
    }
    let room_id = engine
        .world
        .players
        .get(player_id)
        .map(|p| p.base.room_id.clone());
    let Some(room_id) = room_id else {
        return Ok(vec![GameEvent::to_player(player_id.clone(), "You have no form.")]);
    };

    let npc = engine
        .world
        .find_entity_in_room(&room_id, term, false, true)
        .map(|e| e.base().id.clone());
    let Some(npc_id) = npc else {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            format!("No NPC named '{term}' in this room."),
        )]);
    };
    engine.cancel_npc_timers(&npc_id);
    let name = engine
        .world
        .npcs
        .get(&npc_id)
        .map(|n| n.display_name().to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    if let Some(room) = engine.world.rooms.get_mut(&room_id) {
        room.entities.remove(&npc_id);
    }
    engine.world.npcs.remove(&npc_id);
    Ok(vec![GameEvent::to_player(
        player_id.clone(),
        format!("{name} vanishes in a puff of smoke."),
    )])
}

fn cmd_inspect(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::ModifyStats) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let term = args.trim();
    if term.is_empty() {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Inspect what? Usage: inspect <target_name>",
        )]);
    }

    if let Some(target) = engine
        .world
        .players
        .values()
        .find(|p| name_matches(&p.base.name, term))
    {
        let lines = vec![
            format!("📋 Player: {}", target.base.name),
            "-".repeat(40),
            format!("  ID: {}", target.base.id),
            format!("  Level: {} ({} XP)", target.level, target.experience),
            format!("  Class: {}", target.character_class),
            format!("  Health: {}/{}", target.base.current_health, target.base.max_health),
            format!("  Energy: {}/{}", target.current_energy, target.max_energy),
            format!("  Room: {}", target.base.room_id),
            format!("  Connected: {}", target.is_connected),
            format!(
                "  Stats: STR {}, DEX {}, INT {}, VIT {}",
                target.base.strength,
                target.base.dexterity,
                target.base.intelligence,
                target.base.vitality
            ),
            format!("  Active Effects: {}", target.base.active_effects.len()),
        ];
        return Ok(vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))]);
    }

    let room_id = engine
        .world
        .players
        .get(player_id)
        .map(|p| p.base.room_id.clone())
        .unwrap_or_default();
    if let Some(crate::world::EntityRef::Npc(npc)) =
        engine.world.find_entity_in_room(&room_id, term, false, true)
    {
        let behaviors = engine
            .world
            .npc_templates
            .get(&npc.template_id)
            .map(|t| t.behaviors.join(", "))
            .unwrap_or_default();
        let lines = vec![
            format!("📋 NPC: {}", npc.display_name()),
            "-".repeat(40),
            format!("  ID: {}", npc.base.id),
            format!("  Template: {}", npc.template_id),
            format!("  Health: {}/{}", npc.base.current_health, npc.base.max_health),
            format!("  Room: {}", npc.base.room_id),
            format!("  Spawn Room: {}", npc.spawn_room_id),
            format!(
                "  Behaviors: {}",
                if behaviors.is_empty() { "None" } else { &behaviors }
            ),
        ];
        return Ok(vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))]);
    }

    if let Some(item) = engine
        .world
        .items
        .values()
        .find(|i| {
            (i.room_id.as_deref() == Some(room_id.as_str())
                || i.player_id.as_deref() == Some(player_id.as_str()))
                && i.matches_keyword(term)
        })
    {
        let lines = vec![
            format!("📋 Item: {}", item.name),
            "-".repeat(40),
            format!("  ID: {}", item.id),
            format!("  Template: {}", item.template_id),
            format!("  Quantity: {}", item.quantity),
            format!("  Room: {}", item.room_id.as_deref().unwrap_or("N/A")),
            format!("  Owner: {}", item.player_id.as_deref().unwrap_or("N/A")),
            format!("  Container: {}", item.container_id.as_deref().unwrap_or("N/A")),
        ];
        return Ok(vec![GameEvent::to_player(player_id.clone(), lines.join("\n"))]);
    }

    Ok(vec![GameEvent::to_player(
        player_id.clone(),
        format!("Could not find '{term}' to inspect."),
    )])
}

fn cmd_broadcast(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::ServerCommands) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let text = args.trim();
    if text.is_empty() {
        return Ok(vec![GameEvent::to_player(
            player_id.clone(),
            "Broadcast what? Usage: broadcast <message>",
        )]);
    }
    let sender = engine
        .world
        .players
        .get(player_id)
        .map(|p| p.base.name.clone())
        .unwrap_or_else(|| "SYSTEM".to_string());
    Ok(vec![
        GameEvent::broadcast(format!("📢 [{sender}]: {text}")),
        GameEvent::to_player(player_id.clone(), "Broadcast sent."),
    ])
}

fn cmd_heal(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::ModifyStats) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let term = args.trim();
    if term.is_empty() {
        return Ok(vec![GameEvent::to_player(player_id.clone(), "Heal whom?")]);
    }
    Ok(adjust_health(engine, player_id, term, 20))
}

fn cmd_hurt(engine: &mut WorldEngine, player_id: &PlayerId, _token: &str, args: &str) -> CommandResult {
    if !engine.has_permission(player_id, Permission::ModifyStats) {
        return Ok(vec![GameEvent::to_player(player_id.clone(), NO_PERMISSION)]);
    }
    let term = args.trim();
    if term.is_empty() {
        return Ok(vec![GameEvent::to_player(player_id.clone(), "Hurt whom?")]);
    }
    Ok(adjust_health(engine, player_id, term, -15))
}

/// Shared heal/hurt implementation. Healing caps at max health; harm stops
/// at 1 so the admin surface cannot kill outright.
fn adjust_health(
    engine: &mut WorldEngine,
    actor_id: &PlayerId,
    term: &str,
    amount: i32,
) -> Vec<GameEvent> {
    let room_id = engine
        .world
        .players
        .get(actor_id)
        .map(|p| p.base.room_id.clone());
    let Some(room_id) = room_id else {
        return vec![GameEvent::to_player(actor_id.clone(), "You have no form.")];
    };
    let Some(target) = engine.world.find_entity_in_room(&room_id, term, true, true) else {
        return vec![GameEvent::to_player(
            actor_id.clone(),
            format!("'{term}' not found."),
        )];
    };
    let target_id = target.base().id.clone();
    let target_name = target.name().to_string();
    let target_is_player = target.is_player();

    let delta = {
        let Some(mut entity) = engine.world.entity_mut(&target_id) else {
            return Vec::new();
        };
        let base = entity.base_mut();
        let old = base.current_health;
        base.current_health = (base.current_health + amount).clamp(1, base.max_health);
        base.current_health - old
    };
    engine.dirty.mark(&target_id);

    let mut events = Vec::new();
    if target_is_player {
        if let Some(player) = engine.world.players.get(&target_id) {
            events.push(GameEvent::stat_update(player));
        }
        if amount > 0 {
            events.push(GameEvent::to_player(
                target_id.clone(),
                format!("*A warm glow surrounds you.* You are healed for {delta} HP."),
            ));
        } else {
            events.push(GameEvent::to_player(
                target_id.clone(),
                format!("*A dark force strikes you!* You take {} damage.", -delta),
            ));
        }
    }
    if target_id != *actor_id {
        let verb = if amount > 0 { "heal" } else { "hurt" };
        let quantity = delta.abs();
        events.push(GameEvent::to_player(
            actor_id.clone(),
            format!("You {verb} {target_name} for {quantity} HP."),
        ));
    }
    events
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
