//! Emberwake engine core
//!
//! The authoritative runtime of a multi-user text adventure server: a
//! single-writer engine loop owning the in-memory world graph, a stable
//! min-heap time-event manager driving every deferred action, and the
//! combat, effect, behavior, trigger, and quest systems riding on top.
//!
//! Hosts talk to a running engine exclusively through [`EngineHandle`]:
//! submit commands, register connections, and drain per-player outbound
//! queues. Everything else happens on the loop.

pub mod behaviors;
pub mod config;
pub mod engine;
pub mod inventory;
pub mod persistence;
pub mod systems;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{CombatConfig, EngineConfig};
pub use engine::{EngineHandle, EngineMsg, Permission, WorldEngine};
pub use persistence::{PersistenceStore, SnapshotBatch};
pub use systems::dispatcher::{EventBody, EventDispatcher, EventScope, GameEvent, StatSheet, WireEvent};
pub use systems::time_manager::TimeEventManager;
pub use world::World;
