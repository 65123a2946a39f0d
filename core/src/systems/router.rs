//! Command router
//!
//! Registry mapping command tokens (primary names and aliases) to handler
//! functions plus the metadata the help surface renders. Dispatch itself
//! lives on the engine loop; the router only resolves tokens.
//!
//! # Error Policy
//!
//! Handlers return `Result<Vec<GameEvent>, CommandError>`. Expected
//! user-facing refusals ("Drop what?") are `Ok` message events; `Err` means
//! the handler faulted — the engine logs it and replies with a single
//! generic message. Nothing propagates past the router.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;
use thiserror::Error;

use emberwake_types::PlayerId;

use crate::engine::WorldEngine;
use crate::inventory::InventoryError;
use crate::systems::dispatcher::GameEvent;
use crate::world::WorldError;

/// Handler faults converted by the engine into a generic reply.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("{0}")]
    Internal(String),
}

pub type CommandResult = Result<Vec<GameEvent>, CommandError>;

/// Handler signature: engine, acting player, matched command token, and the
/// remaining argument string.
pub type CommandHandler = fn(&mut WorldEngine, &PlayerId, &str, &str) -> CommandResult;

/// Metadata for one registered command.
#[derive(Clone)]
pub struct CommandMeta {
    /// Primary command name.
    pub name: String,
    /// All tokens that resolve to this handler.
    pub names: Vec<String>,
    pub handler: CommandHandler,
    pub category: String,
    pub description: String,
    pub usage: String,
}

impl std::fmt::Debug for CommandMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandMeta")
            .field("name", &self.name)
            .field("names", &self.names)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct CommandRouter {
    commands: HashMap<String, Arc<CommandMeta>>,
    /// category -> primary names, ordered for help output.
    categories: BTreeMap<String, Vec<String>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a primary name and any number of aliases.
    pub fn register(
        &mut self,
        primary: &str,
        names: &[&str],
        handler: CommandHandler,
        category: &str,
        description: &str,
        usage: &str,
    ) {
        let all_names: Vec<String> = if names.is_empty() {
            vec![primary.to_string()]
        } else {
            names.iter().map(|n| n.to_string()).collect()
        };
        let meta = Arc::new(CommandMeta {
            name: primary.to_string(),
            names: all_names.clone(),
            handler,
            category: category.to_string(),
            description: description.to_string(),
            usage: usage.to_string(),
        });
        for name in &all_names {
            self.commands.insert(name.clone(), Arc::clone(&meta));
        }
        let entry = self.categories.entry(category.to_string()).or_default();
        if !entry.contains(&primary.to_string()) {
            entry.push(primary.to_string());
        }
    }

    /// Resolve a command token to its metadata.
    pub fn lookup(&self, token: &str) -> Option<Arc<CommandMeta>> {
        self.commands.get(token).cloned()
    }

    pub fn is_registered(&self, token: &str) -> bool {
        self.commands.contains_key(token)
    }

    /// Render the help listing, optionally restricted to one category.
    pub fn help(&self, category: Option<&str>) -> String {
        let mut lines = vec!["═══ Available Commands ═══".to_string(), String::new()];
        for (cat, names) in &self.categories {
            if category.is_some_and(|c| c != cat) {
                continue;
            }
            lines.push(format!("**{}**:", capitalize(cat)));
            for name in names {
                let Some(meta) = self.commands.get(name) else {
                    continue;
                };
                let usage = if meta.usage.is_empty() {
                    name.clone()
                } else {
                    format!("{name} {}", meta.usage)
                };
                let aliases: Vec<&str> = meta
                    .names
                    .iter()
                    .filter(|n| *n != name)
                    .map(String::as_str)
                    .collect();
                if aliases.is_empty() {
                    lines.push(format!("  {usage}"));
                } else {
                    lines.push(format!("  {usage} (aliases: {})", aliases.join(", ")));
                }
                if !meta.description.is_empty() {
                    lines.push(format!("    {}", meta.description));
                }
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut WorldEngine, _: &PlayerId, _: &str, _: &str) -> CommandResult {
        Ok(Vec::new())
    }

    #[test]
    fn aliases_resolve_to_the_same_handler() {
        let mut router = CommandRouter::new();
        router.register(
            "attack",
            &["attack", "kill", "fight", "hit"],
            noop,
            "combat",
            "Attack a target",
            "<target_name>",
        );

        for token in ["attack", "kill", "fight", "hit"] {
            let meta = router.lookup(token).expect("token registered");
            assert_eq!(meta.name, "attack");
        }
        assert!(router.lookup("slap").is_none());
    }

    #[test]
    fn help_lists_usage_and_aliases() {
        let mut router = CommandRouter::new();
        router.register(
            "look",
            &["look", "l"],
            noop,
            "view",
            "Examine your surroundings",
            "[target_name]",
        );
        let help = router.help(None);
        assert!(help.contains("**View**:"));
        assert!(help.contains("look [target_name]"));
        assert!(help.contains("aliases: l"));
    }
}
