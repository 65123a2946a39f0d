//! emberwake - local host for the Emberwake engine
//!
//! Boots a world (a TOML document or the built-in demo), runs the engine
//! loop, and attaches a single local session over stdin. The engine only
//! ever sees `submit_command` calls and one outbound queue — the same
//! contract a network surface would use.

mod demo;
mod world_file;

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use emberwake_core::systems::dispatcher::EventBody;
use emberwake_core::{EngineConfig, WorldEngine};

#[derive(Parser)]
#[command(version, about = "Emberwake MUD engine, local session")]
struct Cli {
    /// World document to load instead of the built-in demo.
    #[arg(short, long)]
    world: Option<PathBuf>,

    /// Name of the local character.
    #[arg(short, long, default_value = "Traveler")]
    name: String,

    /// Room the local character starts in (defaults to an area entry
    /// point, or the first room).
    #[arg(short, long)]
    start: Option<String>,

    /// Grant the local character every admin permission.
    #[arg(long)]
    admin: bool,
}

const LOCAL_PLAYER: &str = "local";

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config: EngineConfig =
        confy::load("emberwake", None).map_err(|e| format!("config load failed: {e}"))?;

    let mut world = match &cli.world {
        Some(path) => world_file::load_world(path)?,
        None => {
            let doc = toml::from_str(demo::DEMO_WORLD)
                .map_err(|e| format!("built-in world failed to parse: {e}"))?;
            world_file::build_world(doc)?
        }
    };

    let start_room = cli
        .start
        .clone()
        .or_else(|| {
            world
                .areas
                .values()
                .flat_map(|a| a.entry_points.iter())
                .next()
                .cloned()
        })
        .or_else(|| world.rooms.keys().next().cloned())
        .ok_or("world has no rooms")?;
    world_file::add_player(&mut world, LOCAL_PLAYER, &cli.name, &start_room)?;

    let (engine, handle) = WorldEngine::new(world, config);
    let engine = if cli.admin {
        engine.with_permissions(Box::new(|_, _| true))
    } else {
        engine
    };

    let loop_task = tokio::spawn(engine.run());

    let mut outbound = handle
        .connect(LOCAL_PLAYER)
        .await
        .ok_or("engine loop refused the connection")?;

    // Printer: drain the outbound queue until the client-side quit event.
    let printer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            match event.body {
                EventBody::Message { text, .. } => {
                    println!("{text}");
                    println!();
                }
                EventBody::StatUpdate { payload } => {
                    tracing::debug!(health = payload.health, "stat update");
                }
                EventBody::RespawnCountdown { .. } => {}
                EventBody::Quit { text } => {
                    println!("{text}");
                    break;
                }
                other => {
                    tracing::debug!(?other, "unhandled event kind");
                }
            }
        }
    });

    println!("Connected as {}. Type 'help' for commands, 'quit' to leave.\n", cli.name);
    handle.submit_command(LOCAL_PLAYER, "look").await;

    // Reader: one command per line until quit or EOF.
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        print!("> ");
        std::io::stdout().flush().map_err(|e| e.to_string())?;
        tokio::select! {
            line = lines.next_line() => {
                match line.map_err(|e| e.to_string())? {
                    Some(line) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        handle.submit_command(LOCAL_PLAYER, trimmed).await;
                        if trimmed.eq_ignore_ascii_case("quit") {
                            // Give the farewell a moment to print.
                            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    handle.disconnect(LOCAL_PLAYER).await;
    handle.shutdown().await;
    let _ = printer.await;
    let _ = loop_task.await;
    Ok(())
}
