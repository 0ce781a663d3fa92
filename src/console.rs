//! Line-oriented console
//!
//! Drives the in-memory world from text commands. Host events (join, hit,
//! death, ...) are queued for the tick loop; admin commands and queries go
//! straight to the controller.

use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::combat::{Category, CombatModeController, ParticipantId};
use crate::config::CombatConfig;
use crate::events::{CombatEvent, EventQueueError, EventSender};
use crate::host::world::InMemoryWorld;
use crate::host::Location;
use crate::metrics::Metrics;
use crate::util::vec3::Vec3;

pub const HELP: &str = "\
join <name> <zone> <x> <y> <z>   connect a participant
quit <name>                      disconnect a participant
move <name> <zone> <x> <y> <z>   teleport a participant
hit <attacker> <victim>          attacker damages victim in attacker's zone
swing <name>                     attack swing that hit nothing
die <name>                       participant dies where they stand
mode <name> <fast|traditional>   set stored combat preference
forget <name>                    drop stored preference (back to default)
who <name>                       show one participant's combat state
reload                           re-read configuration from the environment
status                           controller summary (JSON)
metrics                          counters (JSON)
help                             this text";

/// Console errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsoleError {
    #[error("Unknown command '{0}' (try 'help')")]
    UnknownCommand(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
    #[error("Invalid category '{0}' (expected fast or traditional)")]
    InvalidCategory(String),
    #[error("No participant named '{0}'")]
    UnknownParticipant(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Could not queue event: {0}")]
    Queue(#[from] EventQueueError),
}

/// A parsed console command
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Join { name: String, location: Location },
    Quit { name: String },
    Move { name: String, location: Location },
    Hit { attacker: String, victim: String },
    Swing { name: String },
    Die { name: String },
    Mode { name: String, category: Category },
    Forget { name: String },
    Who { name: String },
    Reload,
    Status,
    Metrics,
    Help,
}

impl ConsoleCommand {
    /// Parse one line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        let parsed = match command.as_str() {
            "join" => {
                let (name, location) = name_and_location(&args, "join <name> <zone> <x> <y> <z>")?;
                ConsoleCommand::Join { name, location }
            }
            "move" | "tp" => {
                let (name, location) = name_and_location(&args, "move <name> <zone> <x> <y> <z>")?;
                ConsoleCommand::Move { name, location }
            }
            "quit" => ConsoleCommand::Quit {
                name: single(&args, "quit <name>")?,
            },
            "hit" | "damage" => match args.as_slice() {
                [attacker, victim] => ConsoleCommand::Hit {
                    attacker: attacker.to_string(),
                    victim: victim.to_string(),
                },
                _ => return Err(ConsoleError::Usage("hit <attacker> <victim>")),
            },
            "swing" => ConsoleCommand::Swing {
                name: single(&args, "swing <name>")?,
            },
            "die" | "death" => ConsoleCommand::Die {
                name: single(&args, "die <name>")?,
            },
            "mode" => match args.as_slice() {
                [name, category] => ConsoleCommand::Mode {
                    name: name.to_string(),
                    category: Category::from_str(category)
                        .map_err(|_| ConsoleError::InvalidCategory(category.to_string()))?,
                },
                _ => return Err(ConsoleError::Usage("mode <name> <fast|traditional>")),
            },
            "forget" => ConsoleCommand::Forget {
                name: single(&args, "forget <name>")?,
            },
            "who" => ConsoleCommand::Who {
                name: single(&args, "who <name>")?,
            },
            "reload" => ConsoleCommand::Reload,
            "status" => ConsoleCommand::Status,
            "metrics" => ConsoleCommand::Metrics,
            "help" | "?" => ConsoleCommand::Help,
            other => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };

        Ok(Some(parsed))
    }
}

fn single(args: &[&str], usage: &'static str) -> Result<String, ConsoleError> {
    match args {
        [name] => Ok(name.to_string()),
        _ => Err(ConsoleError::Usage(usage)),
    }
}

fn name_and_location(args: &[&str], usage: &'static str) -> Result<(String, Location), ConsoleError> {
    match args {
        [name, zone, x, y, z] => {
            let position = Vec3::new(number(x)?, number(y)?, number(z)?);
            Ok((name.to_string(), Location::new(*zone, position)))
        }
        _ => Err(ConsoleError::Usage(usage)),
    }
}

fn number(raw: &str) -> Result<f64, ConsoleError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConsoleError::InvalidNumber(raw.to_string()))
}

/// Where `reload` reads its configuration from
pub type ConfigSource = Arc<dyn Fn() -> CombatConfig + Send + Sync>;

/// Executes console commands against a world and controller
pub struct Console {
    world: Arc<InMemoryWorld>,
    controller: CombatModeController,
    metrics: Arc<Metrics>,
    events: EventSender,
    config_source: ConfigSource,
}

impl Console {
    pub fn new(
        world: Arc<InMemoryWorld>,
        controller: CombatModeController,
        metrics: Arc<Metrics>,
        events: EventSender,
    ) -> Self {
        Self {
            world,
            controller,
            metrics,
            events,
            config_source: Arc::new(CombatConfig::load_or_default),
        }
    }

    /// Replace the configuration source used by `reload`
    pub fn with_config_source(mut self, source: ConfigSource) -> Self {
        self.config_source = source;
        self
    }

    /// Parse and execute one line, returning any output to print
    pub fn run_line(&self, line: &str) -> Result<Option<String>, ConsoleError> {
        match ConsoleCommand::parse(line)? {
            Some(command) => self.execute(command),
            None => Ok(None),
        }
    }

    pub fn execute(&self, command: ConsoleCommand) -> Result<Option<String>, ConsoleError> {
        match command {
            ConsoleCommand::Join { name, location } => {
                let id = self.world.id_by_name(&name).unwrap_or_else(Uuid::new_v4);
                self.world.connect(id, name.clone(), location);
                self.events.try_send(CombatEvent::Join { id, name })?;
                Ok(None)
            }
            ConsoleCommand::Quit { name } => {
                let id = self.lookup(&name)?;
                self.world.disconnect(id);
                self.events.try_send(CombatEvent::Quit { id })?;
                Ok(None)
            }
            ConsoleCommand::Move { name, location } => {
                let id = self.lookup(&name)?;
                self.world.move_to(id, location);
                Ok(None)
            }
            ConsoleCommand::Hit { attacker, victim } => {
                let attacker = self.lookup(&attacker)?;
                let victim = self.lookup(&victim)?;
                let zone = self
                    .world
                    .location_of(attacker)
                    .map(|l| l.zone)
                    .unwrap_or_default();
                self.events.try_send(CombatEvent::Damage {
                    attacker,
                    victim,
                    zone,
                })?;
                Ok(None)
            }
            ConsoleCommand::Swing { name } => {
                let id = self.lookup(&name)?;
                self.events.try_send(CombatEvent::Swing { id })?;
                Ok(None)
            }
            ConsoleCommand::Die { name } => {
                let id = self.lookup(&name)?;
                let location = self
                    .world
                    .location_of(id)
                    .ok_or_else(|| ConsoleError::UnknownParticipant(name.clone()))?;
                self.events.try_send(CombatEvent::Death { id, location })?;
                Ok(None)
            }
            ConsoleCommand::Mode { name, category } => {
                let id = self.lookup(&name)?;
                self.controller.set_preference(id, category);
                Ok(Some(format!("{} now prefers {} combat", name, category)))
            }
            ConsoleCommand::Forget { name } => {
                let id = self.lookup(&name)?;
                match self.controller.remove_preference(id) {
                    Some(previous) => Ok(Some(format!(
                        "{} no longer prefers {} combat (now {})",
                        name,
                        previous,
                        self.controller.preference(id)
                    ))),
                    None => Ok(Some(format!("{} has no stored preference", name))),
                }
            }
            ConsoleCommand::Who { name } => {
                let id = self.lookup(&name)?;
                Ok(Some(self.describe(&name, id)))
            }
            ConsoleCommand::Reload => {
                let config = (self.config_source)();
                config.validate().map_err(ConsoleError::InvalidConfig)?;
                // World first so re-applied categories use the new speeds
                self.world.reload_config(config.clone());
                self.controller.reload_config(config);
                Ok(Some("Configuration reloaded".to_string()))
            }
            ConsoleCommand::Status => Ok(Some(
                serde_json::to_string_pretty(&self.controller.status())
                    .unwrap_or_else(|e| format!("status unavailable: {}", e)),
            )),
            ConsoleCommand::Metrics => Ok(Some(self.metrics.to_json())),
            ConsoleCommand::Help => Ok(Some(HELP.to_string())),
        }
    }

    fn lookup(&self, name: &str) -> Result<ParticipantId, ConsoleError> {
        self.world
            .id_by_name(name)
            .ok_or_else(|| ConsoleError::UnknownParticipant(name.to_string()))
    }

    fn describe(&self, name: &str, id: ParticipantId) -> String {
        let mut out = format!(
            "{}: prefers {}, applied {}",
            name,
            self.controller.preference(id),
            self.controller.applied_category(id)
        );
        if self.controller.is_in_pvp(id) {
            out.push_str(", in PvP");
            if let Some(age) = self.controller.pvp_duration(id) {
                out.push_str(&format!(" for {:.1}s", age.as_secs_f64()));
            }
            if let Some(deadline) = self.controller.timeout_deadline(id) {
                let left = deadline.saturating_duration_since(tokio::time::Instant::now());
                out.push_str(&format!(" ({:.1}s left)", left.as_secs_f64()));
            }
        }
        out
    }
}
