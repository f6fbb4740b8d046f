//! Player commands and the processor that validates and applies them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::entities::{keys, Entities, UnitRecord, Versioned};
use crate::error::{Error, Result, ValidationError};

/// Command body as clients send it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub unit: Option<String>,
    pub command: Option<String>,
    pub from_tile: Option<String>,
    pub to_tile: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Move,
}

impl std::str::FromStr for CommandKind {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "move" => Ok(CommandKind::Move),
            _ => Err(ValidationError::UnknownCommand),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Move {
        unit: String,
        from_tile: String,
        to_tile: String,
    },
}

impl Command {
    pub fn unit(&self) -> &str {
        match self {
            Command::Move { unit, .. } => unit,
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField(field))
}

impl TryFrom<CommandRequest> for Command {
    type Error = ValidationError;

    fn try_from(request: CommandRequest) -> Result<Self, Self::Error> {
        let kind: CommandKind = request
            .command
            .as_deref()
            .ok_or(ValidationError::UnknownCommand)?
            .parse()?;
        match kind {
            CommandKind::Move => Ok(Command::Move {
                unit: required(request.unit, "unit")?,
                from_tile: required(request.from_tile, "fromTile")?,
                to_tile: required(request.to_tile, "toTile")?,
            }),
        }
    }
}

/// A move that passed every check against the unit as it was read.
#[derive(Debug, Clone)]
pub struct ValidatedMove {
    unit: Versioned<UnitRecord>,
    to_tile: String,
}

impl ValidatedMove {
    pub fn unit_id(&self) -> &str {
        &self.unit.record.id
    }

    pub fn from_tile(&self) -> &str {
        &self.unit.record.tile
    }

    pub fn to_tile(&self) -> &str {
        &self.to_tile
    }
}

/// Per-unit write locks. A unit's lock is held from validation until its
/// occupant sets have caught up with the record, so moves of one unit never
/// interleave.
#[derive(Default)]
struct UnitLocks {
    by_unit: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UnitLocks {
    async fn acquire(&self, unit_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut by_unit = match self.by_unit.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            by_unit.entry(unit_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn clear(&self) {
        match self.by_unit.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

#[derive(Clone)]
pub struct CommandProcessor {
    entities: Entities,
    locks: Arc<UnitLocks>,
}

impl CommandProcessor {
    pub fn new(entities: Entities) -> Self {
        Self {
            entities,
            locks: Arc::new(UnitLocks::default()),
        }
    }

    /// Drops the lock table. Only safe while no command is running.
    pub fn forget_units(&self) {
        self.locks.clear();
    }

    /// Runs a command on behalf of `player_id`, who must own the unit.
    pub async fn execute(&self, player_id: &str, command: Command) -> Result<()> {
        self.entities.player(player_id).await?;
        let unit = self.entities.unit(command.unit()).await?;
        if unit.record.player != player_id {
            return Err(ValidationError::NotOwned {
                unit: unit.record.id,
                player: player_id.to_string(),
            }
            .into());
        }
        match command {
            Command::Move {
                unit,
                from_tile,
                to_tile,
            } => self.move_unit(&unit, &from_tile, &to_tile).await,
        }
    }

    pub async fn move_unit(&self, unit_id: &str, from_tile: &str, to_tile: &str) -> Result<()> {
        let _writer = self.locks.acquire(unit_id).await;
        let validated = self.validate_move(unit_id, from_tile, to_tile).await?;
        self.apply(validated).await
    }

    /// Checks a move against current state without writing anything.
    pub async fn validate_move(
        &self,
        unit_id: &str,
        from_tile: &str,
        to_tile: &str,
    ) -> Result<ValidatedMove> {
        let unit = self.entities.unit(unit_id).await?;
        if unit.record.tile != from_tile {
            debug!(unit = unit_id, claimed = from_tile, actual = %unit.record.tile, "move rejected: not at location");
            return Err(ValidationError::NotAtLocation {
                tile: from_tile.to_string(),
            }
            .into());
        }

        let origin = self.entities.tile(from_tile).await?;
        if !origin.neighbors.iter().any(|id| id == to_tile) {
            debug!(unit = unit_id, from = from_tile, to = to_tile, "move rejected: out of range");
            return Err(ValidationError::OutOfRange.into());
        }

        let target = self.entities.tile(to_tile).await?;
        if target.is_water() {
            debug!(unit = unit_id, to = to_tile, "move rejected: impassable");
            return Err(ValidationError::Impassable.into());
        }

        Ok(ValidatedMove {
            unit,
            to_tile: to_tile.to_string(),
        })
    }

    /// Applies a move validated earlier, under the unit's write lock.
    pub async fn commit(&self, validated: ValidatedMove) -> Result<()> {
        let _writer = self.locks.acquire(validated.unit_id()).await;
        self.apply(validated).await
    }

    /// The unit record is swapped in first, guarded by the version read during
    /// validation; only the winner of that swap touches the occupant sets.
    async fn apply(&self, validated: ValidatedMove) -> Result<()> {
        let ValidatedMove { unit, to_tile } = validated;
        let mut next = unit.record.clone();
        next.tile = to_tile.clone();
        next.last_move_time = Utc::now().timestamp_millis();
        next.version = unit.record.version + 1;

        if !self.entities.swap_unit(&unit, &next).await? {
            let current = self.entities.unit(&next.id).await?;
            warn!(
                unit = %next.id,
                expected_version = unit.record.version,
                found_version = current.record.version,
                "move lost a race with a concurrent command"
            );
            return Err(Error::Conflict { unit: next.id });
        }

        let store = self.entities.store();
        let from_key = keys::tile_occupants(&unit.record.tile);
        let to_key = keys::tile_occupants(&to_tile);
        if !store.smove(&from_key, &to_key, &next.id).await? {
            let current = self.entities.unit(&next.id).await?.record;
            if current.version == next.version {
                warn!(unit = %next.id, from = %unit.record.tile, "unit missing from origin occupants");
                store.sadd(&to_key, &next.id).await?;
            } else {
                warn!(unit = %next.id, found_version = current.version, "unit rewritten during move, leaving occupants to it");
            }
        }

        info!(unit = %next.id, from = %unit.record.tile, to = %to_tile, "unit moved");
        Ok(())
    }
}
