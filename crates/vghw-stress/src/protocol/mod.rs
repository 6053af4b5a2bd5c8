//! Game server wire protocol.
//!
//! Frames are JSON text frames shaped as `{"type": "<TYPE>", "d": <data>}`.
//! Events flow from the server to us, commands from us to the server.

pub mod codec;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use codec::{decode_event, encode_command};

/// Position, velocity or acceleration in block units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct LevelInfo {
    pub number: u32,
    pub name: String,
    pub desc: String,
}

/// An entity is identified by where it started on the map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPositionData {
    pub initial_position: Vector,
    pub position: Vector,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalScore {
    pub level: u32,
    #[serde(with = "millis")]
    pub your_best: Duration,
    #[serde(with = "millis")]
    pub global_best: Duration,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LevelLeaderboard {
    pub level: u32,
    pub scores: Vec<LevelScore>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelScore {
    pub username: String,
    #[serde(with = "millis")]
    pub best_time: Duration,
}

/// Everything the server can send us.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    Hello {
        username: String,
        #[serde(default)]
        levels: Vec<LevelInfo>,
    },
    Warning {
        message: String,
    },
    LevelJoined {
        level: u32,
        #[serde(default)]
        info: LevelInfo,
        #[serde(default, rename = "raw")]
        raw_map: String,
    },
    LevelFinished {
        level: u32,
        won: bool,
        #[serde(with = "millis", rename = "time")]
        elapsed: Duration,
    },
    EntityMove {
        level: u32,
        entities: Vec<EntityPositionData>,
    },
    PersonalScore(Vec<PersonalScore>),
    LeaderboardUpdate(Vec<LevelLeaderboard>),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Hello { .. } => "HELLO",
            Event::Warning { .. } => "WARNING",
            Event::LevelJoined { .. } => "LEVEL_JOINED",
            Event::LevelFinished { .. } => "LEVEL_FINISHED",
            Event::EntityMove { .. } => "ENTITY_MOVE",
            Event::PersonalScore(_) => "PERSONAL_SCORE",
            Event::LeaderboardUpdate(_) => "LEADERBOARD_UPDATE",
        }
    }
}

/// Everything we send to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Ask the server to load a level for this session.
    Join { level: u32 },
    /// Report the player's new position. The server only applies it on its
    /// own tick, so sending faster than the tick rate is allowed.
    Move { position: Vector },
}

impl Command {
    pub fn command_type(&self) -> &'static str {
        match self {
            Command::Join { .. } => "JOIN",
            Command::Move { .. } => "MOVE",
        }
    }
}

/// Durations travel as integer milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
