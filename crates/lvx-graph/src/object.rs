// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! World object documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{structural_key, EntityKey, GraphError};

/// Three-component vector as sent by the editor (`X`/`Y`/`Z`, any case).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    #[serde(rename = "X", alias = "x", default)]
    pub x: f32,
    /// Y component.
    #[serde(rename = "Y", alias = "y", default)]
    pub y: f32,
    /// Z component.
    #[serde(rename = "Z", alias = "z", default)]
    pub z: f32,
}

impl Vec3 {
    /// Construct from components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Difficulty levels an object spawns on.
///
/// Encoded on the wire as the raw ordinal. Ordinals outside the known set are
/// normalized to [`Difficulty::EasyMediumHard`]; editors encode this field as a
/// bare integer that can drift from the enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Difficulty {
    /// Easy and medium.
    EasyMedium,
    /// Easy only.
    Easy,
    /// All difficulties.
    #[default]
    EasyMediumHard,
    /// Medium and hard.
    MediumHard,
    /// Hard only.
    Hard,
}

impl Difficulty {
    /// Map a raw ordinal to a known difficulty.
    pub const fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            -2 => Some(Self::EasyMedium),
            -1 => Some(Self::Easy),
            1 => Some(Self::EasyMediumHard),
            2 => Some(Self::MediumHard),
            3 => Some(Self::Hard),
            _ => None,
        }
    }

    /// Raw ordinal.
    pub const fn raw(self) -> i64 {
        match self {
            Self::EasyMedium => -2,
            Self::Easy => -1,
            Self::EasyMediumHard => 1,
            Self::MediumHard => 2,
            Self::Hard => 3,
        }
    }
}

impl From<i64> for Difficulty {
    fn from(raw: i64) -> Self {
        Self::from_raw(raw).unwrap_or_default()
    }
}

impl From<Difficulty> for i64 {
    fn from(value: Difficulty) -> Self {
        value.raw()
    }
}

/// An object placed in the level (enemy, pickup, scenery, player start...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorldObject {
    /// Object class (`SPRITE`, `FRAME`, `3D`, `SPIRIT`, `SAFE`, `SOUND`).
    #[serde(default)]
    pub class: String,
    /// Resource the class draws from, if any.
    #[serde(default)]
    pub data: String,
    /// World position.
    #[serde(default)]
    pub position: Vec3,
    /// Pitch, yaw and roll in degrees.
    #[serde(default)]
    pub euler_angles: Vec3,
    /// Difficulty levels the object appears on.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Logic script tag.
    #[serde(default)]
    pub logic: String,
    /// Anything else the editor sends.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl WorldObject {
    /// Decode an object document, normalizing the difficulty ordinal.
    pub fn from_json(doc: &str) -> Result<Self, GraphError> {
        serde_json::from_str(doc).map_err(|source| GraphError::Decode {
            kind: "object",
            source,
        })
    }

    /// Decode an object from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        serde_json::from_value(value).map_err(|source| GraphError::Decode {
            kind: "object",
            source,
        })
    }

    /// Structural key of the object's serialized content.
    pub fn key(&self) -> Result<EntityKey, GraphError> {
        structural_key(self)
    }

    /// Whether the logic script marks this object as the player start.
    pub fn is_player_start(&self) -> bool {
        self.logic
            .split_whitespace()
            .any(|token| token.eq_ignore_ascii_case("player"))
    }
}
