// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sector and wall documents.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{structural_key, EntityKey, GraphError};

/// Declared `Adjoin`/`Mirror` value meaning "no portal".
pub const NO_ADJOIN: i32 = -1;

const fn no_adjoin() -> i32 {
    NO_ADJOIN
}

/// Stable identifier of a sector slot.
///
/// Assigned when a sector is inserted and kept when the slot's content is
/// replaced. Unlike the slot's position it never shifts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectorId(pub(crate) u64);

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sector#{}", self.0)
    }
}

/// Resolved portal link: a wall inside a specific sector slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WallLink {
    /// Sector slot owning the wall.
    pub sector: SectorId,
    /// Wall index within that sector.
    pub wall: usize,
}

/// One wall of a sector.
///
/// `adjoin`/`mirror` are the declared cross-references as received; the
/// resolved link and the owning-sector back-reference are derived by the
/// repair pass and skipped by serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Wall {
    /// Target sector index, or [`NO_ADJOIN`].
    #[serde(default = "no_adjoin")]
    pub adjoin: i32,
    /// Index of the mirroring wall inside the target sector.
    #[serde(default = "no_adjoin")]
    pub mirror: i32,
    /// Remaining wall attributes (vertices, textures, flags, light), opaque here.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    #[serde(skip)]
    pub(crate) sector: Option<SectorId>,
    #[serde(skip)]
    pub(crate) adjoined: Option<WallLink>,
}

impl Wall {
    /// Wall with the given declared references and no other attributes.
    pub fn new(adjoin: i32, mirror: i32) -> Self {
        Self {
            adjoin,
            mirror,
            attributes: Map::new(),
            sector: None,
            adjoined: None,
        }
    }

    /// Solid wall (no portal).
    pub fn solid() -> Self {
        Self::new(NO_ADJOIN, NO_ADJOIN)
    }

    /// Sector slot owning this wall, once repaired.
    pub fn sector(&self) -> Option<SectorId> {
        self.sector
    }

    /// Resolved mirror wall, once repaired.
    pub fn adjoined(&self) -> Option<WallLink> {
        self.adjoined
    }

    /// Whether the wall declares a portal.
    pub fn declares_adjoin(&self) -> bool {
        self.adjoin != NO_ADJOIN
    }
}

// Content equality: derived links are projection state, not content.
impl PartialEq for Wall {
    fn eq(&self, other: &Self) -> bool {
        self.adjoin == other.adjoin
            && self.mirror == other.mirror
            && self.attributes == other.attributes
    }
}

/// A sector: an ordered wall loop plus scalar attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Sector {
    /// Optional sector name (INF scripts address sectors by name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Editor layer; drives visibility filtering.
    #[serde(default)]
    pub layer: i32,
    /// Walls in declaration order.
    #[serde(default)]
    pub walls: Vec<Wall>,
    /// Floor, ceiling, light level, flags, vertices and anything else the
    /// editor sends. Hashed and carried, never interpreted.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Sector {
    /// Sector on `layer` with the given walls and no other attributes.
    pub fn new(layer: i32, walls: Vec<Wall>) -> Self {
        Self {
            name: None,
            layer,
            walls,
            attributes: Map::new(),
        }
    }

    /// Decode a sector document. Cross-references stay unresolved.
    pub fn from_json(doc: &str) -> Result<Self, GraphError> {
        serde_json::from_str(doc).map_err(|source| GraphError::Decode {
            kind: "sector",
            source,
        })
    }

    /// Decode a sector from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        serde_json::from_value(value).map_err(|source| GraphError::Decode {
            kind: "sector",
            source,
        })
    }

    /// Structural key of the sector's serialized content.
    pub fn key(&self) -> Result<EntityKey, GraphError> {
        structural_key(self)
    }
}
