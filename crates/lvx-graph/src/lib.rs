// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Live level graph shared across lvx tools.
//!
//! Pure data: sectors (each owning an ordered wall list), world objects, and the
//! portal links between walls of different sectors. Positions in the sector and
//! object collections are volatile; every slot also carries a stable id so that
//! links survive inserts and removals. Content identity is a structural key
//! (BLAKE3 over canonical CBOR) computed from the serialized form only.
//!
//! Portal links are never decoded from input. Documents carry declared
//! `Adjoin`/`Mirror` indices; [`Level::repair`] turns those into reciprocal
//! [`WallLink`]s in a second pass.

use thiserror::Error;

mod key;
mod level;
mod object;
mod sector;

pub use key::{structural_key, EntityKey};
pub use level::{Level, ObjectId, Placement, ReferenceIssue, RemovedSector, RepairReport};
pub use object::{Difficulty, Vec3, WorldObject};
pub use sector::{Sector, SectorId, Wall, WallLink, NO_ADJOIN};

/// Error type for graph decoding and hashing.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A sector or object document could not be decoded.
    #[error("malformed {kind} document: {source}")]
    Decode {
        /// Entity kind being decoded (`"sector"` or `"object"`).
        kind: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Canonical encoding for structural hashing failed.
    #[error("canonical encode failed: {0}")]
    Encode(String),
}
