// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Index-addressed sector/object collections with stable slot ids and the
//! portal repair pass.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::{Sector, SectorId, Wall, WallLink, WorldObject};

/// Stable identifier of an object slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub(crate) u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Result of writing an entity at a requested position.
#[derive(Debug)]
pub struct Placement<I, T> {
    /// Stable id of the slot written.
    pub id: I,
    /// Position actually used (appends land at the end).
    pub position: usize,
    /// Content previously occupying the slot, when it was a replacement.
    pub previous: Option<T>,
}

/// A sector removed from the level.
#[derive(Debug)]
pub struct RemovedSector {
    /// Id of the removed slot.
    pub id: SectorId,
    /// Removed content.
    pub sector: Sector,
    /// Walls in remaining sectors whose portal link into the removed sector was
    /// cleared.
    pub unlinked: Vec<WallLink>,
}

/// Declared cross-reference that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceIssue {
    /// `Adjoin` names a sector index that does not exist.
    #[error("sector {sector} wall {wall}: adjoin target sector {target} does not exist")]
    MissingSector {
        /// Position of the sector declaring the portal.
        sector: usize,
        /// Wall index declaring the portal.
        wall: usize,
        /// Declared target sector index.
        target: i32,
    },
    /// `Mirror` names a wall the target sector does not have.
    #[error("sector {sector} wall {wall}: mirror wall {mirror} missing in sector {target}")]
    MissingMirror {
        /// Position of the sector declaring the portal.
        sector: usize,
        /// Wall index declaring the portal.
        wall: usize,
        /// Target sector position.
        target: usize,
        /// Declared mirror wall index.
        mirror: i32,
    },
    /// The portal target was removed later in the same patch.
    #[error("{sector} wall {wall}: adjoin target was deleted in the same patch")]
    TargetDeleted {
        /// Slot of the sector whose wall lost its link.
        sector: SectorId,
        /// Wall index that lost its link.
        wall: usize,
    },
}

/// Outcome of a repair pass.
#[derive(Debug, Default)]
pub struct RepairReport {
    /// Sectors outside the repaired set whose adjacency was touched.
    pub adjoined: BTreeSet<SectorId>,
    /// Declared references that could not be resolved.
    pub issues: Vec<ReferenceIssue>,
}

#[derive(Debug, Clone)]
struct Slots<T> {
    ids: Vec<u64>,
    items: Vec<T>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl<T> Slots<T> {
    fn position(&self, id: u64) -> Option<usize> {
        self.ids.iter().position(|&slot| slot == id)
    }

    /// Replace in place when `position` is occupied, otherwise append.
    fn put(&mut self, position: usize, item: T, fresh_id: u64) -> (u64, usize, Option<T>) {
        if let Some(slot) = self.items.get_mut(position) {
            let previous = std::mem::replace(slot, item);
            (self.ids[position], position, Some(previous))
        } else {
            self.ids.push(fresh_id);
            self.items.push(item);
            (fresh_id, self.items.len() - 1, None)
        }
    }

    fn remove(&mut self, position: usize) -> Option<(u64, T)> {
        if position >= self.items.len() {
            return None;
        }
        Some((self.ids.remove(position), self.items.remove(position)))
    }
}

/// The live level: sectors and objects plus resolved portal links.
#[derive(Debug, Clone, Default)]
pub struct Level {
    sectors: Slots<Sector>,
    objects: Slots<WorldObject>,
    next_id: u64,
}

impl Level {
    /// Create an empty level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a level from a full load and resolve every portal.
    pub fn from_parts(sectors: Vec<Sector>, objects: Vec<WorldObject>) -> (Self, RepairReport) {
        let mut level = Self::new();
        let mut all = BTreeSet::new();
        for sector in sectors {
            let end = level.sector_count();
            all.insert(level.put_sector(end, sector).id);
        }
        for object in objects {
            let end = level.object_count();
            level.put_object(end, object);
        }
        let report = level.repair(&all);
        (level, report)
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ── sectors ─────────────────────────────────────────────────────

    /// Number of sectors.
    pub fn sector_count(&self) -> usize {
        self.sectors.items.len()
    }

    /// Sectors in positional order.
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors.items
    }

    /// Sector at `position`.
    pub fn sector(&self, position: usize) -> Option<&Sector> {
        self.sectors.items.get(position)
    }

    /// Stable id of the sector at `position`.
    pub fn sector_id(&self, position: usize) -> Option<SectorId> {
        self.sectors.ids.get(position).copied().map(SectorId)
    }

    /// Current position of a sector slot.
    pub fn sector_position(&self, id: SectorId) -> Option<usize> {
        self.sectors.position(id.0)
    }

    /// Write `sector` at `position`, appending when `position` is past the end.
    ///
    /// A replacement keeps the slot id; portal links into the slot stay in
    /// place until the next [`repair`](Self::repair) over it.
    pub fn put_sector(&mut self, position: usize, sector: Sector) -> Placement<SectorId, Sector> {
        let fresh = self.fresh_id();
        let (id, position, previous) = self.sectors.put(position, sector, fresh);
        Placement {
            id: SectorId(id),
            position,
            previous,
        }
    }

    /// Remove the sector at `position` and clear every link into it.
    pub fn remove_sector(&mut self, position: usize) -> Option<RemovedSector> {
        let (raw, sector) = self.sectors.remove(position)?;
        let id = SectorId(raw);
        let mut unlinked = Vec::new();
        for (owner, other) in self.sectors.ids.iter().zip(self.sectors.items.iter_mut()) {
            for (index, wall) in other.walls.iter_mut().enumerate() {
                if wall.adjoined.is_some_and(|link| link.sector == id) {
                    wall.adjoined = None;
                    unlinked.push(WallLink {
                        sector: SectorId(*owner),
                        wall: index,
                    });
                }
            }
        }
        Some(RemovedSector {
            id,
            sector,
            unlinked,
        })
    }

    /// Resolved mirror of wall `wall` in the sector at `position`, as positions.
    pub fn adjoined_wall(&self, position: usize, wall: usize) -> Option<(usize, usize)> {
        let link = self.sector(position)?.walls.get(wall)?.adjoined?;
        Some((self.sector_position(link.sector)?, link.wall))
    }

    fn wall_mut(&mut self, link: WallLink) -> Option<&mut Wall> {
        let position = self.sector_position(link.sector)?;
        self.sectors.items[position].walls.get_mut(link.wall)
    }

    /// Rebuild derived references for the sectors in `updated`.
    ///
    /// Every wall of an updated sector gets its back-reference, inbound links
    /// held by other sectors are dropped, then each declared portal is linked
    /// reciprocally. A wall displaced from an existing link loses its side of
    /// it. Untouched sectors whose links changed, or that an updated wall points
    /// into, are reported as adjoined.
    pub fn repair(&mut self, updated: &BTreeSet<SectorId>) -> RepairReport {
        let before: Vec<Vec<Option<WallLink>>> = self
            .sectors
            .items
            .iter()
            .map(|sector| sector.walls.iter().map(|wall| wall.adjoined).collect())
            .collect();

        for (raw, sector) in self.sectors.ids.iter().zip(self.sectors.items.iter_mut()) {
            let owner = SectorId(*raw);
            let own = updated.contains(&owner);
            for wall in &mut sector.walls {
                if own {
                    wall.sector = Some(owner);
                    wall.adjoined = None;
                } else if wall.adjoined.is_some_and(|link| updated.contains(&link.sector)) {
                    wall.adjoined = None;
                }
            }
        }

        let mut report = RepairReport::default();
        for &id in updated {
            let Some(position) = self.sector_position(id) else {
                continue;
            };
            for index in 0..self.sectors.items[position].walls.len() {
                let (adjoin, mirror) = {
                    let wall = &self.sectors.items[position].walls[index];
                    (wall.adjoin, wall.mirror)
                };
                if adjoin == crate::NO_ADJOIN {
                    continue;
                }
                let Some(target) = usize::try_from(adjoin)
                    .ok()
                    .filter(|&t| t < self.sector_count())
                else {
                    report.issues.push(ReferenceIssue::MissingSector {
                        sector: position,
                        wall: index,
                        target: adjoin,
                    });
                    continue;
                };
                let Some(mirror_index) = usize::try_from(mirror)
                    .ok()
                    .filter(|&m| m < self.sectors.items[target].walls.len())
                else {
                    report.issues.push(ReferenceIssue::MissingMirror {
                        sector: position,
                        wall: index,
                        target,
                        mirror,
                    });
                    continue;
                };
                let target_id = SectorId(self.sectors.ids[target]);
                self.link(
                    WallLink { sector: id, wall: index },
                    WallLink {
                        sector: target_id,
                        wall: mirror_index,
                    },
                );
                if !updated.contains(&target_id) {
                    report.adjoined.insert(target_id);
                }
            }
        }

        for ((raw, sector), links) in self
            .sectors
            .ids
            .iter()
            .zip(&self.sectors.items)
            .zip(&before)
        {
            let id = SectorId(*raw);
            if updated.contains(&id) {
                continue;
            }
            if sector.walls.iter().map(|wall| wall.adjoined).ne(links.iter().copied()) {
                report.adjoined.insert(id);
            }
        }
        report
    }

    fn link(&mut self, a: WallLink, b: WallLink) {
        for (from, to) in [(a, b), (b, a)] {
            let previous = self
                .wall_mut(from)
                .and_then(|wall| wall.adjoined.replace(to));
            if let Some(stale) = previous.filter(|&p| p != to) {
                if let Some(wall) = self.wall_mut(stale) {
                    if wall.adjoined == Some(from) {
                        wall.adjoined = None;
                    }
                }
            }
        }
    }

    // ── objects ─────────────────────────────────────────────────────

    /// Number of objects.
    pub fn object_count(&self) -> usize {
        self.objects.items.len()
    }

    /// Objects in positional order.
    pub fn objects(&self) -> &[WorldObject] {
        &self.objects.items
    }

    /// Object at `position`.
    pub fn object(&self, position: usize) -> Option<&WorldObject> {
        self.objects.items.get(position)
    }

    /// Current position of an object slot.
    pub fn object_position(&self, id: ObjectId) -> Option<usize> {
        self.objects.position(id.0)
    }

    /// Write `object` at `position`, appending when `position` is past the end.
    pub fn put_object(
        &mut self,
        position: usize,
        object: WorldObject,
    ) -> Placement<ObjectId, WorldObject> {
        let fresh = self.fresh_id();
        let (id, position, previous) = self.objects.put(position, object, fresh);
        Placement {
            id: ObjectId(id),
            position,
            previous,
        }
    }

    /// Remove the object at `position`.
    pub fn remove_object(&mut self, position: usize) -> Option<(ObjectId, WorldObject)> {
        self.objects
            .remove(position)
            .map(|(raw, object)| (ObjectId(raw), object))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn portal_pair() -> Level {
        // 0.w1 <-> 1.w0, 2 isolated
        let (level, report) = Level::from_parts(
            vec![
                Sector::new(0, vec![Wall::solid(), Wall::new(1, 0)]),
                Sector::new(0, vec![Wall::new(0, 1), Wall::solid()]),
                Sector::new(1, vec![Wall::solid()]),
            ],
            vec![],
        );
        assert!(report.issues.is_empty());
        level
    }

    #[test]
    fn full_load_links_reciprocally_and_sets_back_refs() {
        let level = portal_pair();
        assert_eq!(level.adjoined_wall(0, 1), Some((1, 0)));
        assert_eq!(level.adjoined_wall(1, 0), Some((0, 1)));
        assert_eq!(level.adjoined_wall(2, 0), None);
        let owner = level.sector(1).unwrap().walls[0].sector();
        assert_eq!(owner, level.sector_id(1));
    }

    #[test]
    fn replace_keeps_slot_id_and_append_allocates() {
        let mut level = portal_pair();
        let id = level.sector_id(1).unwrap();
        let placed = level.put_sector(1, Sector::new(5, vec![]));
        assert_eq!(placed.id, id);
        assert!(placed.previous.is_some());
        let placed = level.put_sector(10, Sector::new(0, vec![]));
        assert_eq!(placed.position, 3);
        assert!(placed.previous.is_none());
        assert_ne!(Some(placed.id), level.sector_id(1));
    }

    #[test]
    fn repair_reports_untouched_neighbour_as_adjoined() {
        let mut level = portal_pair();
        let placed = level.put_sector(0, Sector::new(3, vec![Wall::new(1, 0)]));
        let report = level.repair(&BTreeSet::from([placed.id]));
        assert_eq!(level.adjoined_wall(0, 0), Some((1, 0)));
        assert_eq!(level.adjoined_wall(1, 0), Some((0, 0)));
        assert_eq!(report.adjoined, BTreeSet::from([level.sector_id(1).unwrap()]));
    }

    #[test]
    fn repair_drops_inbound_link_no_longer_declared() {
        let mut level = portal_pair();
        let placed = level.put_sector(0, Sector::new(0, vec![Wall::solid(), Wall::solid()]));
        let report = level.repair(&BTreeSet::from([placed.id]));
        assert_eq!(level.adjoined_wall(1, 0), None);
        assert!(report.adjoined.contains(&level.sector_id(1).unwrap()));
    }

    #[test]
    fn repair_reports_unresolvable_targets() {
        let mut level = portal_pair();
        let placed = level.put_sector(2, Sector::new(0, vec![Wall::new(7, 0), Wall::new(0, 9)]));
        let report = level.repair(&BTreeSet::from([placed.id]));
        assert_eq!(
            report.issues,
            vec![
                ReferenceIssue::MissingSector {
                    sector: 2,
                    wall: 0,
                    target: 7
                },
                ReferenceIssue::MissingMirror {
                    sector: 2,
                    wall: 1,
                    target: 0,
                    mirror: 9
                },
            ]
        );
        assert_eq!(level.adjoined_wall(2, 0), None);
    }

    #[test]
    fn relinking_a_mirror_unlinks_its_previous_partner() {
        let mut level = portal_pair();
        // sector 2 now claims 1.w0, which was linked to 0.w1
        let placed = level.put_sector(2, Sector::new(0, vec![Wall::new(1, 0)]));
        let report = level.repair(&BTreeSet::from([placed.id]));
        assert_eq!(level.adjoined_wall(1, 0), Some((2, 0)));
        assert_eq!(level.adjoined_wall(0, 1), None);
        let id0 = level.sector_id(0).unwrap();
        let id1 = level.sector_id(1).unwrap();
        assert_eq!(report.adjoined, BTreeSet::from([id0, id1]));
    }

    #[test]
    fn removal_clears_links_into_the_removed_sector() {
        let mut level = portal_pair();
        let id0 = level.sector_id(0).unwrap();
        let removed = level.remove_sector(1).unwrap();
        assert_eq!(removed.unlinked, vec![WallLink { sector: id0, wall: 1 }]);
        assert_eq!(level.adjoined_wall(0, 1), None);
        assert_eq!(level.sector_count(), 2);
        assert_eq!(level.sector(1).unwrap().layer, 1);
        assert!(level.remove_sector(5).is_none());
    }

    #[test]
    fn links_survive_removal_of_an_earlier_sector() {
        let (mut level, _) = Level::from_parts(
            vec![
                Sector::new(0, vec![Wall::solid()]),
                Sector::new(0, vec![Wall::new(2, 0)]),
                Sector::new(0, vec![Wall::new(1, 0)]),
            ],
            vec![],
        );
        level.remove_sector(0);
        assert_eq!(level.adjoined_wall(0, 0), Some((1, 0)));
        assert_eq!(level.adjoined_wall(1, 0), Some((0, 0)));
    }

    #[test]
    fn objects_replace_and_remove_by_position() {
        let mut level = Level::new();
        let a = level.put_object(0, WorldObject::default());
        let b = level.put_object(4, WorldObject::default());
        assert_eq!((a.position, b.position), (0, 1));
        let (removed, _) = level.remove_object(0).unwrap();
        assert_eq!(removed, a.id);
        assert_eq!(level.object_position(b.id), Some(0));
    }
}
