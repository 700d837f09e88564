// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Patch applier: mutates the level and reports what changed.

use std::collections::BTreeSet;

use lvx_app_core::warnings::LoadWarnings;
use lvx_graph::{Level, ReferenceIssue, Sector, WorldObject};
use lvx_scene_port::{LevelData, LevelSource, LoadError, RenderPort};
use tracing::{debug, info, warn};

use crate::{Batch, EntryError, Envelope, RegenerationGate};

/// Positions touched by one patch, resolved after all deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Sectors whose content was written.
    pub sectors: BTreeSet<usize>,
    /// Sectors whose portal links changed while their content did not.
    pub adjoined: BTreeSet<usize>,
    /// Objects whose content was written.
    pub objects: BTreeSet<usize>,
    /// Sectors removed.
    pub sectors_removed: usize,
    /// Objects removed.
    pub objects_removed: usize,
}

impl ChangeSet {
    /// Returns `true` when the patch neither wrote nor removed anything.
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
            && self.adjoined.is_empty()
            && self.objects.is_empty()
            && self.sectors_removed == 0
            && self.objects_removed == 0
    }
}

/// How an envelope was applied.
#[derive(Debug)]
pub enum Applied {
    /// The level was replaced by a full load.
    Reloaded {
        /// Position in the level list.
        index: usize,
        /// Level name from the level list.
        name: String,
    },
    /// The level was patched in place.
    Patched(ChangeSet),
}

/// Applies one envelope to a level.
///
/// Borrows every collaborator for the duration of one request. Previous
/// renders of replaced or deleted entities are released through the gate
/// before the level changes, while their old content is still at hand.
pub struct PatchApplier<'a, R, S> {
    level: &'a mut Level,
    gate: &'a mut RegenerationGate<R>,
    source: &'a mut S,
    warnings: &'a mut LoadWarnings,
    origin: &'a str,
}

impl<'a, R: RenderPort, S: LevelSource> PatchApplier<'a, R, S> {
    /// Bind an applier; `origin` names the level in recorded warnings.
    pub fn new(
        level: &'a mut Level,
        gate: &'a mut RegenerationGate<R>,
        source: &'a mut S,
        warnings: &'a mut LoadWarnings,
        origin: &'a str,
    ) -> Self {
        Self {
            level,
            gate,
            source,
            warnings,
            origin,
        }
    }

    /// Apply `envelope`.
    ///
    /// Only a failed reload returns an error; the level is then unchanged.
    /// Entry and reference problems are recorded as warnings and skipped.
    pub fn apply(&mut self, envelope: &Envelope) -> Result<Applied, LoadError> {
        if envelope.reset {
            return self.reload(envelope);
        }
        let mut changes = ChangeSet::default();
        if let Some(batch) = &envelope.sectors {
            self.apply_sectors(batch, &mut changes);
        }
        if let Some(batch) = &envelope.objects {
            self.apply_objects(batch, &mut changes);
        }
        Ok(Applied::Patched(changes))
    }

    fn reload(&mut self, envelope: &Envelope) -> Result<Applied, LoadError> {
        let wanted = envelope.lev_path.as_deref().unwrap_or_default();
        let (index, name, data) = match self.fetch(envelope.gob_path.as_deref(), wanted) {
            Ok(loaded) => loaded,
            Err(err) => {
                self.warnings.error(wanted, err.to_string());
                return Err(err);
            }
        };
        let (level, report) = Level::from_parts(data.sectors, data.objects);
        *self.level = level;
        for issue in report.issues {
            warn!(level = %name, %issue, "unresolved portal");
            self.warnings.warn(name.as_str(), issue.to_string());
        }
        info!(
            level = %name,
            index,
            sectors = self.level.sector_count(),
            objects = self.level.object_count(),
            "level loaded"
        );
        Ok(Applied::Reloaded { index, name })
    }

    fn fetch(
        &mut self,
        archive: Option<&str>,
        wanted: &str,
    ) -> Result<(usize, String, LevelData), LoadError> {
        if let Some(archive) = archive {
            self.source.mount_archive(archive)?;
        }
        let index = if let Some(index) = self.source.find_level(wanted)? {
            index
        } else {
            warn!(level = wanted, "level not in level list; using the first one");
            0
        };
        let name = self
            .source
            .level_names()?
            .get(index)
            .cloned()
            .unwrap_or_else(|| wanted.to_owned());
        let data = self.source.load_level(index)?;
        Ok((index, name, data))
    }

    fn apply_sectors(&mut self, batch: &Batch, changes: &mut ChangeSet) {
        let mut updated = BTreeSet::new();
        for (&index, document) in &batch.updates {
            let sector = match Sector::from_json(document) {
                Ok(sector) => sector,
                Err(source) => {
                    self.skip(EntryError::Decode {
                        kind: "sector",
                        index,
                        source,
                    });
                    continue;
                }
            };
            if let Some(old) = self.level.sector(index) {
                self.gate.destroy_sector(old);
            }
            let placed = self.level.put_sector(index, sector);
            debug!(index, position = placed.position, id = %placed.id, "sector written");
            updated.insert(placed.id);
        }

        let report = self.level.repair(&updated);
        for issue in report.issues {
            self.reference(&issue);
        }
        let mut adjoined = report.adjoined;

        let count = self.level.sector_count();
        for position in self.deletion_order("sector", &batch.deletions, count) {
            if let Some(old) = self.level.sector(position) {
                self.gate.destroy_sector(old);
            }
            let Some(removed) = self.level.remove_sector(position) else {
                continue;
            };
            debug!(position, id = %removed.id, "sector removed");
            updated.remove(&removed.id);
            adjoined.remove(&removed.id);
            for link in removed.unlinked {
                if updated.contains(&link.sector) {
                    self.reference(&ReferenceIssue::TargetDeleted {
                        sector: link.sector,
                        wall: link.wall,
                    });
                } else {
                    adjoined.insert(link.sector);
                }
            }
            changes.sectors_removed += 1;
        }

        changes.sectors = updated
            .iter()
            .filter_map(|&id| self.level.sector_position(id))
            .collect();
        changes.adjoined = adjoined
            .iter()
            .filter_map(|&id| self.level.sector_position(id))
            .filter(|position| !changes.sectors.contains(position))
            .collect();
    }

    fn apply_objects(&mut self, batch: &Batch, changes: &mut ChangeSet) {
        let mut updated = BTreeSet::new();
        for (&index, document) in &batch.updates {
            let object = match WorldObject::from_json(document) {
                Ok(object) => object,
                Err(source) => {
                    self.skip(EntryError::Decode {
                        kind: "object",
                        index,
                        source,
                    });
                    continue;
                }
            };
            if let Some(old) = self.level.object(index) {
                self.gate.destroy_object(old);
            }
            let placed = self.level.put_object(index, object);
            debug!(index, position = placed.position, "object written");
            updated.insert(placed.id);
        }

        let count = self.level.object_count();
        for position in self.deletion_order("object", &batch.deletions, count) {
            if let Some(old) = self.level.object(position) {
                self.gate.destroy_object(old);
            }
            if let Some((id, _)) = self.level.remove_object(position) {
                updated.remove(&id);
                changes.objects_removed += 1;
            }
        }

        changes.objects = updated
            .iter()
            .filter_map(|&id| self.level.object_position(id))
            .collect();
    }

    /// Valid, distinct positions from `requested`, highest first.
    ///
    /// Removing from the top down keeps every lower pending position valid.
    fn deletion_order(&mut self, kind: &'static str, requested: &[i64], count: usize) -> Vec<usize> {
        let mut positions = Vec::with_capacity(requested.len());
        for &index in requested {
            match usize::try_from(index).ok().filter(|&position| position < count) {
                Some(position) => positions.push(position),
                None => self.skip(EntryError::OutOfRange { kind, index, count }),
            }
        }
        positions.sort_unstable();
        positions.dedup();
        positions.reverse();
        positions
    }

    fn skip(&mut self, err: EntryError) {
        warn!(%err, "patch entry skipped");
        self.warnings.warn(self.origin, err.to_string());
    }

    fn reference(&mut self, issue: &ReferenceIssue) {
        warn!(%issue, "portal reference unresolved");
        self.warnings.warn(self.origin, issue.to_string());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use lvx_scene_port::{HeadlessRenderer, MemoryLevelSource};
    use serde_json::json;

    struct Rig {
        level: Level,
        gate: RegenerationGate<HeadlessRenderer>,
        source: MemoryLevelSource,
        warnings: LoadWarnings,
    }

    impl Rig {
        fn new(data: LevelData) -> Self {
            let source = MemoryLevelSource::new(vec![("SECBASE.LEV".into(), data.clone())]);
            let (level, _) = Level::from_parts(data.sectors, data.objects);
            let mut gate = RegenerationGate::new(HeadlessRenderer::new());
            gate.regenerate_all(&level, false);
            Self {
                level,
                gate,
                source,
                warnings: LoadWarnings::default(),
            }
        }

        fn apply(&mut self, envelope: &serde_json::Value) -> Result<Applied, LoadError> {
            let envelope = Envelope::from_json(&envelope.to_string()).unwrap();
            PatchApplier::new(
                &mut self.level,
                &mut self.gate,
                &mut self.source,
                &mut self.warnings,
                "SECBASE.LEV",
            )
            .apply(&envelope)
        }

        fn patch(&mut self, envelope: &serde_json::Value) -> ChangeSet {
            match self.apply(envelope).unwrap() {
                Applied::Patched(changes) => changes,
                Applied::Reloaded { .. } => panic!("expected a patch"),
            }
        }
    }

    fn sector_doc(name: &str, walls: &[(i32, i32)]) -> String {
        let walls: Vec<_> = walls
            .iter()
            .map(|(adjoin, mirror)| json!({"Adjoin": adjoin, "Mirror": mirror}))
            .collect();
        json!({"Name": name, "Layer": 0, "Walls": walls}).to_string()
    }

    fn named(name: &str, walls: &[(i32, i32)]) -> Sector {
        Sector::from_json(&sector_doc(name, walls)).unwrap()
    }

    fn six_sectors() -> LevelData {
        LevelData {
            sectors: (0..6).map(|i| named(&format!("s{i}"), &[(-1, -1)])).collect(),
            objects: vec![],
        }
    }

    #[test]
    fn replacing_a_sector_releases_its_old_render() {
        let mut rig = Rig::new(six_sectors());
        let changes = rig.patch(&json!({
            "Sectors": json!({"2": sector_doc("fresh", &[(-1, -1)])}).to_string(),
            "SectorsDel": "[]",
        }));
        assert_eq!(changes.sectors, BTreeSet::from([2]));
        assert_eq!(rig.level.sector(2).unwrap().name.as_deref(), Some("fresh"));
        assert_eq!(rig.gate.renderer().destroy_count, 1);
        assert_eq!(rig.gate.tracker().len(), 5);
    }

    #[test]
    fn index_past_the_end_appends() {
        let mut rig = Rig::new(six_sectors());
        let changes = rig.patch(&json!({
            "Sectors": json!({"6": sector_doc("a", &[]), "9": sector_doc("b", &[])}).to_string(),
            "SectorsDel": "[]",
        }));
        assert_eq!(rig.level.sector_count(), 8);
        assert_eq!(changes.sectors, BTreeSet::from([6, 7]));
        assert_eq!(rig.gate.renderer().destroy_count, 0);
    }

    #[test]
    fn new_portal_marks_its_untouched_target_as_adjoined() {
        let mut rig = Rig::new(six_sectors());
        let changes = rig.patch(&json!({
            "Sectors": json!({"1": sector_doc("door", &[(4, 0)])}).to_string(),
            "SectorsDel": "[]",
        }));
        assert_eq!(changes.sectors, BTreeSet::from([1]));
        assert_eq!(changes.adjoined, BTreeSet::from([4]));
        assert_eq!(rig.level.adjoined_wall(1, 0), Some((4, 0)));
        assert_eq!(rig.level.adjoined_wall(4, 0), Some((1, 0)));
    }

    #[test]
    fn deletions_run_highest_first_and_shift_change_positions() {
        let mut rig = Rig::new(six_sectors());
        let changes = rig.patch(&json!({
            "Sectors": json!({"5": sector_doc("last", &[])}).to_string(),
            "SectorsDel": "[3, 1, 4, 3]",
        }));
        let names: Vec<_> = rig
            .level
            .sectors()
            .iter()
            .map(|s| s.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["s0", "s2", "last"]);
        assert_eq!(changes.sectors, BTreeSet::from([2]));
        assert_eq!(changes.sectors_removed, 3);
        // three removed renders plus the replaced one
        assert_eq!(rig.gate.renderer().destroy_count, 4);
    }

    #[test]
    fn out_of_range_deletions_are_skipped_with_a_warning() {
        let mut rig = Rig::new(six_sectors());
        let changes = rig.patch(&json!({"Sectors": "", "SectorsDel": "[6, -1, 0]"}));
        assert_eq!(changes.sectors_removed, 1);
        assert_eq!(rig.level.sector_count(), 5);
        assert_eq!(rig.warnings.len(), 2);
    }

    #[test]
    fn deleting_a_portal_target_updated_in_the_same_patch_warns() {
        let mut rig = Rig::new(six_sectors());
        let changes = rig.patch(&json!({
            "Sectors": json!({"0": sector_doc("door", &[(5, 0)])}).to_string(),
            "SectorsDel": "[5]",
        }));
        assert_eq!(rig.level.adjoined_wall(0, 0), None);
        assert_eq!(changes.sectors, BTreeSet::from([0]));
        assert!(changes.adjoined.is_empty());
        let warning = rig.warnings.iter().next().unwrap();
        assert!(warning.message.contains("deleted in the same patch"));
    }

    #[test]
    fn deleting_a_linked_neighbour_marks_the_survivor_adjoined() {
        let mut data = six_sectors();
        data.sectors[0] = named("a", &[(1, 0)]);
        data.sectors[1] = named("b", &[(0, 0)]);
        let mut rig = Rig::new(data);
        let changes = rig.patch(&json!({"Sectors": "", "SectorsDel": "[1]"}));
        assert_eq!(changes.adjoined, BTreeSet::from([0]));
        assert_eq!(rig.level.adjoined_wall(0, 0), None);
    }

    #[test]
    fn undecodable_entry_is_skipped_and_the_rest_applies() {
        let mut rig = Rig::new(six_sectors());
        let changes = rig.patch(&json!({
            "Sectors": json!({"0": "{not json", "1": sector_doc("ok", &[])}).to_string(),
            "SectorsDel": "[]",
        }));
        assert_eq!(changes.sectors, BTreeSet::from([1]));
        assert_eq!(rig.level.sector(0).unwrap().name.as_deref(), Some("s0"));
        assert_eq!(rig.warnings.len(), 1);
    }

    #[test]
    fn objects_mirror_sector_handling() {
        let mut rig = Rig::new(LevelData {
            sectors: vec![],
            objects: vec![
                WorldObject::from_json(r#"{"Logic": "PLAYER"}"#).unwrap(),
                WorldObject::from_json(r#"{"Logic": "SCENERY"}"#).unwrap(),
            ],
        });
        let changes = rig.patch(&json!({
            "Objects": json!({"1": r#"{"Logic": "TROOP", "Difficulty": 42}"#}).to_string(),
            "ObjectsDel": "[0]",
        }));
        assert_eq!(rig.level.object_count(), 1);
        assert_eq!(changes.objects, BTreeSet::from([0]));
        assert_eq!(changes.objects_removed, 1);
        let object = rig.level.object(0).unwrap();
        assert_eq!(object.logic, "TROOP");
        assert_eq!(object.difficulty, lvx_graph::Difficulty::EasyMediumHard);
        assert_eq!(rig.gate.renderer().destroy_count, 2);
    }

    #[test]
    fn reset_replaces_the_level_from_the_source() {
        let mut rig = Rig::new(six_sectors());
        rig.patch(&json!({"Sectors": "", "SectorsDel": "[0, 1]"}));
        let applied = rig
            .apply(&json!({"Reset": "", "GOBPath": "MOD.GOB", "LEVPath": "secbase"}))
            .unwrap();
        assert!(matches!(applied, Applied::Reloaded { index: 0, ref name } if name == "SECBASE.LEV"));
        assert_eq!(rig.level.sector_count(), 6);
        assert_eq!(rig.source.mounted, vec!["MOD.GOB".to_owned()]);
        assert_eq!(rig.source.load_count, 1);
    }

    #[test]
    fn failed_reset_keeps_the_current_level() {
        let mut rig = Rig::new(six_sectors());
        rig.source = MemoryLevelSource::new(vec![]);
        let err = rig.apply(&json!({"Reset": "", "LEVPath": "GONE"})).unwrap_err();
        assert!(matches!(err, LoadError::NoSuchLevel(0)));
        assert_eq!(rig.level.sector_count(), 6);
        assert!(rig.warnings.has_fatal());
    }
}
