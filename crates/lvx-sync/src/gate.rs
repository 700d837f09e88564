// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Regeneration gate: turns change sets into renderer calls.

use std::collections::HashMap;

use lvx_graph::{EntityKey, GraphError, Level, Sector, WorldObject};
use lvx_scene_port::{RenderHandle, RenderPort, Renderable};
use tracing::{debug, error, warn};

use crate::{ChangeSet, GateIssue, IdentityError, IdentityTracker};

/// What one regeneration did.
#[derive(Debug, Default)]
pub struct RegenReport {
    /// Sectors rendered.
    pub sectors: usize,
    /// Objects rendered.
    pub objects: usize,
    /// Whether the camera was moved to the player start.
    pub camera_moved: bool,
    /// Per-entity problems; the affected entity was skipped or left untracked.
    pub issues: Vec<GateIssue>,
}

/// Owns the renderer and every handle it has returned.
///
/// Live handles are tracked by structural key. A handle displaced by a key
/// collision is parked as an orphan under the same key; releasing the tracked
/// handle for that key promotes the most recent orphan, so every render stays
/// reachable until its content is gone.
#[derive(Debug)]
pub struct RegenerationGate<R> {
    renderer: R,
    tracker: IdentityTracker,
    orphans: HashMap<EntityKey, Vec<RenderHandle>>,
    visible_layer: Option<i32>,
}

impl<R: RenderPort> RegenerationGate<R> {
    /// Gate over `renderer`, showing every layer.
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            tracker: IdentityTracker::new(),
            orphans: HashMap::new(),
            visible_layer: None,
        }
    }

    /// Borrow the renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Live key → handle table.
    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    /// Handles displaced by key collisions and not yet released.
    pub fn orphan_count(&self) -> usize {
        self.orphans.values().map(Vec::len).sum()
    }

    /// Current layer filter.
    pub fn visible_layer(&self) -> Option<i32> {
        self.visible_layer
    }

    /// Change the layer filter and apply it immediately. Hidden renders stay
    /// alive.
    pub fn set_visible_layer(&mut self, layer: Option<i32>) {
        self.visible_layer = layer;
        self.renderer.set_visible_layer(layer);
    }

    /// Release the live render of `sector`, found by its content key.
    ///
    /// Returns `false` when nothing was tracked for that content.
    pub fn destroy_sector(&mut self, sector: &Sector) -> bool {
        self.destroy_keyed("sector", sector.key())
    }

    /// Release the live render of `object`, found by its content key.
    pub fn destroy_object(&mut self, object: &WorldObject) -> bool {
        self.destroy_keyed("object", object.key())
    }

    fn destroy_keyed(&mut self, kind: &'static str, key: Result<EntityKey, GraphError>) -> bool {
        let key = match key {
            Ok(key) => key,
            Err(err) => {
                warn!(kind, %err, "cannot compute key; previous render left alive");
                return false;
            }
        };
        match self.tracker.untrack(&key) {
            Some(handle) => {
                self.renderer.destroy(handle);
                if let Some(orphan) = self.promote_orphan(&key) {
                    debug!(kind, %key, %orphan, "orphan promoted");
                }
                true
            }
            None => {
                debug!(kind, %key, "no live render for key");
                false
            }
        }
    }

    fn promote_orphan(&mut self, key: &EntityKey) -> Option<RenderHandle> {
        let parked = self.orphans.get_mut(key)?;
        let orphan = parked.pop();
        if parked.is_empty() {
            self.orphans.remove(key);
        }
        let orphan = orphan?;
        if let Err(err) = self.tracker.track(*key, orphan) {
            error!(%err, "orphan promoted over a live handle");
        }
        Some(orphan)
    }

    /// Release every handle, tracked or orphaned.
    pub fn clear(&mut self) {
        for handle in self.tracker.drain() {
            self.renderer.destroy(handle);
        }
        for (_, parked) in self.orphans.drain() {
            for handle in parked {
                self.renderer.destroy(handle);
            }
        }
    }

    /// Render the entities named by `changes`, in ascending index order.
    ///
    /// Content-changed sectors already had their previous render released by
    /// the applier. Adjoined-only sectors keep their content, so their current
    /// render is released here before re-rendering. The layer filter is
    /// re-applied to everything afterwards.
    pub fn regenerate(
        &mut self,
        level: &Level,
        changes: &ChangeSet,
        update_camera: bool,
    ) -> RegenReport {
        let mut report = RegenReport::default();
        for index in changes.sectors.union(&changes.adjoined) {
            let Some(sector) = level.sector(*index) else {
                continue;
            };
            if !changes.sectors.contains(index) {
                self.destroy_sector(sector);
            }
            if self.render(*index, Renderable::Sector(sector), &mut report) {
                report.sectors += 1;
            }
        }
        for index in &changes.objects {
            let Some(object) = level.object(*index) else {
                continue;
            };
            if self.render(*index, Renderable::Object(object), &mut report) {
                report.objects += 1;
            }
        }
        if update_camera && report.objects > 0 {
            report.camera_moved = self.focus_player(level);
        }
        self.renderer.set_visible_layer(self.visible_layer);
        report
    }

    /// Release everything, then render the whole level.
    pub fn regenerate_all(&mut self, level: &Level, update_camera: bool) -> RegenReport {
        self.clear();
        let mut report = RegenReport::default();
        for (index, sector) in level.sectors().iter().enumerate() {
            if self.render(index, Renderable::Sector(sector), &mut report) {
                report.sectors += 1;
            }
        }
        for (index, object) in level.objects().iter().enumerate() {
            if self.render(index, Renderable::Object(object), &mut report) {
                report.objects += 1;
            }
        }
        if update_camera {
            report.camera_moved = self.focus_player(level);
        }
        self.renderer.set_visible_layer(self.visible_layer);
        report
    }

    fn render(&mut self, index: usize, entity: Renderable<'_>, report: &mut RegenReport) -> bool {
        let (kind, key) = match entity {
            Renderable::Sector(sector) => ("sector", sector.key()),
            Renderable::Object(object) => ("object", object.key()),
        };
        let key = match key {
            Ok(key) => key,
            Err(source) => {
                warn!(kind, index, %source, "cannot compute key; not rendering");
                report.issues.push(GateIssue::Key {
                    kind,
                    index,
                    source,
                });
                return false;
            }
        };
        let handle = match self.renderer.render(index, entity) {
            Ok(handle) => handle,
            Err(source) => {
                warn!(kind, index, %source, "render failed");
                report.issues.push(GateIssue::Render {
                    kind,
                    index,
                    source,
                });
                return false;
            }
        };
        if let Err(source) = self.tracker.track(key, handle) {
            let IdentityError::AlreadyTracked { previous, .. } = &source;
            error!(kind, index, %source, "structural key collision");
            self.orphans.entry(key).or_default().push(*previous);
            report.issues.push(GateIssue::Identity {
                kind,
                index,
                source,
            });
        }
        true
    }

    fn focus_player(&mut self, level: &Level) -> bool {
        match level.objects().iter().find(|object| object.is_player_start()) {
            Some(player) => {
                self.renderer
                    .focus_camera(player.position, player.euler_angles);
                true
            }
            None => {
                debug!("no player start; camera left in place");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lvx_graph::{Vec3, Wall};
    use lvx_scene_port::HeadlessRenderer;
    use std::collections::BTreeSet;

    fn sector(layer: i32) -> Sector {
        Sector::new(layer, vec![Wall::solid()])
    }

    fn player() -> WorldObject {
        WorldObject {
            logic: "PLAYER".into(),
            position: Vec3::new(1.0, 2.0, 3.0),
            ..WorldObject::default()
        }
    }

    fn level() -> Level {
        Level::from_parts(vec![sector(0), sector(1), sector(2)], vec![player()]).0
    }

    #[test]
    fn full_regeneration_renders_and_tracks_everything() {
        let level = level();
        let mut gate = RegenerationGate::new(HeadlessRenderer::new());
        gate.set_visible_layer(Some(1));
        let report = gate.regenerate_all(&level, true);
        assert_eq!((report.sectors, report.objects), (3, 1));
        assert!(report.camera_moved);
        assert!(report.issues.is_empty());
        assert_eq!(gate.tracker().len(), 4);
        let renderer = gate.renderer();
        assert_eq!(renderer.live_count(), 4);
        assert_eq!(renderer.visible_layer, Some(1));
        // sector on layer 1 and the object
        assert_eq!(renderer.visible_count(), 2);
        assert_eq!(renderer.camera.unwrap().0, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn full_regeneration_releases_previous_renders() {
        let level = level();
        let mut gate = RegenerationGate::new(HeadlessRenderer::new());
        gate.regenerate_all(&level, false);
        gate.regenerate_all(&level, false);
        let renderer = gate.renderer();
        assert_eq!(renderer.live_count(), 4);
        assert_eq!(renderer.destroy_count, 4);
        assert!(renderer.camera.is_none());
    }

    #[test]
    fn partial_regeneration_touches_only_the_change_set() {
        let level = level();
        let mut gate = RegenerationGate::new(HeadlessRenderer::new());
        gate.regenerate_all(&level, false);
        let changes = ChangeSet {
            adjoined: BTreeSet::from([2]),
            ..ChangeSet::default()
        };
        let report = gate.regenerate(&level, &changes, true);
        assert_eq!((report.sectors, report.objects), (1, 0));
        // adjoined-only sector: old render released, new one tracked
        let renderer = gate.renderer();
        assert_eq!(renderer.render_count, 5);
        assert_eq!(renderer.destroy_count, 1);
        assert_eq!(renderer.live_count(), 4);
        assert!(!report.camera_moved);
    }

    #[test]
    fn key_collision_keeps_newer_handle_and_orphans_the_old() {
        let level = Level::from_parts(vec![sector(0), sector(0)], vec![]).0;
        let mut gate = RegenerationGate::new(HeadlessRenderer::new());
        let report = gate.regenerate_all(&level, false);
        assert_eq!(report.sectors, 2);
        assert!(matches!(
            report.issues.as_slice(),
            [GateIssue::Identity { index: 1, .. }]
        ));
        assert_eq!(gate.tracker().len(), 1);
        assert_eq!(gate.orphan_count(), 1);
        gate.clear();
        assert_eq!(gate.renderer().live_count(), 0);
        assert_eq!(gate.orphan_count(), 0);
    }

    #[test]
    fn releasing_a_collided_key_promotes_its_orphan() {
        let twin = sector(0);
        let level = Level::from_parts(vec![twin.clone(), twin.clone()], vec![]).0;
        let mut gate = RegenerationGate::new(HeadlessRenderer::new());
        gate.regenerate_all(&level, false);
        let key = twin.key().unwrap();
        let newer = gate.tracker().lookup(&key).unwrap();

        assert!(gate.destroy_sector(&twin));
        let promoted = gate.tracker().lookup(&key).unwrap();
        assert_ne!(promoted, newer);
        assert_eq!(gate.orphan_count(), 0);
        assert_eq!(gate.renderer().live_count(), 1);

        assert!(gate.destroy_sector(&twin));
        assert!(!gate.destroy_sector(&twin));
        assert_eq!(gate.renderer().live_count(), 0);
        assert_eq!(gate.renderer().stale_destroys, 0);
    }

    #[test]
    fn layer_change_hides_without_destroying() {
        let level = level();
        let mut gate = RegenerationGate::new(HeadlessRenderer::new());
        gate.regenerate_all(&level, false);
        assert_eq!(gate.renderer().visible_count(), 4);

        gate.set_visible_layer(Some(2));
        assert_eq!(gate.visible_layer(), Some(2));
        assert_eq!(gate.renderer().visible_count(), 2);
        assert_eq!(gate.renderer().live_count(), 4);
        assert_eq!(gate.renderer().destroy_count, 0);

        gate.regenerate(&level, &ChangeSet::default(), false);
        assert_eq!(gate.renderer().visible_layer, Some(2));
    }

    #[test]
    fn destroy_of_untracked_content_is_a_no_op() {
        let mut gate = RegenerationGate::new(HeadlessRenderer::new());
        assert!(!gate.destroy_sector(&sector(9)));
        assert_eq!(gate.renderer().stale_destroys, 0);
    }
}
