// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless renderer for services without a display and for tests.
//!
//! HeadlessRenderer tracks live renders in a HashMap without drawing anything.
//! Use it to verify which entities the engine regenerates and destroys.

use std::collections::HashMap;

use lvx_graph::Vec3;

use crate::{RenderError, RenderHandle, RenderPort, Renderable};

/// What a live handle stands for.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRender {
    /// `"sector"` or `"object"`.
    pub kind: &'static str,
    /// Collection index at render time.
    pub index: usize,
    /// Sector layer; objects carry none and are never layer-filtered.
    pub layer: Option<i32>,
    /// Whether the current layer filter shows it.
    pub visible: bool,
}

/// Headless render adapter.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    /// Live handles.
    pub live: HashMap<RenderHandle, LiveRender>,
    /// Number of render calls.
    pub render_count: u32,
    /// Number of destroy calls that released a live handle.
    pub destroy_count: u32,
    /// Destroy calls for handles that were not live.
    pub stale_destroys: u32,
    /// Last layer filter applied.
    pub visible_layer: Option<i32>,
    /// Last camera focus (position, angles).
    pub camera: Option<(Vec3, Vec3)>,
    next_handle: u64,
}

impl HeadlessRenderer {
    /// Create a new headless renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live handles for entities of `kind`, ordered by render index.
    pub fn live_of(&self, kind: &str) -> Vec<(RenderHandle, &LiveRender)> {
        let mut out: Vec<_> = self
            .live
            .iter()
            .filter(|(_, live)| live.kind == kind)
            .map(|(handle, live)| (*handle, live))
            .collect();
        out.sort_by_key(|(handle, live)| (live.index, *handle));
        out
    }

    /// Number of live handles currently shown.
    pub fn visible_count(&self) -> usize {
        self.live.values().filter(|live| live.visible).count()
    }

    fn shown(&self, layer: Option<i32>) -> bool {
        match (self.visible_layer, layer) {
            (Some(wanted), Some(layer)) => wanted == layer,
            _ => true,
        }
    }
}

impl RenderPort for HeadlessRenderer {
    fn render(&mut self, index: usize, entity: Renderable<'_>) -> Result<RenderHandle, RenderError> {
        let (kind, layer) = match entity {
            Renderable::Sector(sector) => ("sector", Some(sector.layer)),
            Renderable::Object(_) => ("object", None),
        };
        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        let visible = self.shown(layer);
        self.live.insert(
            handle,
            LiveRender {
                kind,
                index,
                layer,
                visible,
            },
        );
        self.render_count += 1;
        Ok(handle)
    }

    fn destroy(&mut self, handle: RenderHandle) {
        if self.live.remove(&handle).is_some() {
            self.destroy_count += 1;
        } else {
            self.stale_destroys += 1;
        }
    }

    fn set_visible_layer(&mut self, layer: Option<i32>) {
        self.visible_layer = layer;
        for live in self.live.values_mut() {
            live.visible = match (layer, live.layer) {
                (Some(wanted), Some(own)) => wanted == own,
                _ => true,
            };
        }
    }

    fn focus_camera(&mut self, position: Vec3, angles: Vec3) {
        self.camera = Some((position, angles));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lvx_graph::{Sector, WorldObject};

    #[test]
    fn handles_are_unique_and_tracked() {
        let mut renderer = HeadlessRenderer::new();
        let sector = Sector::new(0, vec![]);
        let a = renderer.render(0, Renderable::Sector(&sector)).unwrap();
        let b = renderer.render(0, Renderable::Sector(&sector)).unwrap();
        assert_ne!(a, b);
        assert_eq!(renderer.live_count(), 2);
        renderer.destroy(a);
        renderer.destroy(a);
        assert_eq!(renderer.live_count(), 1);
        assert_eq!(renderer.destroy_count, 1);
        assert_eq!(renderer.stale_destroys, 1);
    }

    #[test]
    fn layer_filter_hides_without_destroying() {
        let mut renderer = HeadlessRenderer::new();
        let low = Sector::new(0, vec![]);
        let high = Sector::new(1, vec![]);
        let object = WorldObject::default();
        renderer.render(0, Renderable::Sector(&low)).unwrap();
        renderer.render(1, Renderable::Sector(&high)).unwrap();
        renderer.render(0, Renderable::Object(&object)).unwrap();

        renderer.set_visible_layer(Some(1));
        assert_eq!(renderer.live_count(), 3);
        assert_eq!(renderer.visible_count(), 2);

        // renders after the filter change respect it
        renderer.render(2, Renderable::Sector(&low)).unwrap();
        assert_eq!(renderer.visible_count(), 2);

        renderer.set_visible_layer(None);
        assert_eq!(renderer.visible_count(), 4);
    }

    #[test]
    fn live_of_orders_by_index() {
        let mut renderer = HeadlessRenderer::new();
        let sector = Sector::new(0, vec![]);
        renderer.render(3, Renderable::Sector(&sector)).unwrap();
        renderer.render(1, Renderable::Sector(&sector)).unwrap();
        let indices: Vec<usize> = renderer
            .live_of("sector")
            .iter()
            .map(|(_, live)| live.index)
            .collect();
        assert_eq!(indices, vec![1, 3]);
    }
}
