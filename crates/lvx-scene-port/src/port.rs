// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Render port trait defining the renderer contract.

use std::fmt;

use lvx_graph::{Sector, Vec3, WorldObject};

use crate::RenderError;

/// Opaque token for one rendered entity's resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderHandle(pub u64);

impl fmt::Display for RenderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Entity handed to the renderer.
#[derive(Clone, Copy, Debug)]
pub enum Renderable<'a> {
    /// A sector with its walls; portal links are already resolved.
    Sector(&'a Sector),
    /// A world object.
    Object(&'a WorldObject),
}

/// Render port trait.
///
/// # Design
///
/// Hexagonal port: the sync engine decides *what* to (re)generate; adapters
/// decide how it is drawn. Calls are synchronous and must not re-enter the
/// engine.
pub trait RenderPort {
    /// Produce drawable output for `entity`, currently at collection `index`.
    fn render(&mut self, index: usize, entity: Renderable<'_>) -> Result<RenderHandle, RenderError>;

    /// Release everything behind `handle`.
    fn destroy(&mut self, handle: RenderHandle);

    /// Show only sectors on `layer`; `None` shows every layer.
    ///
    /// Hidden entities stay alive.
    fn set_visible_layer(&mut self, layer: Option<i32>);

    /// Move the view to a world position and orientation.
    fn focus_camera(&mut self, position: Vec3, angles: Vec3);
}
