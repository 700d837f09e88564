// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port contracts between the lvx sync engine and its collaborators.
//!
//! The engine never draws and never reads archives itself. It talks to a
//! [`RenderPort`] (render, destroy, layer visibility, camera) and a
//! [`LevelSource`] (archive mount, level list, full level load). Adapters for
//! headless runs and tests live here too: [`HeadlessRenderer`] and
//! [`MemoryLevelSource`].
//!
//! # Design Principles
//!
//! - **Renderers are dumb**: they receive whole entities and return a handle.
//!   Nothing is patched in place; a changed entity is destroyed and re-rendered.
//! - **Handles are opaque**: the engine only stores and returns them.

use thiserror::Error;

mod headless;
mod memory;
mod port;
mod source;

pub use headless::{HeadlessRenderer, LiveRender};
pub use memory::MemoryLevelSource;
pub use port::{RenderHandle, RenderPort, Renderable};
pub use source::{LevelData, LevelSource};

/// Error type for render calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The entity could not be turned into drawable output.
    #[error("render failed: {0}")]
    Backend(String),
}

/// Error type for level loading.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No level exists at the requested index.
    #[error("no level at index {0}")]
    NoSuchLevel(usize),
    /// A named archive or file could not be found.
    #[error("not found: {0}")]
    NotFound(String),
    /// I/O failure while reading level data.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Level data was present but malformed.
    #[error("malformed level data in {file}: {message}")]
    Malformed {
        /// File the data came from.
        file: String,
        /// Decoder message.
        message: String,
    },
}
