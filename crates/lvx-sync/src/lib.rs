// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Incremental level synchronization.
//!
//! An external editor sends partial edits (patch envelopes). [`SyncEngine`]
//! decodes them, applies them to the live [`lvx_graph::Level`] through the
//! [`PatchApplier`], and has the [`RegenerationGate`] re-render only what the
//! patch touched.
//!
//! # Flow
//!
//! ```text
//! body ─► Envelope ─► PatchApplier ─► ChangeSet ─► RegenerationGate ─► RenderPort
//!                        │   ▲                          │
//!                        ▼   │                          ▼
//!                      Level (portal repair)     IdentityTracker
//! ```
//!
//! Rendered output is located through the [`IdentityTracker`] by structural
//! key, never by position, because positions shift on insert and delete.
//!
//! # Error Policy
//!
//! Nothing here is retried. Envelope errors abort the request before any
//! mutation; entry, reference and identity problems skip or degrade the one
//! entity involved and land in the engine's [`LoadWarnings`](lvx_app_core::warnings::LoadWarnings).

mod applier;
mod engine;
mod envelope;
mod error;
mod gate;
mod tracker;

pub use applier::{Applied, ChangeSet, PatchApplier};
pub use engine::{Outcome, SyncEngine};
pub use envelope::{url_decode, Batch, Envelope, ACK_BODY};
pub use error::{EntryError, EnvelopeError, GateIssue, IdentityError};
pub use gate::{RegenReport, RegenerationGate};
pub use tracker::IdentityTracker;
