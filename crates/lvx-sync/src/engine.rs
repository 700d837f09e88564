// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine façade: one envelope in, one outcome out.

use lvx_app_core::warnings::LoadWarnings;
use lvx_graph::Level;
use lvx_scene_port::{LevelSource, LoadError, RenderPort};
use tracing::{error, info, warn};

use crate::{
    Applied, ChangeSet, Envelope, EnvelopeError, GateIssue, PatchApplier, RegenReport,
    RegenerationGate,
};

/// Result of handling one envelope.
#[derive(Debug)]
pub enum Outcome {
    /// A full load replaced the level and everything was re-rendered.
    Reloaded {
        /// Level name from the level list.
        level: String,
        /// Regeneration summary.
        report: RegenReport,
    },
    /// The level was patched and the touched entities re-rendered.
    Patched {
        /// Positions touched.
        changes: ChangeSet,
        /// Regeneration summary.
        report: RegenReport,
    },
    /// A full load failed; the previous level is still live.
    ReloadFailed(LoadError),
}

/// Owns the live level, the regeneration gate, and the level source.
///
/// Handles one envelope at a time; callers serialize access.
#[derive(Debug)]
pub struct SyncEngine<R, S> {
    level: Level,
    gate: RegenerationGate<R>,
    source: S,
    warnings: LoadWarnings,
    level_name: String,
}

impl<R: RenderPort, S: LevelSource> SyncEngine<R, S> {
    /// Engine with an empty level.
    pub fn new(renderer: R, source: S) -> Self {
        Self {
            level: Level::new(),
            gate: RegenerationGate::new(renderer),
            source,
            warnings: LoadWarnings::default(),
            level_name: String::new(),
        }
    }

    /// Start with a layer filter.
    #[must_use]
    pub fn with_visible_layer(mut self, layer: Option<i32>) -> Self {
        self.gate.set_visible_layer(layer);
        self
    }

    /// Show only `layer` (`None` shows every layer). Applies at once and
    /// sticks across later regenerations.
    pub fn set_visible_layer(&mut self, layer: Option<i32>) {
        self.gate.set_visible_layer(layer);
    }

    /// Live level.
    pub fn level(&self) -> &Level {
        &self.level
    }

    /// Regeneration gate.
    pub fn gate(&self) -> &RegenerationGate<R> {
        &self.gate
    }

    /// Renderer behind the gate.
    pub fn renderer(&self) -> &R {
        self.gate.renderer()
    }

    /// Level source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Level source, mutably.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Accumulated warnings.
    pub fn warnings(&self) -> &LoadWarnings {
        &self.warnings
    }

    /// Warning summary for the current level, clearing the collector.
    pub fn take_warning_summary(&mut self) -> Option<String> {
        let name = if self.level_name.is_empty() {
            "level"
        } else {
            self.level_name.as_str()
        };
        self.warnings.take_summary(name)
    }

    /// Name of the loaded level; empty before the first load.
    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    /// Full load of `level` from `archive`, as if a `Reset` had arrived.
    pub fn load(&mut self, archive: Option<&str>, level: &str, update_camera: bool) -> Outcome {
        self.handle(&Envelope {
            gob_path: archive.map(str::to_owned),
            lev_path: Some(level.to_owned()),
            reset: true,
            update_camera,
            ..Envelope::default()
        })
    }

    /// Decode a raw request body and handle it.
    ///
    /// A body that does not decode changes nothing.
    pub fn handle_body(&mut self, body: &[u8]) -> Result<Outcome, EnvelopeError> {
        match Envelope::from_body(body) {
            Ok(envelope) => Ok(self.handle(&envelope)),
            Err(err) => {
                warn!(%err, "envelope rejected");
                Err(err)
            }
        }
    }

    /// Apply `envelope` and regenerate what it touched.
    pub fn handle(&mut self, envelope: &Envelope) -> Outcome {
        let applied = PatchApplier::new(
            &mut self.level,
            &mut self.gate,
            &mut self.source,
            &mut self.warnings,
            &self.level_name,
        )
        .apply(envelope);

        match applied {
            Ok(Applied::Reloaded { index, name }) => {
                let report = self.gate.regenerate_all(&self.level, envelope.update_camera);
                self.record(&report.issues);
                info!(
                    level = %name,
                    index,
                    sectors = report.sectors,
                    objects = report.objects,
                    "level regenerated"
                );
                self.level_name.clone_from(&name);
                Outcome::Reloaded {
                    level: name,
                    report,
                }
            }
            Ok(Applied::Patched(changes)) => {
                let report = self
                    .gate
                    .regenerate(&self.level, &changes, envelope.update_camera);
                self.record(&report.issues);
                info!(
                    sectors = report.sectors,
                    objects = report.objects,
                    sectors_removed = changes.sectors_removed,
                    objects_removed = changes.objects_removed,
                    "patch applied"
                );
                Outcome::Patched { changes, report }
            }
            Err(err) => {
                error!(%err, "reload failed; keeping the current level");
                Outcome::ReloadFailed(err)
            }
        }
    }

    fn record(&mut self, issues: &[GateIssue]) {
        for issue in issues {
            self.warnings.warn(self.level_name.as_str(), issue.to_string());
        }
    }
}
