// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory level source.

use crate::{LevelData, LevelSource, LoadError};

/// Level source over a fixed list of named levels.
///
/// Mounting only records the archive path. Load calls are counted so tests can
/// tell a full reload from a patch.
#[derive(Debug, Clone, Default)]
pub struct MemoryLevelSource {
    levels: Vec<(String, LevelData)>,
    /// Archives mounted so far, in order.
    pub mounted: Vec<String>,
    /// Number of successful `load_level` calls.
    pub load_count: u32,
}

impl MemoryLevelSource {
    /// Create a source over `(name, data)` pairs in level-list order.
    pub fn new(levels: Vec<(String, LevelData)>) -> Self {
        Self {
            levels,
            mounted: Vec::new(),
            load_count: 0,
        }
    }

    /// Replace the stored data for level `index` (simulates an editor save).
    pub fn set_level(&mut self, index: usize, data: LevelData) -> Result<(), LoadError> {
        let slot = self
            .levels
            .get_mut(index)
            .ok_or(LoadError::NoSuchLevel(index))?;
        slot.1 = data;
        Ok(())
    }
}

impl LevelSource for MemoryLevelSource {
    fn mount_archive(&mut self, path: &str) -> Result<(), LoadError> {
        self.mounted.push(path.to_owned());
        Ok(())
    }

    fn level_names(&self) -> Result<Vec<String>, LoadError> {
        Ok(self.levels.iter().map(|(name, _)| name.clone()).collect())
    }

    fn load_level(&mut self, index: usize) -> Result<LevelData, LoadError> {
        let data = self
            .levels
            .get(index)
            .map(|(_, data)| data.clone())
            .ok_or(LoadError::NoSuchLevel(index))?;
        self.load_count += 1;
        Ok(data)
    }
}
