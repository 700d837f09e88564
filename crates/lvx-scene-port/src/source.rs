// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Level source port: the full cold-load path.

use lvx_graph::{Sector, WorldObject};
use serde::{Deserialize, Serialize};

use crate::LoadError;

/// Everything a full load yields for one level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LevelData {
    /// Sectors in file order, cross-references unresolved.
    #[serde(default)]
    pub sectors: Vec<Sector>,
    /// Objects in file order.
    #[serde(default)]
    pub objects: Vec<WorldObject>,
}

/// Archive-backed level loader.
pub trait LevelSource {
    /// Make an archive's contents visible to later lookups.
    fn mount_archive(&mut self, path: &str) -> Result<(), LoadError>;

    /// Level names in level-list order.
    fn level_names(&self) -> Result<Vec<String>, LoadError>;

    /// Load the level at `index` in the level list.
    fn load_level(&mut self, index: usize) -> Result<LevelData, LoadError>;

    /// Position of `name` in the level list.
    ///
    /// Case-insensitive; a trailing `.LEV` on either side is ignored.
    fn find_level(&self, name: &str) -> Result<Option<usize>, LoadError> {
        let wanted = strip_lev(name);
        Ok(self
            .level_names()?
            .iter()
            .position(|candidate| strip_lev(candidate).eq_ignore_ascii_case(wanted)))
    }
}

fn strip_lev(name: &str) -> &str {
    let trimmed = name.trim();
    match trimmed.len().checked_sub(4) {
        Some(cut) if trimmed.is_char_boundary(cut) && trimmed[cut..].eq_ignore_ascii_case(".lev") => {
            &trimmed[..cut]
        }
        _ => trimmed,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::MemoryLevelSource;

    #[test]
    fn find_level_ignores_case_and_extension() {
        let source = MemoryLevelSource::new(vec![
            ("SECBASE".into(), LevelData::default()),
            ("TALAY".into(), LevelData::default()),
        ]);
        assert_eq!(source.find_level("talay.lev").unwrap(), Some(1));
        assert_eq!(source.find_level("SECBASE").unwrap(), Some(0));
        assert_eq!(source.find_level("ROBOTICS").unwrap(), None);
    }

    #[test]
    fn level_data_decodes_with_missing_collections() {
        let data: LevelData =
            serde_json::from_str(r#"{"Sectors": [{"Layer": 1, "Walls": []}]}"#).unwrap();
        assert_eq!(data.sectors.len(), 1);
        assert!(data.objects.is_empty());
    }
}
