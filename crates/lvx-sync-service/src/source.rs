// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Directory-backed level source.
//!
//! An archive is a directory; each level is a `<NAME>.json` file holding a
//! [`LevelData`] document in the same format patches use.

use std::fs;
use std::path::{Path, PathBuf};

use lvx_scene_port::{LevelData, LevelSource, LoadError};
use tracing::info;

pub(crate) struct FsLevelSource {
    root: Option<PathBuf>,
}

impl FsLevelSource {
    pub(crate) fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn level_files(&self) -> Result<Vec<PathBuf>, LoadError> {
        let Some(root) = &self.root else {
            return Ok(Vec::new());
        };
        let mut files: Vec<PathBuf> = fs::read_dir(root)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_json(path))
            .collect();
        files.sort();
        Ok(files)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl LevelSource for FsLevelSource {
    fn mount_archive(&mut self, path: &str) -> Result<(), LoadError> {
        let dir = PathBuf::from(path);
        if !dir.is_dir() {
            return Err(LoadError::NotFound(path.to_owned()));
        }
        info!(archive = %dir.display(), "archive mounted");
        self.root = Some(dir);
        Ok(())
    }

    fn level_names(&self) -> Result<Vec<String>, LoadError> {
        Ok(self
            .level_files()?
            .iter()
            .filter_map(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect())
    }

    fn load_level(&mut self, index: usize) -> Result<LevelData, LoadError> {
        let path = self
            .level_files()?
            .into_iter()
            .nth(index)
            .ok_or(LoadError::NoSuchLevel(index))?;
        let bytes = fs::read(&path)?;
        serde_json::from_slice(&bytes).map_err(|err| LoadError::Malformed {
            file: path.display().to_string(),
            message: err.to_string(),
        })
    }
}
