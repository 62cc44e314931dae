//! Fixture reader.
//!
//! Fixtures live in dated directories under a base directory:
//!
//! ```text
//! data/
//! ├── 2023-11-02/
//! └── 2024-01-15/          <- latest, used for the run
//!     ├── packs.json
//!     ├── <pack-id>.json
//!     └── <thumbnail>.png
//! ```
//!
//! A data directory name must start with an ISO date (`YYYY-MM-DD`) so that
//! lexicographic order is chronological. Anything else in the base directory
//! is ignored. The lexicographically last name wins.

use crate::error::FixtureError;
use crate::models::{Envelope, FixturePack, PackAssetsFixture, PacksFixture};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

pub const PACKS_FILE: &str = "packs.json";

/// Locates the latest data directory under a base directory
#[derive(Debug, Clone)]
pub struct FixtureReader {
    base_dir: PathBuf,
}

impl FixtureReader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Path of the lexicographically last date-stamped subdirectory
    pub fn latest_dir(&self) -> Result<PathBuf, FixtureError> {
        let entries = fs::read_dir(&self.base_dir).map_err(|source| FixtureError::Io {
            path: self.base_dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| FixtureError::Io {
                path: self.base_dir.clone(),
                source,
            })?;

            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();

            if is_dir && is_dated(&name) {
                names.push(name);
            } else {
                debug!(entry = %name, "Ignoring entry in fixture base directory");
            }
        }

        names.sort();
        names
            .pop()
            .map(|name| self.base_dir.join(name))
            .ok_or_else(|| FixtureError::NoDataDirectory(self.base_dir.clone()))
    }

    /// Resolve the data directory once for the whole run
    pub fn resolve(&self) -> Result<DataDir, FixtureError> {
        let path = self.latest_dir()?;
        info!(path = %path.display(), "Using fixture directory");
        Ok(DataDir { path })
    }
}

fn is_dated(name: &str) -> bool {
    name.get(..10)
        .map(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok())
        .unwrap_or(false)
}

/// A resolved data directory
#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read and parse a JSON file from the data directory
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, FixtureError> {
        let path = self.path.join(name);
        let raw = fs::read(&path).map_err(|source| FixtureError::Io {
            path: path.clone(),
            source,
        })?;

        serde_json::from_slice(&raw).map_err(|source| FixtureError::Parse { path, source })
    }

    /// Read a binary file from the data directory. `name` may contain
    /// subdirectories but no `..`, root or prefix components.
    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>, FixtureError> {
        let relative = Path::new(name);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained || name.is_empty() {
            return Err(FixtureError::OutsideDataDirectory(name.to_string()));
        }

        let path = self.path.join(relative);
        fs::read(&path).map_err(|source| FixtureError::Io { path, source })
    }

    /// Packs listed in `packs.json`
    pub fn read_packs(&self) -> Result<Vec<FixturePack>, FixtureError> {
        let envelope: Envelope<PacksFixture> = self.read_json(PACKS_FILE)?;
        if !envelope.ok {
            warn!(file = PACKS_FILE, "Fixture is flagged as not ok");
        }
        Ok(envelope.data.packs)
    }

    /// Assets of one pack from `<pack-id>.json`
    pub fn read_pack_assets(&self, pack_id: &str) -> Result<PackAssetsFixture, FixtureError> {
        let name = format!("{}.json", pack_id);
        let envelope: Envelope<PackAssetsFixture> = self.read_json(&name)?;
        if !envelope.ok {
            warn!(file = %name, "Fixture is flagged as not ok");
        }
        Ok(envelope.data)
    }
}
