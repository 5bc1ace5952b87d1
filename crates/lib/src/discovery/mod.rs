//! Discovery of build units from definition files on disk.
//!
//! Each path handed to [`DefinitionFiles`] is either a JSON file or a
//! directory walked recursively for `*.json` files. A file holds a single
//! [`IndexDefinition`] or an array of them. Units are returned in sorted path
//! order, then in file order, so repeated discovery yields the same sequence.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::unit::{BuildUnit, IndexDefinition};

#[derive(Debug, Error)]
pub enum DiscoveryError {
  #[error("definition path not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to walk definition directory: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("definition '{name}' in {path} has no maps")]
  NoMaps { path: PathBuf, name: String },
}

/// Source of build units for a run.
///
/// Sources must be restartable: calling `list_build_units` again yields the
/// same ordered sequence.
pub trait UnitSource {
  fn list_build_units(&self) -> Result<Vec<BuildUnit>, DiscoveryError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
  One(IndexDefinition),
  Many(Vec<IndexDefinition>),
}

/// Definition files and directories to scan.
#[derive(Debug, Clone, Default)]
pub struct DefinitionFiles {
  paths: Vec<PathBuf>,
}

impl DefinitionFiles {
  pub fn new(paths: Vec<PathBuf>) -> Self {
    Self { paths }
  }

  /// Every JSON file under the configured paths, in discovery order.
  pub fn files(&self) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = Vec::new();

    for path in &self.paths {
      if !path.exists() {
        return Err(DiscoveryError::NotFound(path.clone()));
      }

      if path.is_file() {
        files.push(path.clone());
        continue;
      }

      let mut found = Vec::new();
      for entry in WalkDir::new(path).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_json(entry.path()) {
          found.push(entry.into_path());
        }
      }
      found.sort();
      files.extend(found);
    }

    Ok(files)
  }

  fn load_file(path: &Path) -> Result<Vec<IndexDefinition>, DiscoveryError> {
    let content = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    let parsed: DefinitionFile = serde_json::from_str(&content).map_err(|source| DiscoveryError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let definitions = match parsed {
      DefinitionFile::One(def) => vec![def],
      DefinitionFile::Many(defs) => defs,
    };

    for def in &definitions {
      if def.maps.is_empty() {
        return Err(DiscoveryError::NoMaps {
          path: path.to_path_buf(),
          name: def.name.clone(),
        });
      }
    }

    Ok(definitions)
  }
}

fn is_json(path: &Path) -> bool {
  path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl UnitSource for DefinitionFiles {
  fn list_build_units(&self) -> Result<Vec<BuildUnit>, DiscoveryError> {
    let mut units = Vec::new();
    let mut seen = HashSet::new();

    for file in self.files()? {
      let definitions = Self::load_file(&file)?;
      debug!(path = %file.display(), count = definitions.len(), "loaded definitions");

      for def in definitions {
        let unit = BuildUnit::from_definition(def);
        if !seen.insert(unit.name().to_string()) {
          warn!(unit = unit.name(), path = %file.display(), "duplicate unit name in run");
        }
        units.push(unit);
      }
    }

    Ok(units)
  }
}
