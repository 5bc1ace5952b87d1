//! Build units submitted to the orchestrator.

mod definition;

use std::sync::Arc;

use crate::version::VersionTag;

pub use definition::{BuildDefinition, IndexDefinition};

/// A definition paired with its name and declared version.
///
/// Name and version are captured once at construction and never change for
/// the lifetime of a run.
#[derive(Debug, Clone)]
pub struct BuildUnit {
  definition: Arc<dyn BuildDefinition>,
  name: String,
  version: Option<VersionTag>,
}

impl BuildUnit {
  pub fn new(definition: Arc<dyn BuildDefinition>) -> Self {
    let name = definition.name();
    let version = definition.declared_version();
    Self {
      definition,
      name,
      version,
    }
  }

  pub fn from_definition<D: BuildDefinition + 'static>(definition: D) -> Self {
    Self::new(Arc::new(definition))
  }

  /// Override the declared version.
  pub fn with_version(mut self, version: Option<VersionTag>) -> Self {
    self.version = version;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn version(&self) -> Option<&VersionTag> {
    self.version.as_ref()
  }

  pub fn definition(&self) -> &Arc<dyn BuildDefinition> {
    &self.definition
  }
}
