//! Files that feed an application's builds.
//!
//! The walk decodes the builder view of a definition, collects the Dockerfiles
//! and ignore files of every unpinned build and descends into the Acornfiles
//! of nested applications. A nested Acornfile that cannot be read or decoded
//! costs only its own subtree: it is logged and the walk carries on with its
//! siblings. Each nested Acornfile is walked at most once, which also stops
//! Acornfiles that refer to each other. Cancellation and timeouts end the
//! whole walk; nested Acornfiles are decoded under the parent's timeout.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{AppDefinition, AppDefinitionError};
use crate::appspec::{AcornBuilderSpec, ContainerImageBuilderSpec, ImageBuilderSpec};
use crate::consts::{ACORNFILE, DOCKERIGNORE, FUNCTION_BUILD_FILE};
use crate::util::path::{clean, clean_join, join_slash};

pub(crate) fn watch_files(
  definition: &AppDefinition,
  cwd: &Path,
  cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, AppDefinitionError> {
  let mut walk = Walk {
    files: BTreeSet::new(),
    visited: BTreeSet::new(),
    cancel,
  };
  walk.definition(definition, cwd)?;
  debug!(count = walk.files.len(), cwd = %cwd.display(), "computed watch files");
  Ok(walk.files.into_iter().collect())
}

struct Walk<'a> {
  files: BTreeSet<PathBuf>,
  visited: BTreeSet<PathBuf>,
  cancel: &'a CancellationToken,
}

impl Walk<'_> {
  fn definition(&mut self, definition: &AppDefinition, cwd: &Path) -> Result<(), AppDefinitionError> {
    if self.cancel.is_cancelled() {
      return Err(AppDefinitionError::Cancelled);
    }

    let spec = definition.builder_spec_cancellable(self.cancel)?;

    self.containers(&spec.containers, cwd);
    self.functions(&spec.functions, cwd);
    self.containers(&spec.jobs, cwd);
    self.images(&spec.images, cwd);
    self.acorns(definition, &spec.services, cwd)?;
    self.acorns(definition, &spec.acorns, cwd)?;
    Ok(())
  }

  fn add_dockerfile(&mut self, cwd: &Path, dockerfile: &str) -> PathBuf {
    let path = clean_join(cwd, dockerfile);
    self.files.insert(path.clone());
    path
  }

  fn containers(&mut self, builds: &BTreeMap<String, ContainerImageBuilderSpec>, cwd: &Path) {
    for spec in builds.values() {
      self.containers(&spec.sidecars, cwd);

      let Some(build) = &spec.build else {
        continue;
      };
      if !build.base_image.is_empty() {
        continue;
      }
      let dockerfile = self.add_dockerfile(cwd, &build.dockerfile);
      let dir = dockerfile.parent().unwrap_or(Path::new("."));
      self.files.insert(clean_join(dir, DOCKERIGNORE));
    }
  }

  fn functions(&mut self, builds: &BTreeMap<String, ContainerImageBuilderSpec>, cwd: &Path) {
    for (name, spec) in builds {
      self.containers(&spec.sidecars, cwd);

      let src = if spec.src.is_empty() { name } else { &spec.src };
      let dir = clean_join(cwd, src);
      self.files.insert(dir.join(FUNCTION_BUILD_FILE));
      self.files.insert(dir.join(DOCKERIGNORE));
    }
  }

  /// Image definitions contribute their own build file only; a nested
  /// Acornfile built as an image is not descended into.
  fn images(&mut self, builds: &BTreeMap<String, ImageBuilderSpec>, cwd: &Path) {
    for spec in builds.values() {
      if let Some(build) = &spec.build {
        self.add_dockerfile(cwd, &build.dockerfile);
      } else if let Some(build) = &spec.acorn_build {
        self.files.insert(clean_join(cwd, acornfile_path(&build.context, &build.acornfile)));
      }
    }
  }

  fn acorns(
    &mut self,
    parent: &AppDefinition,
    builds: &BTreeMap<String, AcornBuilderSpec>,
    cwd: &Path,
  ) -> Result<(), AppDefinitionError> {
    for (name, spec) in builds {
      let Some(build) = &spec.build else {
        continue;
      };

      let path = clean_join(cwd, acornfile_path(&build.context, &build.acornfile));
      let key = dunce::canonicalize(&path).unwrap_or_else(|_| path.clone());
      if !self.visited.insert(key) {
        debug!(acorn = %name, path = %path.display(), "nested Acornfile already visited");
        continue;
      }

      let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(err) => {
          warn!(acorn = %name, path = %path.display(), error = %err, "skipping unreadable nested Acornfile");
          continue;
        }
      };
      self.files.insert(path.clone());

      let nested = match AppDefinition::create(&data, parent.interpreter.clone(), parent.timeout) {
        Ok(nested) => nested,
        Err(err @ (AppDefinitionError::Cancelled | AppDefinitionError::Timeout(_))) => return Err(err),
        Err(err) => {
          warn!(acorn = %name, path = %path.display(), error = %err, "skipping invalid nested Acornfile");
          continue;
        }
      };

      let context = clean(&cwd.join(&build.context));
      match self.definition(&nested, &context) {
        Ok(()) => {}
        Err(err @ (AppDefinitionError::Cancelled | AppDefinitionError::Timeout(_))) => return Err(err),
        Err(err) => {
          warn!(acorn = %name, path = %path.display(), error = %err, "skipping nested Acornfile");
        }
      }
    }
    Ok(())
  }
}

/// The Acornfile of a nested build, defaulting to `Acornfile` in its context.
fn acornfile_path(context: &str, acornfile: &str) -> String {
  if acornfile.is_empty() {
    join_slash(context, ACORNFILE)
  } else {
    acornfile.to_string()
  }
}
