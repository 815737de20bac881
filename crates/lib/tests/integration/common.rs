//! Shared test helpers for integration tests.

use std::collections::BTreeMap;
use std::path::Path;

use acorn_appdef::images::{ContainerData, ImagesData};
use tempfile::TempDir;

/// Image data binding each `(name, image)` pair as a container.
pub fn container_images(entries: &[(&str, &str)]) -> ImagesData {
  ImagesData {
    containers: entries
      .iter()
      .map(|(name, image)| (name.to_string(), ContainerData::new(*image)))
      .collect::<BTreeMap<_, _>>(),
    ..Default::default()
  }
}

/// Isolated directory tree holding Acornfiles and build files.
pub struct TestTree {
  pub temp: TempDir,
}

impl TestTree {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the tree root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }
}
