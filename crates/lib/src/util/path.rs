//! Lexical path helpers.
//!
//! Nothing here touches the filesystem: paths declared in an Acornfile are
//! joined and cleaned purely by their components so that watch sets compare
//! equal regardless of how a document spelled them (`./Dockerfile`,
//! `sub/../Dockerfile`, ...).

use std::path::{Component, Path, PathBuf};

/// Clean a path by resolving `.` and `..` components.
///
/// A `..` that would climb above the start of a relative path is kept; one
/// that would climb above the root of an absolute path is dropped.
pub fn clean(path: &Path) -> PathBuf {
  let mut normalized = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => match normalized.components().next_back() {
        Some(Component::Normal(_)) => {
          normalized.pop();
        }
        Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
        _ => normalized.push(".."),
      },
      other => normalized.push(other),
    }
  }

  if normalized.as_os_str().is_empty() {
    PathBuf::from(".")
  } else {
    normalized
  }
}

/// Join `relative` onto `base` and clean the result.
pub fn clean_join(base: &Path, relative: impl AsRef<Path>) -> PathBuf {
  clean(&base.join(relative))
}

/// Join two slash-separated document paths, treating `"."` and `""` as empty.
///
/// Used for defaults written back into the document, which always use `/`
/// regardless of the host platform.
pub fn join_slash(dir: &str, name: &str) -> String {
  let dir = dir.trim_end_matches('/');
  if dir.is_empty() || dir == "." {
    name.to_string()
  } else {
    format!("{}/{}", dir, name)
  }
}
