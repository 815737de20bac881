//! Packaged application images.
//!
//! A built application is shipped as a tar archive holding the Acornfile, the
//! image data of the build, and a few optional records and blobs:
//!
//! | entry                | contents                         |
//! |----------------------|----------------------------------|
//! | `Acornfile`          | the source document (required)   |
//! | `images.json`        | [`ImagesData`]                   |
//! | `version.json`       | [`AppImageVersion`]              |
//! | `vcs.json`           | version control details          |
//! | `build.json`         | build arguments                  |
//! | `build-context.json` | build context details            |
//! | `README`             | readme text                      |
//! | `icon*`              | icon; the rest of the name is its suffix |
//!
//! Other entries are ignored.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::consts::{
  ACORNFILE, BUILD_CONTEXT_FILE, BUILD_DATA_FILE, ICON_FILE, IMAGE_DATA_FILE, README_FILE, VCS_DATA_FILE, VERSION_FILE,
};
use crate::images::ImagesData;
use crate::value::{DynamicValue, GenericMap};

/// Errors produced while reading a bundle.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
  #[error("failed to read bundle: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to decode bundle entry {entry}: {source}")]
  Json { entry: String, source: serde_json::Error },

  #[error("invalid image no Acornfile found")]
  MissingAcornfile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppImageVersion {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub tag: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub commit: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub acornfile_schema_version: String,
}

/// An application as built: its source plus what the build produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppImage {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub acornfile: String,
  #[serde(default)]
  pub image_data: ImagesData,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<AppImageVersion>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub vcs: Option<DynamicValue>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build_args: Option<GenericMap>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build_context: Option<DynamicValue>,
}

/// Blobs shipped next to the app image that are not part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataFiles {
  pub icon: Vec<u8>,
  pub icon_suffix: String,
  pub readme: Vec<u8>,
}

fn decode_entry<T: DeserializeOwned>(entry: &str, data: &[u8]) -> Result<T, BundleError> {
  serde_json::from_slice(data).map_err(|source| BundleError::Json {
    entry: entry.to_string(),
    source,
  })
}

fn is_known_entry(name: &str) -> bool {
  matches!(
    name,
    ACORNFILE | IMAGE_DATA_FILE | VERSION_FILE | VCS_DATA_FILE | BUILD_DATA_FILE | BUILD_CONTEXT_FILE | README_FILE
  ) || name.starts_with(ICON_FILE)
}

/// Read an app image and its data files from a bundle. Entries with other
/// names are skipped without being read.
pub fn app_image_from_tar<R: Read>(reader: R) -> Result<(AppImage, DataFiles), BundleError> {
  let mut archive = tar::Archive::new(reader);
  let mut image = AppImage::default();
  let mut files = DataFiles::default();

  for entry in archive.entries()? {
    let mut entry = entry?;
    let name = entry.path()?.to_string_lossy().into_owned();
    if !is_known_entry(&name) {
      trace!(entry = %name, "ignoring bundle entry");
      continue;
    }

    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;

    match name.as_str() {
      ACORNFILE => image.acornfile = String::from_utf8_lossy(&data).into_owned(),
      IMAGE_DATA_FILE => image.image_data = decode_entry(&name, &data)?,
      VERSION_FILE => image.version = Some(decode_entry(&name, &data)?),
      VCS_DATA_FILE => image.vcs = Some(decode_entry(&name, &data)?),
      BUILD_DATA_FILE => image.build_args = Some(decode_entry(&name, &data)?),
      BUILD_CONTEXT_FILE => image.build_context = Some(decode_entry(&name, &data)?),
      README_FILE => files.readme = data,
      icon => {
        files.icon_suffix = icon.strip_prefix(ICON_FILE).unwrap_or_default().to_string();
        files.icon = data;
      }
    }
  }

  if image.acornfile.is_empty() {
    return Err(BundleError::MissingAcornfile);
  }

  debug!(
    has_version = image.version.is_some(),
    icon = !files.icon.is_empty(),
    "read app image bundle"
  );
  Ok((image, files))
}

/// Read only the icon of a bundle, if it has one named exactly `icon`.
pub fn icon_from_tar<R: Read>(reader: R) -> Result<Option<Vec<u8>>, BundleError> {
  let mut archive = tar::Archive::new(reader);
  for entry in archive.entries()? {
    let mut entry = entry?;
    if entry.path()?.as_os_str() == ICON_FILE {
      let mut data = Vec::new();
      entry.read_to_end(&mut data)?;
      return Ok(Some(data));
    }
  }
  Ok(None)
}
