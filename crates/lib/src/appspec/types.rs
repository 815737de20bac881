//! Resolved app spec types.
//!
//! Field names serialize in camelCase. Empty strings, empty maps and absent
//! builds are omitted so a serialized spec only carries what was declared or
//! resolved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::GenericMap;

/// Fields of a record the typed model does not name, kept verbatim.
pub type ExtraFields = BTreeMap<String, Value>;

/// A container image build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
  /// Build context directory, relative to the Acornfile.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub context: String,
  /// Dockerfile path, relative to the Acornfile.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub dockerfile: String,
  /// Image the build is layered on. When set the build is pinned and its
  /// files are not watched.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub base_image: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub target: String,
  #[serde(default, skip_serializing_if = "GenericMap::is_empty")]
  pub build_args: GenericMap,
}

impl Build {
  /// A build of `Dockerfile` in the current directory.
  pub fn default_context() -> Self {
    Self {
      context: ".".to_string(),
      dockerfile: crate::consts::DOCKERFILE.to_string(),
      ..Default::default()
    }
  }
}

/// A build of a nested Acornfile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcornBuild {
  /// The image this build stood for before resolution. Recorded once.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub original_image: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub context: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub acornfile: String,
  #[serde(default, skip_serializing_if = "GenericMap::is_empty")]
  pub build_args: GenericMap,
}

/// A container, function, job or sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub image: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<Build>,
  /// Source directory of a function.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub src: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
  /// Mount path to volume reference.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub dirs: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub files: BTreeMap<String, String>,
  /// Sidecars share the shape of their parent but never nest further.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub sidecars: BTreeMap<String, Container>,
  #[serde(flatten)]
  pub extra: ExtraFields,
}

/// A standalone image definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub image: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<Build>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub acorn_build: Option<AcornBuild>,
}

/// A nested application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acorn {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub image: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<AcornBuild>,
  #[serde(flatten)]
  pub extra: ExtraFields,
}

/// A service. Only services backed by an image or a nested build are
/// build targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub image: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<AcornBuild>,
  #[serde(flatten)]
  pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
  #[serde(flatten)]
  pub fields: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
  #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
  pub kind: String,
  #[serde(flatten)]
  pub fields: ExtraFields,
}

/// The fully decoded application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub containers: BTreeMap<String, Container>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub functions: BTreeMap<String, Container>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub jobs: BTreeMap<String, Container>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub images: BTreeMap<String, ImageSpec>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub acorns: BTreeMap<String, Acorn>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub services: BTreeMap<String, Service>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub volumes: BTreeMap<String, Volume>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub secrets: BTreeMap<String, Secret>,
}
