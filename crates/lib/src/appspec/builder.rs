//! The builder view of an Acornfile: only what is needed to know what gets
//! built and from which files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{AcornBuild, Build};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerImageBuilderSpec {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub image: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<Build>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub src: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub sidecars: BTreeMap<String, ContainerImageBuilderSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBuilderSpec {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub image: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<Build>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub acorn_build: Option<AcornBuild>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcornBuilderSpec {
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub image: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build: Option<AcornBuild>,
}

/// Build declarations of every workload. Fields the builder does not need
/// are dropped while decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuilderSpec {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub containers: BTreeMap<String, ContainerImageBuilderSpec>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub functions: BTreeMap<String, ContainerImageBuilderSpec>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub jobs: BTreeMap<String, ContainerImageBuilderSpec>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub images: BTreeMap<String, ImageBuilderSpec>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub acorns: BTreeMap<String, AcornBuilderSpec>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub services: BTreeMap<String, AcornBuilderSpec>,
}
