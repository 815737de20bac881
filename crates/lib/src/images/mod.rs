//! Image data recorded by build passes.
//!
//! Every build pass produces one [`ImagesData`] layer mapping workload names to
//! the image that was built for them. An application may carry several
//! layers; [`aggregate`] folds them into one view where later layers win.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::appspec::{AcornBuilderSpec, ContainerImageBuilderSpec, ImageBuilderSpec};

/// The image built for one workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerData {
  #[serde(default)]
  pub image: String,
  /// Acornfile snippet recorded with the image, merged back into the
  /// workload when the image is bound.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub acornfile_fragment: String,
}

impl ContainerData {
  pub fn new(image: impl Into<String>) -> Self {
    Self {
      image: image.into(),
      acornfile_fragment: String::new(),
    }
  }

  pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
    self.acornfile_fragment = fragment.into();
    self
  }
}

/// Provenance of one built image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEntry {
  pub image_key: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub container_build: Option<ContainerImageBuilderSpec>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub acorn_build: Option<AcornBuilderSpec>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_build: Option<ImageBuilderSpec>,
}

/// One layer of image data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagesData {
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub containers: BTreeMap<String, ContainerData>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub functions: BTreeMap<String, ContainerData>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub jobs: BTreeMap<String, ContainerData>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub images: BTreeMap<String, ContainerData>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub acorns: BTreeMap<String, ContainerData>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub builds: Vec<BuildEntry>,
}

impl ImagesData {
  /// Find the fragment recorded with `image_id`.
  ///
  /// Containers are searched before functions and functions before jobs;
  /// within each map entries are visited in name order. The first non-empty
  /// fragment of an entry whose image is `image_id` wins.
  pub fn find_fragment(&self, image_id: &str) -> Option<&str> {
    let found = [&self.containers, &self.functions, &self.jobs]
      .into_iter()
      .flat_map(|map| map.iter())
      .find(|(_, data)| data.image == image_id && !data.acornfile_fragment.is_empty());

    let (name, data) = found?;
    trace!(image = image_id, workload = %name, "found acornfile fragment");
    Some(data.acornfile_fragment.as_str())
  }
}

/// Fold layers left to right into one view. For each name the entry of the
/// last layer that has one wins; build provenance is concatenated in order.
pub fn aggregate(layers: &[ImagesData]) -> ImagesData {
  let mut result = ImagesData::default();
  for layer in layers {
    extend(&mut result.containers, &layer.containers);
    extend(&mut result.functions, &layer.functions);
    extend(&mut result.jobs, &layer.jobs);
    extend(&mut result.images, &layer.images);
    extend(&mut result.acorns, &layer.acorns);
    result.builds.extend(layer.builds.iter().cloned());
  }
  result
}

fn extend(into: &mut BTreeMap<String, ContainerData>, from: &BTreeMap<String, ContainerData>) {
  into.extend(from.iter().map(|(k, v)| (k.clone(), v.clone())));
}
