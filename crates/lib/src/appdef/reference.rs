//! Image lookup for a single workload.
//!
//! Built images recorded in the image data take precedence; otherwise the
//! workload's declared image is used when it needs no build.

use tracing::trace;

use crate::appspec::AppSpec;
use crate::images::ImagesData;

/// What the app spec declares about a workload's image.
struct Declared<'a> {
  image: &'a str,
  has_build: bool,
}

/// Look up the declaration of `service_name`. Containers shadow functions,
/// functions shadow jobs. A name that no workload declares outright is tried
/// as `parent.sidecar`, so workloads whose own names contain dots still bind.
fn declared<'a>(service_name: &str, spec: &'a AppSpec) -> Option<Declared<'a>> {
  let containers = [&spec.containers, &spec.functions, &spec.jobs];

  if let Some(record) = containers.into_iter().find_map(|map| map.get(service_name)) {
    return Some(Declared {
      image: &record.image,
      has_build: record.build.is_some(),
    });
  }
  if let Some(record) = spec.images.get(service_name) {
    return Some(Declared {
      image: &record.image,
      has_build: record.build.is_some() || record.acorn_build.is_some(),
    });
  }
  if let Some(record) = spec.acorns.get(service_name) {
    return Some(Declared {
      image: &record.image,
      has_build: record.build.is_some(),
    });
  }
  if let Some(record) = spec.services.get(service_name) {
    return Some(Declared {
      image: &record.image,
      has_build: record.build.is_some(),
    });
  }

  // Either side of the split may hold dots too, so every split is tried.
  let record = service_name.match_indices('.').find_map(|(at, _)| {
    let (parent, sidecar) = (&service_name[..at], &service_name[at + 1..]);
    containers
      .into_iter()
      .find_map(|map| map.get(parent))
      .and_then(|c| c.sidecars.get(sidecar))
  })?;
  Some(Declared {
    image: &record.image,
    has_build: record.build.is_some(),
  })
}

/// Find the image to bind to the workload named `service_name`.
///
/// In order of preference:
///
/// 1. an image built for that exact name, looked up in the containers,
///    functions, jobs, images and acorns of the image data
/// 2. when the workload's image names an entry of the `images` section, the
///    image built for that entry, or its own image when it declares no build
/// 3. the workload's own image, when it declares no build
///
/// `spec` is the app spec as declared, before any binding.
pub fn image_reference_for_service_name(service_name: &str, spec: &AppSpec, images: &ImagesData) -> Option<String> {
  let built = [
    &images.containers,
    &images.functions,
    &images.jobs,
    &images.images,
    &images.acorns,
  ]
  .into_iter()
  .find_map(|map| map.get(service_name).filter(|data| !data.image.is_empty()));
  if let Some(data) = built {
    trace!(service = service_name, image = %data.image, "found built image");
    return Some(data.image.clone());
  }

  let declared = declared(service_name, spec)?;
  if declared.image.is_empty() {
    return None;
  }

  if let Some(data) = images.images.get(declared.image).filter(|data| !data.image.is_empty()) {
    trace!(service = service_name, image = %data.image, "found image through images section");
    return Some(data.image.clone());
  }
  if let Some(target) = spec.images.get(declared.image)
    && !target.image.is_empty()
    && target.build.is_none()
    && target.acorn_build.is_none()
  {
    return Some(target.image.clone());
  }

  if declared.has_build {
    return None;
  }
  Some(declared.image.to_string())
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::appspec::{Build, Container, ImageSpec, Service};
  use crate::images::ContainerData;

  fn container(image: &str, build: bool) -> Container {
    Container {
      image: image.to_string(),
      build: build.then(Build::default_context),
      ..Default::default()
    }
  }

  fn spec_with(name: &str, record: Container) -> AppSpec {
    AppSpec {
      containers: BTreeMap::from([(name.to_string(), record)]),
      ..Default::default()
    }
  }

  #[test]
  fn built_image_by_name_wins() {
    let spec = spec_with("web", container("nginx", false));
    let images = ImagesData {
      containers: BTreeMap::from([("web".to_string(), ContainerData::new("sha256:built"))]),
      ..Default::default()
    };
    assert_eq!(
      image_reference_for_service_name("web", &spec, &images).as_deref(),
      Some("sha256:built")
    );
  }

  #[test]
  fn images_section_entry_is_followed() {
    let spec = spec_with("web", container("base", false));
    let images = ImagesData {
      images: BTreeMap::from([("base".to_string(), ContainerData::new("sha256:base"))]),
      ..Default::default()
    };
    assert_eq!(
      image_reference_for_service_name("web", &spec, &images).as_deref(),
      Some("sha256:base")
    );
  }

  #[test]
  fn images_section_plain_image_is_followed() {
    let mut spec = spec_with("web", container("base", false));
    spec.images.insert(
      "base".to_string(),
      ImageSpec {
        image: "alpine:3".to_string(),
        ..Default::default()
      },
    );
    assert_eq!(
      image_reference_for_service_name("web", &spec, &ImagesData::default()).as_deref(),
      Some("alpine:3")
    );
  }

  #[test]
  fn explicit_image_without_build_is_used() {
    let spec = spec_with("web", container("nginx", false));
    assert_eq!(
      image_reference_for_service_name("web", &spec, &ImagesData::default()).as_deref(),
      Some("nginx")
    );
  }

  #[test]
  fn unbuilt_build_has_no_reference() {
    let spec = spec_with("web", container("", true));
    assert_eq!(image_reference_for_service_name("web", &spec, &ImagesData::default()), None);
  }

  #[test]
  fn unknown_workload_has_no_reference() {
    assert_eq!(
      image_reference_for_service_name("ghost", &AppSpec::default(), &ImagesData::default()),
      None
    );
  }

  #[test]
  fn sidecars_use_compound_names() {
    let mut parent = container("", true);
    parent.sidecars.insert("log".to_string(), container("busybox", false));
    let spec = spec_with("web", parent);

    assert_eq!(
      image_reference_for_service_name("web.log", &spec, &ImagesData::default()).as_deref(),
      Some("busybox")
    );

    let images = ImagesData {
      containers: BTreeMap::from([("web.log".to_string(), ContainerData::new("sha256:log"))]),
      ..Default::default()
    };
    assert_eq!(
      image_reference_for_service_name("web.log", &spec, &images).as_deref(),
      Some("sha256:log")
    );
  }

  #[test]
  fn dotted_workload_names_are_not_sidecars() {
    let spec = spec_with("my.app", container("nginx", false));
    assert_eq!(
      image_reference_for_service_name("my.app", &spec, &ImagesData::default()).as_deref(),
      Some("nginx")
    );
  }

  #[test]
  fn sidecars_of_dotted_parents() {
    let mut parent = container("", true);
    parent.sidecars.insert("log".to_string(), container("busybox", false));
    let spec = spec_with("my.app", parent);
    assert_eq!(
      image_reference_for_service_name("my.app.log", &spec, &ImagesData::default()).as_deref(),
      Some("busybox")
    );
  }

  #[test]
  fn services_with_images_resolve() {
    let spec = AppSpec {
      services: BTreeMap::from([(
        "db".to_string(),
        Service {
          image: "ghcr.io/acorn/mariadb".to_string(),
          ..Default::default()
        },
      )]),
      ..Default::default()
    };
    assert_eq!(
      image_reference_for_service_name("db", &spec, &ImagesData::default()).as_deref(),
      Some("ghcr.io/acorn/mariadb")
    );
  }
}
