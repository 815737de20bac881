//! Binding of decoded workloads to images.
//!
//! Workloads are bound in section order, sidecars after their parent. The
//! first workload without an image fails the whole resolution.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AppDefinitionError, WorkloadKind, WorkloadRef, assign_acorn_image, assign_image};
use crate::appdef::reference::image_reference_for_service_name;
use crate::appspec::{AppSpec, Container};
use crate::images::ImagesData;
use crate::interpret::{Deadline, InterpretError, Interpreter};
use crate::value::merge_deep;

/// Binds every workload of a decoded spec to an image.
pub(crate) struct Resolver<'a> {
  interpreter: &'a dyn Interpreter,
  images: &'a ImagesData,
  timeout: Duration,
  cancel: &'a CancellationToken,
}

impl<'a> Resolver<'a> {
  pub(crate) fn new(
    interpreter: &'a dyn Interpreter,
    images: &'a ImagesData,
    timeout: Duration,
    cancel: &'a CancellationToken,
  ) -> Self {
    Self {
      interpreter,
      images,
      timeout,
      cancel,
    }
  }

  /// Resolve `spec`. Either every workload is bound or an error is returned;
  /// a partly bound spec never escapes.
  pub(crate) fn resolve(&self, spec: AppSpec) -> Result<AppSpec, AppDefinitionError> {
    let declared = spec.clone();
    let mut spec = spec;

    self.bind_containers(WorkloadKind::Container, &mut spec.containers, &declared)?;
    self.bind_containers(WorkloadKind::Function, &mut spec.functions, &declared)?;
    self.bind_containers(WorkloadKind::Job, &mut spec.jobs, &declared)?;

    for (name, image_spec) in spec.images.iter_mut() {
      let workload = WorkloadRef::new(WorkloadKind::Image, name);
      let image = self.lookup(&workload, &declared)?;
      if image_spec.acorn_build.is_some() {
        let (image, build) = assign_acorn_image(&image_spec.image, image_spec.acorn_build.take(), &image);
        image_spec.image = image;
        image_spec.acorn_build = Some(build);
      } else {
        let (image, build) = assign_image(&image_spec.image, image_spec.build.take(), &image);
        image_spec.image = image;
        image_spec.build = Some(build);
      }
    }

    for (name, acorn) in spec.acorns.iter_mut() {
      let workload = WorkloadRef::new(WorkloadKind::Acorn, name);
      let image = self.lookup(&workload, &declared)?;
      let (image, build) = assign_acorn_image(&acorn.image, acorn.build.take(), &image);
      acorn.image = image;
      acorn.build = Some(build);
    }

    for (name, service) in spec.services.iter_mut() {
      if service.image.is_empty() && service.build.is_none() {
        continue;
      }
      let workload = WorkloadRef::new(WorkloadKind::Service, name);
      let image = self.lookup(&workload, &declared)?;
      let (image, build) = assign_acorn_image(&service.image, service.build.take(), &image);
      service.image = image;
      service.build = Some(build);
    }

    Ok(spec)
  }

  fn bind_containers(
    &self,
    kind: WorkloadKind,
    containers: &mut BTreeMap<String, Container>,
    declared: &AppSpec,
  ) -> Result<(), AppDefinitionError> {
    for (name, container) in containers.iter_mut() {
      self.bind_container(&WorkloadRef::new(kind, name), container, declared)?;
      for (sidecar_name, sidecar) in container.sidecars.iter_mut() {
        self.bind_container(&WorkloadRef::sidecar(kind, name, sidecar_name), sidecar, declared)?;
      }
    }
    Ok(())
  }

  fn bind_container(
    &self,
    workload: &WorkloadRef,
    container: &mut Container,
    declared: &AppSpec,
  ) -> Result<(), AppDefinitionError> {
    let image = self.lookup(workload, declared)?;
    self.overlay_fragment(workload, container, &image)?;
    let (image, build) = assign_image(&container.image, container.build.take(), &image);
    container.image = image;
    container.build = Some(build);
    Ok(())
  }

  fn lookup(&self, workload: &WorkloadRef, declared: &AppSpec) -> Result<String, AppDefinitionError> {
    if self.cancel.is_cancelled() {
      return Err(AppDefinitionError::Cancelled);
    }
    let image = image_reference_for_service_name(&workload.service_name(), declared, self.images).ok_or_else(|| {
      AppDefinitionError::MissingBinding {
        workload: workload.clone(),
      }
    })?;
    debug!(workload = %workload, image = %image, "bound image");
    Ok(image)
  }

  /// Merge the fragment recorded with `image` onto `container`.
  ///
  /// The fragment sees the record as `base` and the workload's name as
  /// `serviceName`; the table it produces wins over the record field by field.
  fn overlay_fragment(
    &self,
    workload: &WorkloadRef,
    container: &mut Container,
    image: &str,
  ) -> Result<(), AppDefinitionError> {
    let Some(fragment) = self.images.find_fragment(image) else {
      return Ok(());
    };

    let overlay_error = |reason: String| AppDefinitionError::FragmentOverlay {
      workload: workload.clone(),
      reason,
    };

    let current = serde_json::to_value(&*container).map_err(|e| overlay_error(e.to_string()))?;
    let env = BTreeMap::from([
      ("base".to_string(), current.clone()),
      ("serviceName".to_string(), Value::String(workload.service_name())),
    ]);

    let deadline = Deadline::after(self.timeout, self.cancel.clone());
    let overlay = self
      .interpreter
      .evaluate(fragment, &env, &deadline)
      .map_err(|e| match e {
        InterpretError::Timeout(timeout) => AppDefinitionError::Timeout(timeout),
        InterpretError::Cancelled => AppDefinitionError::Cancelled,
        other => overlay_error(other.to_string()),
      })?;
    if !overlay.is_object() {
      return Err(overlay_error(format!("fragment must produce a table, got {}", overlay)));
    }

    *container = serde_json::from_value(merge_deep(current, overlay)).map_err(|e| overlay_error(e.to_string()))?;
    debug!(workload = %workload, "applied acornfile fragment");
    Ok(())
  }
}
