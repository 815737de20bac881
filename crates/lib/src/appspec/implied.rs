//! Volumes and secrets that workloads reference without declaring.

use std::collections::BTreeSet;

use tracing::debug;

use super::types::{AppSpec, Container, Secret, Volume};

const VOLUME_SCHEME: &str = "volume://";
const SECRET_SCHEME: &str = "secret://";

/// Type given to a secret that is only known through a reference.
pub const IMPLIED_SECRET_TYPE: &str = "opaque";

/// Name of the resource a reference points at: everything before the first
/// `/` or `?`.
fn reference_name(rest: &str) -> Option<&str> {
  let name = rest.split(['/', '?']).next().unwrap_or_default();
  (!name.is_empty()).then_some(name)
}

fn secret_ref(value: &str) -> Option<&str> {
  value.strip_prefix(SECRET_SCHEME).and_then(reference_name)
}

/// A `dirs` value names a volume when it carries the volume scheme or is a
/// bare name. Local paths and other schemes do not.
fn volume_ref(value: &str) -> Option<&str> {
  if let Some(rest) = value.strip_prefix(VOLUME_SCHEME) {
    return reference_name(rest);
  }
  if value.contains("://") || value.starts_with('.') || value.starts_with('/') {
    return None;
  }
  reference_name(value)
}

fn collect(container: &Container, volumes: &mut BTreeSet<String>, secrets: &mut BTreeSet<String>) {
  for value in container.dirs.values() {
    if let Some(name) = volume_ref(value) {
      volumes.insert(name.to_string());
    } else if let Some(name) = secret_ref(value) {
      secrets.insert(name.to_string());
    }
  }
  for value in container.env.values().chain(container.files.values()) {
    if let Some(name) = secret_ref(value) {
      secrets.insert(name.to_string());
    }
  }
  for sidecar in container.sidecars.values() {
    collect(sidecar, volumes, secrets);
  }
}

/// Declare every volume and secret a workload refers to but the app spec does
/// not define. Existing definitions are left as they are.
pub fn add_implied_resources(spec: &mut AppSpec) {
  let mut volumes = BTreeSet::new();
  let mut secrets = BTreeSet::new();

  for container in spec
    .containers
    .values()
    .chain(spec.functions.values())
    .chain(spec.jobs.values())
  {
    collect(container, &mut volumes, &mut secrets);
  }

  for name in volumes {
    if !spec.volumes.contains_key(&name) {
      debug!(volume = %name, "adding implied volume");
      spec.volumes.insert(name, Volume::default());
    }
  }

  for name in secrets {
    if !spec.secrets.contains_key(&name) {
      debug!(secret = %name, "adding implied secret");
      let secret = Secret {
        kind: IMPLIED_SECRET_TYPE.to_string(),
        ..Default::default()
      };
      spec.secrets.insert(name, secret);
    }
  }
}
