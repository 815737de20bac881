//! Parsing of app instances.
//!
//! [`parse_app_image`] turns the app image recorded on an instance into the
//! instance's app spec, reporting the outcome through the `parsed` condition.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::appdef::{AppDefinition, AppDefinitionError};
use crate::appspec::AppSpec;
use crate::bundle::AppImage;
use crate::consts::DEV_MODE_PROFILE;
use crate::value::GenericMap;

/// Condition recording whether the app image could be parsed.
pub const APP_INSTANCE_CONDITION_PARSED: &str = "parsed";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstanceSpec {
  #[serde(default, skip_serializing_if = "GenericMap::is_empty")]
  pub deploy_args: GenericMap,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub profiles: Vec<String>,
}

impl AppInstanceSpec {
  /// The profiles to decode with. Dev mode puts its own optional profile
  /// ahead of the requested ones.
  pub fn profiles_for(&self, dev_mode: bool) -> Vec<String> {
    if !dev_mode {
      return self.profiles.clone();
    }
    let mut profiles = Vec::with_capacity(self.profiles.len() + 1);
    profiles.push(DEV_MODE_PROFILE.to_string());
    profiles.extend(self.profiles.iter().cloned());
    profiles
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub error: bool,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstanceStatus {
  #[serde(default)]
  pub app_image: AppImage,
  #[serde(default)]
  pub app_spec: AppSpec,
  #[serde(default)]
  pub dev_mode: bool,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub conditions: Vec<Condition>,
}

impl AppInstanceStatus {
  pub fn condition(&self, kind: &str) -> Option<&Condition> {
    self.conditions.iter().find(|c| c.kind == kind)
  }

  /// Replace the condition of the same type, or add it.
  pub fn set_condition(&mut self, condition: Condition) {
    match self.conditions.iter_mut().find(|c| c.kind == condition.kind) {
      Some(existing) => *existing = condition,
      None => self.conditions.push(condition),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppInstance {
  pub name: String,
  #[serde(default)]
  pub spec: AppInstanceSpec,
  #[serde(default)]
  pub status: AppInstanceStatus,
}

fn resolve_app_spec(app: &AppInstance) -> Result<AppSpec, AppDefinitionError> {
  let definition = AppDefinition::from_app_image(&app.status.app_image)?;
  let profiles = app.spec.profiles_for(app.status.dev_mode);
  definition.with_args(app.spec.deploy_args.clone(), profiles).resolve()
}

/// Parse the app image of `app` into its app spec.
///
/// Instances without an Acornfile are left untouched. Failures are recorded
/// on the `parsed` condition and never returned.
pub fn parse_app_image(app: &mut AppInstance) {
  if app.status.app_image.acornfile.is_empty() {
    return;
  }

  match resolve_app_spec(app) {
    Ok(spec) => {
      app.status.app_spec = spec;
      app.status.set_condition(Condition {
        kind: APP_INSTANCE_CONDITION_PARSED.to_string(),
        success: true,
        ..Default::default()
      });
      debug!(app = %app.name, "parsed app image");
    }
    Err(err) => {
      warn!(app = %app.name, error = %err, "failed to parse app image");
      app.status.set_condition(Condition {
        kind: APP_INSTANCE_CONDITION_PARSED.to_string(),
        error: true,
        message: err.to_string(),
        ..Default::default()
      });
    }
  }
}
