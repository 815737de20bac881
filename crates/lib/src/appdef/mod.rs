//! Application definitions.
//!
//! An [`AppDefinition`] is an immutable snapshot of an Acornfile together with
//! the image data, deploy arguments and profiles it should be resolved with.
//! Every builder method returns a new definition and leaves the receiver as it
//! was, so a definition can be shared freely once built.
//!
//! ```ignore
//! use acorn_appdef::appdef::AppDefinition;
//!
//! let def = AppDefinition::new(acornfile)?
//!   .with_image_data(images)
//!   .with_args(args, vec!["prod".into()]);
//! let spec = def.resolve()?;
//! ```

mod reference;
mod resolve;
mod watch;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::appspec::{AcornBuild, AppSpec, Build, BuilderSpec, add_implied_resources};
use crate::bundle::AppImage;
use crate::consts::{ACORNFILE, DEFAULT_DECODE_TIMEOUT, MISSING_IMAGE_HINT};
use crate::images::{ImagesData, aggregate};
use crate::interpret::{DecodeOptions, Deadline, InterpretError, Interpreter};
use crate::lua::LuaInterpreter;
use crate::schema::acornfile_schema;
use crate::value::GenericMap;

pub use reference::image_reference_for_service_name;

/// The kind of a workload, as named in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
  Container,
  Function,
  Job,
  Image,
  Acorn,
  Service,
}

impl fmt::Display for WorkloadKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      WorkloadKind::Container => "container",
      WorkloadKind::Function => "function",
      WorkloadKind::Job => "job",
      WorkloadKind::Image => "image definition",
      WorkloadKind::Acorn => "acorn",
      WorkloadKind::Service => "service",
    };
    f.write_str(name)
  }
}

/// A workload, or a sidecar of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRef {
  pub kind: WorkloadKind,
  pub name: String,
  pub sidecar: Option<String>,
}

impl WorkloadRef {
  pub fn new(kind: WorkloadKind, name: impl Into<String>) -> Self {
    Self {
      kind,
      name: name.into(),
      sidecar: None,
    }
  }

  pub fn sidecar(kind: WorkloadKind, parent: impl Into<String>, sidecar: impl Into<String>) -> Self {
    Self {
      kind,
      name: parent.into(),
      sidecar: Some(sidecar.into()),
    }
  }

  /// The name image data is keyed by: `parent.sidecar` for sidecars.
  pub fn service_name(&self) -> String {
    match &self.sidecar {
      Some(sidecar) => format!("{}.{}", self.name, sidecar),
      None => self.name.clone(),
    }
  }
}

impl fmt::Display for WorkloadRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.sidecar {
      Some(sidecar) => write!(f, "sidecar [{}] in {} [{}]", sidecar, self.kind, self.name),
      None => write!(f, "{} [{}]", self.kind, self.name),
    }
  }
}

/// Errors produced while resolving an application definition.
#[derive(Debug, thiserror::Error)]
pub enum AppDefinitionError {
  /// The Acornfile could not be decoded.
  #[error("failed to decode Acornfile: {source}")]
  Decode { source: InterpretError },

  /// Decoding did not finish in time.
  #[error("decoding Acornfile timed out after {0:?}")]
  Timeout(Duration),

  #[error("resolution cancelled")]
  Cancelled,

  /// A workload has no image to bind.
  #[error("failed to find image for {workload} in Acornfile{}", MISSING_IMAGE_HINT)]
  MissingBinding { workload: WorkloadRef },

  /// The fragment recorded with a workload's image could not be applied.
  #[error("failed to apply acornfile fragment to {workload}: {reason}")]
  FragmentOverlay { workload: WorkloadRef, reason: String },

  #[error("failed to encode JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("failed to encode YAML: {0}")]
  Yaml(#[from] serde_yaml::Error),
}

impl From<InterpretError> for AppDefinitionError {
  fn from(err: InterpretError) -> Self {
    match err {
      InterpretError::Timeout(timeout) => AppDefinitionError::Timeout(timeout),
      InterpretError::Cancelled => AppDefinitionError::Cancelled,
      source => AppDefinitionError::Decode { source },
    }
  }
}

/// An Acornfile plus everything it is resolved against.
#[derive(Clone)]
pub struct AppDefinition {
  data: Arc<[u8]>,
  image_datas: Vec<ImagesData>,
  has_image_data: bool,
  args: GenericMap,
  profiles: Vec<String>,
  interpreter: Arc<dyn Interpreter>,
  timeout: Duration,
}

impl fmt::Debug for AppDefinition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppDefinition")
      .field("data_len", &self.data.len())
      .field("image_datas", &self.image_datas.len())
      .field("has_image_data", &self.has_image_data)
      .field("args", &self.args)
      .field("profiles", &self.profiles)
      .field("timeout", &self.timeout)
      .finish()
  }
}

impl AppDefinition {
  /// Create a definition from Acornfile source, interpreted as Lua.
  ///
  /// The source is decoded once with no arguments and no image data so that
  /// invalid documents are rejected here rather than at first use.
  pub fn new(data: &[u8]) -> Result<Self, AppDefinitionError> {
    Self::with_interpreter(data, Arc::new(LuaInterpreter::new()))
  }

  /// Create a definition whose source is handled by `interpreter`.
  pub fn with_interpreter(data: &[u8], interpreter: Arc<dyn Interpreter>) -> Result<Self, AppDefinitionError> {
    Self::create(data, interpreter, DEFAULT_DECODE_TIMEOUT)
  }

  /// Create a definition whose trial decode is already bounded by `timeout`.
  pub(crate) fn create(
    data: &[u8],
    interpreter: Arc<dyn Interpreter>,
    timeout: Duration,
  ) -> Result<Self, AppDefinitionError> {
    let definition = Self {
      data: Arc::from(data),
      image_datas: Vec::new(),
      has_image_data: false,
      args: GenericMap::default(),
      profiles: Vec::new(),
      interpreter,
      timeout,
    };
    definition.resolve()?;
    Ok(definition)
  }

  /// Create a definition from a packaged app image, carrying its image data.
  pub fn from_app_image(app_image: &AppImage) -> Result<Self, AppDefinitionError> {
    let definition = Self::new(app_image.acornfile.as_bytes())?;
    Ok(definition.with_image_data(app_image.image_data.clone()))
  }

  /// The Acornfile source.
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn has_image_data(&self) -> bool {
    self.has_image_data
  }

  pub fn args(&self) -> &GenericMap {
    &self.args
  }

  pub fn profiles(&self) -> &[String] {
    &self.profiles
  }

  /// Add a layer of image data on top of those already held.
  pub fn with_image_data(&self, image_data: ImagesData) -> Self {
    let mut result = self.clone();
    result.image_datas.push(image_data);
    result.has_image_data = true;
    result
  }

  /// Drop all image data. The aggregate of what was dropped is returned
  /// alongside when there was any.
  pub fn clear_image_data(&self) -> (Self, Option<ImagesData>) {
    let images = self.has_image_data.then(|| self.images_data());
    let mut result = self.clone();
    result.image_datas = Vec::new();
    result.has_image_data = false;
    (result, images)
  }

  /// Replace the deploy arguments and selected profiles.
  pub fn with_args(&self, args: GenericMap, profiles: Vec<String>) -> Self {
    let mut result = self.clone();
    result.args = args;
    result.profiles = profiles;
    result
  }

  /// Bound every interpreter call by `timeout` instead of the default.
  pub fn with_timeout(&self, timeout: Duration) -> Self {
    let mut result = self.clone();
    result.timeout = timeout;
    result
  }

  /// All held image data layers folded into one.
  pub fn images_data(&self) -> ImagesData {
    aggregate(&self.image_datas)
  }

  fn decode<T: DeserializeOwned>(
    &self,
    args: &GenericMap,
    profiles: &[String],
    cancel: &CancellationToken,
  ) -> Result<T, AppDefinitionError> {
    let deadline = Deadline::after(self.timeout, cancel.clone());
    let options = DecodeOptions {
      source_name: ACORNFILE,
      schema: Some(acornfile_schema()),
      args,
      profiles,
      deadline: &deadline,
    };
    let value = self.interpreter.decode(&self.data, &options)?;
    serde_json::from_value(value).map_err(|e| AppDefinitionError::Decode {
      source: InterpretError::Conversion(e.to_string()),
    })
  }

  /// Decode and resolve the application.
  pub fn resolve(&self) -> Result<AppSpec, AppDefinitionError> {
    self.resolve_cancellable(&CancellationToken::new())
  }

  /// Decode and resolve the application, giving up when `cancel` fires.
  ///
  /// Without image data the decoded spec is returned as is. Otherwise every
  /// workload is bound to an image; if any workload has none the whole
  /// resolution fails.
  pub fn resolve_cancellable(&self, cancel: &CancellationToken) -> Result<AppSpec, AppDefinitionError> {
    let spec: AppSpec = self.decode(&self.args, &self.profiles, cancel)?;
    if !self.has_image_data {
      return Ok(spec);
    }

    let images = self.images_data();
    debug!(layers = self.image_datas.len(), "resolving images");
    let resolver = resolve::Resolver::new(self.interpreter.as_ref(), &images, self.timeout, cancel);
    let mut spec = resolver.resolve(spec)?;
    add_implied_resources(&mut spec);

    info!(
      containers = spec.containers.len(),
      functions = spec.functions.len(),
      jobs = spec.jobs.len(),
      images = spec.images.len(),
      acorns = spec.acorns.len(),
      services = spec.services.len(),
      "resolved app spec"
    );
    Ok(spec)
  }

  /// Decode only the build declarations. Arguments and profiles are not
  /// applied.
  pub fn builder_spec(&self) -> Result<BuilderSpec, AppDefinitionError> {
    self.builder_spec_cancellable(&CancellationToken::new())
  }

  fn builder_spec_cancellable(&self, cancel: &CancellationToken) -> Result<BuilderSpec, AppDefinitionError> {
    self.decode(&GenericMap::default(), &[], cancel)
  }

  /// The resolved spec as pretty-printed JSON.
  pub fn to_json(&self) -> Result<String, AppDefinitionError> {
    let spec = self.resolve()?;
    Ok(serde_json::to_string_pretty(&spec)?)
  }

  /// The resolved spec as YAML, rendered from its JSON form.
  pub fn to_yaml(&self) -> Result<String, AppDefinitionError> {
    let spec = self.resolve()?;
    let value = serde_json::to_value(&spec)?;
    Ok(serde_yaml::to_string(&value)?)
  }

  /// Files whose change should trigger a rebuild, with relative paths in the
  /// Acornfile taken relative to `cwd`. Sorted and free of duplicates.
  pub fn watch_files(&self, cwd: &Path) -> Result<Vec<PathBuf>, AppDefinitionError> {
    self.watch_files_cancellable(cwd, &CancellationToken::new())
  }

  pub fn watch_files_cancellable(
    &self,
    cwd: &Path,
    cancel: &CancellationToken,
  ) -> Result<Vec<PathBuf>, AppDefinitionError> {
    watch::watch_files(self, cwd, cancel)
  }
}

/// Bind `image` to a container-style workload whose declared image was
/// `original_image`.
///
/// A missing build becomes a build of `./Dockerfile`. An unset base image
/// records what the workload stood for before this pass: `original_image`, or
/// `image` itself when nothing was declared. A base image still equal to
/// `original_image` was left by an earlier pass and moves on to `image`.
pub fn assign_image(original_image: &str, build: Option<Build>, image: &str) -> (String, Build) {
  let mut build = build.unwrap_or_else(Build::default_context);
  if build.base_image.is_empty() {
    build.base_image = if original_image.is_empty() {
      image.to_string()
    } else {
      original_image.to_string()
    };
  } else if build.base_image == original_image {
    build.base_image = image.to_string();
  }
  (image.to_string(), build)
}

/// Bind `image` to a nested-application workload. The first image the build
/// stood for is recorded and never overwritten.
pub fn assign_acorn_image(original_image: &str, build: Option<AcornBuild>, image: &str) -> (String, AcornBuild) {
  let mut build = build.unwrap_or_default();
  if build.original_image.is_empty() {
    build.original_image = original_image.to_string();
  }
  (image.to_string(), build)
}
