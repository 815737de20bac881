//! Well-known names and limits shared across the crate.

use std::time::Duration;

/// Name of the declarative source document, both on disk and inside a bundle.
pub const ACORNFILE: &str = "Acornfile";

/// Bundle entry holding the JSON-encoded image data.
pub const IMAGE_DATA_FILE: &str = "images.json";

/// Bundle entry holding the JSON-encoded version record.
pub const VERSION_FILE: &str = "version.json";

/// Bundle entry holding the JSON-encoded VCS record.
pub const VCS_DATA_FILE: &str = "vcs.json";

/// Bundle entry holding the JSON-encoded build arguments.
pub const BUILD_DATA_FILE: &str = "build.json";

/// Bundle entry holding the JSON-encoded build context.
pub const BUILD_CONTEXT_FILE: &str = "build-context.json";

/// Bundle entry holding the readme.
pub const README_FILE: &str = "README";

/// Prefix of the bundle entry holding the icon; the remainder is the suffix.
pub const ICON_FILE: &str = "icon";

/// Default Dockerfile name for container builds.
pub const DOCKERFILE: &str = "Dockerfile";

/// Ignore file that sits next to a Dockerfile.
pub const DOCKERIGNORE: &str = ".dockerignore";

/// Per-function build manifest, relative to the function's source directory.
pub const FUNCTION_BUILD_FILE: &str = "build.lua";

/// Version of the embedded Acornfile schema.
pub const ACORNFILE_SCHEMA_VERSION: &str = "v1";

/// Upper bound on a single interpreter invocation.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Remediation appended to every missing-binding error.
pub const MISSING_IMAGE_HINT: &str =
  ", you may need to define the image/build in the images section of the Acornfile";

/// Profile prepended to the profile list of instances running in dev mode.
pub const DEV_MODE_PROFILE: &str = "devMode?";
