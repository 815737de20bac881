//! The declarative source interpreter interface.
//!
//! The resolver never looks at Acornfile syntax itself. It asks an
//! [`Interpreter`] to decode a whole document into a structured value, and to
//! evaluate the small fragments recorded at build time against a workload's
//! own state. [`crate::lua::LuaInterpreter`] is the implementation shipped with
//! this crate.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::schema::{Schema, ValidationError};
use crate::value::{DynamicValue, GenericMap};

/// Errors produced by an [`Interpreter`].
#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
  /// The source could not be parsed.
  #[error("syntax error: {0}")]
  Syntax(String),

  /// The source parsed but raised an error while running.
  #[error("runtime error: {0}")]
  Runtime(String),

  /// The result did not conform to the schema.
  #[error("validation error: {0}")]
  Validation(#[from] ValidationError),

  /// The result could not be represented as a dynamic value.
  #[error("conversion error: {0}")]
  Conversion(String),

  /// Evaluation ran past its deadline.
  #[error("evaluation timed out after {0:?}")]
  Timeout(Duration),

  /// Evaluation was cancelled by the caller.
  #[error("evaluation cancelled")]
  Cancelled,
}

/// A bound on how long an interpreter call may run.
#[derive(Debug, Clone)]
pub struct Deadline {
  expires_at: Instant,
  timeout: Duration,
  cancel: CancellationToken,
}

impl Deadline {
  /// A deadline `timeout` from now that also trips when `cancel` fires.
  pub fn after(timeout: Duration, cancel: CancellationToken) -> Self {
    Self {
      expires_at: Instant::now() + timeout,
      timeout,
      cancel,
    }
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  pub fn cancel_token(&self) -> &CancellationToken {
    &self.cancel
  }

  /// Fail if the caller cancelled or the deadline has passed.
  ///
  /// Cancellation is reported ahead of expiry.
  pub fn check(&self) -> Result<(), InterpretError> {
    if self.cancel.is_cancelled() {
      return Err(InterpretError::Cancelled);
    }
    if Instant::now() >= self.expires_at {
      return Err(InterpretError::Timeout(self.timeout));
    }
    Ok(())
  }
}

/// Inputs to [`Interpreter::decode`].
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions<'a> {
  /// Name used in error messages, e.g. `Acornfile`.
  pub source_name: &'a str,
  /// Validate and default the result against this schema when present.
  pub schema: Option<&'a Schema>,
  pub args: &'a GenericMap,
  /// Selected profiles; a trailing `?` marks a profile as optional.
  pub profiles: &'a [String],
  pub deadline: &'a Deadline,
}

/// A declarative language implementation.
pub trait Interpreter: Send + Sync {
  /// Decode a whole document into a structured value.
  fn decode(&self, source: &[u8], options: &DecodeOptions<'_>) -> Result<DynamicValue, InterpretError>;

  /// Evaluate a fragment with `env` exposed as globals.
  fn evaluate(
    &self,
    expression: &str,
    env: &BTreeMap<String, DynamicValue>,
    deadline: &Deadline,
  ) -> Result<DynamicValue, InterpretError>;
}
