//! The Acornfile schema.
//!
//! The schema is a build-time artifact embedded in the crate. It is compiled
//! once per process on first use and shared by every decode afterwards; a
//! schema that fails to compile is a defect in the crate, not bad input, so
//! initialization panics instead of returning an error.
//!
//! A document is a mapping of *sections* (`containers`, `images`, ...). Each
//! section maps workload names to records of one *kind*, and each kind lists
//! the fields it accepts together with their [`FieldType`]. Besides
//! validation the schema fills in the defaults that let the rest of the crate
//! work with fully spelled-out build records.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::consts::{ACORNFILE, DOCKERFILE};
use crate::util::path::join_slash;

const SCHEMA_SOURCE: &str = include_str!("schema.json");

/// Kind used to validate the entries of a `sidecars` field.
const SIDECAR_KIND: &str = "sidecar";

const BUILD_FIELDS: &[&str] = &["context", "dockerfile", "baseImage", "target", "buildArgs"];
const ACORN_BUILD_FIELDS: &[&str] = &["context", "acornfile", "originalImage", "buildArgs"];

static ACORNFILE_SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
  let schema = Schema::compile(SCHEMA_SOURCE).expect("embedded Acornfile schema must compile");
  debug!(version = %schema.version, sections = schema.sections.len(), "compiled Acornfile schema");
  schema
});

/// The process-wide compiled Acornfile schema.
pub fn acornfile_schema() -> &'static Schema {
  &ACORNFILE_SCHEMA
}

/// Type of a single field in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
  String,
  Integer,
  Boolean,
  /// Mapping of names to scalars; scalars are normalized to strings.
  StringMap,
  /// A container build: a context string or a build table.
  Build,
  /// A nested Acornfile build: a context string or a build table.
  AcornBuild,
  /// Mapping of sidecar names to sidecar records.
  Sidecars,
  Any,
}

/// Errors raised while compiling the schema document.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
  #[error("failed to parse schema: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("section '{section}' refers to unknown kind '{kind}'")]
  UnknownKind { section: String, kind: String },

  #[error("kind '{kind}' declares sidecars but no 'sidecar' kind is defined")]
  MissingSidecarKind { kind: String },
}

/// A document that does not conform to the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
  /// Dotted location of the offending value, e.g. `containers.web.image`.
  pub path: String,
  pub message: String,
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.path.is_empty() {
      write!(f, "{}", self.message)
    } else {
      write!(f, "{}: {}", self.path, self.message)
    }
  }
}

impl std::error::Error for ValidationError {}

fn invalid(path: &str, message: impl Into<String>) -> ValidationError {
  ValidationError {
    path: path.to_string(),
    message: message.into(),
  }
}

fn child(path: &str, key: &str) -> String {
  if path.is_empty() {
    key.to_string()
  } else {
    format!("{}.{}", path, key)
  }
}

fn describe(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "list",
    Value::Object(_) => "table",
  }
}

#[derive(Debug, Deserialize)]
struct SchemaSource {
  version: String,
  sections: BTreeMap<String, String>,
  kinds: BTreeMap<String, BTreeMap<String, FieldType>>,
}

type Kind = BTreeMap<String, FieldType>;

/// A compiled schema.
#[derive(Debug, Clone)]
pub struct Schema {
  version: String,
  sections: BTreeMap<String, String>,
  kinds: BTreeMap<String, Kind>,
}

impl Schema {
  /// Parse and check a schema document.
  pub fn compile(source: &str) -> Result<Self, SchemaError> {
    let parsed: SchemaSource = serde_json::from_str(source)?;

    for (section, kind) in &parsed.sections {
      if !parsed.kinds.contains_key(kind) {
        return Err(SchemaError::UnknownKind {
          section: section.clone(),
          kind: kind.clone(),
        });
      }
    }

    for (name, fields) in &parsed.kinds {
      if fields.values().any(|t| *t == FieldType::Sidecars) && !parsed.kinds.contains_key(SIDECAR_KIND) {
        return Err(SchemaError::MissingSidecarKind { kind: name.clone() });
      }
    }

    Ok(Self {
      version: parsed.version,
      sections: parsed.sections,
      kinds: parsed.kinds,
    })
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  /// Names of the top-level sections a document may contain.
  pub fn sections(&self) -> impl Iterator<Item = &str> {
    self.sections.keys().map(String::as_str)
  }

  fn kind(&self, name: &str) -> Option<&Kind> {
    self.kinds.get(name)
  }

  /// Check a decoded document against the schema.
  pub fn validate(&self, document: &Value) -> Result<(), ValidationError> {
    let Value::Object(sections) = document else {
      return Err(invalid(
        "",
        format!("{} must evaluate to a table, found {}", ACORNFILE, describe(document)),
      ));
    };

    for (section, entries) in sections {
      let Some(kind) = self.sections.get(section).and_then(|k| self.kind(k)) else {
        return Err(invalid(section, "unknown section"));
      };
      self.validate_entries(section, entries, kind)?;
    }
    Ok(())
  }

  fn validate_entries(&self, path: &str, entries: &Value, kind: &Kind) -> Result<(), ValidationError> {
    let Value::Object(entries) = entries else {
      return Err(invalid(path, format!("expected a table of entries, found {}", describe(entries))));
    };
    for (name, record) in entries {
      self.validate_record(&child(path, name), record, kind)?;
    }
    Ok(())
  }

  fn validate_record(&self, path: &str, record: &Value, kind: &Kind) -> Result<(), ValidationError> {
    let Value::Object(fields) = record else {
      return Err(invalid(path, format!("expected a table, found {}", describe(record))));
    };

    for (field, value) in fields {
      let field_path = child(path, field);
      let Some(field_type) = kind.get(field) else {
        return Err(invalid(&field_path, "unknown field"));
      };
      self.validate_field(&field_path, value, *field_type)?;
    }
    Ok(())
  }

  fn validate_field(&self, path: &str, value: &Value, field_type: FieldType) -> Result<(), ValidationError> {
    let ok = match field_type {
      FieldType::Any => true,
      FieldType::String => value.is_string(),
      FieldType::Integer => value.is_i64(),
      FieldType::Boolean => value.is_boolean(),
      FieldType::StringMap => {
        return match value {
          Value::Object(map) => {
            for (key, item) in map {
              if !matches!(item, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
                return Err(invalid(
                  &child(path, key),
                  format!("expected a string, found {}", describe(item)),
                ));
              }
            }
            Ok(())
          }
          other => Err(invalid(path, format!("expected a table, found {}", describe(other)))),
        };
      }
      FieldType::Build => return validate_build(path, value, BUILD_FIELDS),
      FieldType::AcornBuild => return validate_build(path, value, ACORN_BUILD_FIELDS),
      FieldType::Sidecars => {
        let sidecar = self
          .kind(SIDECAR_KIND)
          .ok_or_else(|| invalid(path, "sidecars are not supported"))?;
        return self.validate_entries(path, value, sidecar);
      }
    };

    if ok {
      Ok(())
    } else {
      let expected = match field_type {
        FieldType::String => "a string",
        FieldType::Integer => "an integer",
        FieldType::Boolean => "a boolean",
        _ => "a different value",
      };
      Err(invalid(path, format!("expected {}, found {}", expected, describe(value))))
    }
  }

  /// Fill in defaults on a document that has already passed [`Schema::validate`].
  pub fn apply_defaults(&self, document: &mut Value) {
    let Value::Object(sections) = document else {
      return;
    };
    for (section, entries) in sections.iter_mut() {
      if let Some(kind) = self.sections.get(section).and_then(|k| self.kind(k)) {
        self.apply_entry_defaults(entries, kind);
      }
    }
  }

  fn apply_entry_defaults(&self, entries: &mut Value, kind: &Kind) {
    let Value::Object(entries) = entries else {
      return;
    };
    for record in entries.values_mut() {
      let Value::Object(fields) = record else {
        continue;
      };
      for (field, value) in fields.iter_mut() {
        match kind.get(field) {
          Some(FieldType::Build) => default_build(value),
          Some(FieldType::AcornBuild) => default_acorn_build(value),
          Some(FieldType::StringMap) => stringify_scalars(value),
          Some(FieldType::Sidecars) => {
            if let Some(sidecar) = self.kind(SIDECAR_KIND) {
              self.apply_entry_defaults(value, sidecar);
            }
          }
          _ => {}
        }
      }
    }
  }
}

fn validate_build(path: &str, value: &Value, allowed: &[&str]) -> Result<(), ValidationError> {
  match value {
    Value::String(_) => Ok(()),
    Value::Object(fields) => {
      for (field, item) in fields {
        let field_path = child(path, field);
        if !allowed.contains(&field.as_str()) {
          return Err(invalid(&field_path, "unknown build field"));
        }
        let ok = if field == "buildArgs" {
          item.is_object()
        } else {
          item.is_string()
        };
        if !ok {
          return Err(invalid(&field_path, format!("unexpected {}", describe(item))));
        }
      }
      Ok(())
    }
    other => Err(invalid(
      path,
      format!("expected a build context string or table, found {}", describe(other)),
    )),
  }
}

fn string_field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
  fields.get(name).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn default_build(value: &mut Value) {
  if let Value::String(context) = value {
    let context = context.clone();
    let mut fields = Map::new();
    fields.insert("dockerfile".into(), Value::String(join_slash(&context, DOCKERFILE)));
    fields.insert("context".into(), Value::String(context));
    *value = Value::Object(fields);
    return;
  }

  if let Value::Object(fields) = value {
    let context = string_field(fields, "context").unwrap_or(".").to_string();
    if string_field(fields, "dockerfile").is_none() {
      fields.insert("dockerfile".into(), Value::String(join_slash(&context, DOCKERFILE)));
    }
    fields.insert("context".into(), Value::String(context));
  }
}

fn default_acorn_build(value: &mut Value) {
  if let Value::String(context) = value {
    let context = context.clone();
    let mut fields = Map::new();
    fields.insert("acornfile".into(), Value::String(join_slash(&context, ACORNFILE)));
    fields.insert("context".into(), Value::String(context));
    *value = Value::Object(fields);
    return;
  }

  if let Value::Object(fields) = value {
    let context = string_field(fields, "context").unwrap_or(".").to_string();
    if string_field(fields, "acornfile").is_none() {
      fields.insert("acornfile".into(), Value::String(join_slash(&context, ACORNFILE)));
    }
    fields.insert("context".into(), Value::String(context));
  }
}

fn stringify_scalars(value: &mut Value) {
  if let Value::Object(map) = value {
    for item in map.values_mut() {
      match item {
        Value::Number(n) => *item = Value::String(n.to_string()),
        Value::Bool(b) => *item = Value::String(b.to_string()),
        _ => {}
      }
    }
  }
}
