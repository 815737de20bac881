use std::collections::BTreeMap;
use std::time::Instant;

use mlua::prelude::*;
use mlua::{HookTriggers, VmState};
use serde_json::Value;
use tracing::debug;

use crate::interpret::{DecodeOptions, Deadline, InterpretError, Interpreter};
use crate::lua::convert::{lua_to_value, value_to_lua};
use crate::value::DynamicValue;

/// How many VM instructions run between deadline checks.
const DEADLINE_CHECK_INTERVAL: u32 = 10_000;

/// Upper bound on the memory a single evaluation may allocate.
const MEMORY_LIMIT: usize = 64 * 1024 * 1024;

/// Base library entries that would reach outside the sandbox.
const REMOVED_GLOBALS: &[&str] = &["dofile", "loadfile", "load", "require", "collectgarbage"];

/// Interprets Acornfiles written in Lua.
///
/// Every call gets its own VM with only the `table`, `string`, `math` and
/// `utf8` libraries loaded, so nothing leaks between documents and a document
/// cannot touch the filesystem. The document is a chunk returning a table.
/// It sees three globals:
///
/// - `args`: the deploy arguments as a table
/// - `profiles`: the selected profile names, in order
/// - `has_profile(name)`: whether `name` is among `profiles`
///
/// ```lua
/// local replicas = has_profile("prod") and 3 or 1
/// return {
///   containers = {
///     web = { image = args.image or "nginx", scale = replicas },
///   },
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaInterpreter;

impl LuaInterpreter {
  pub fn new() -> Self {
    Self
  }
}

fn sandbox(deadline: &Deadline) -> Result<Lua, InterpretError> {
  let libs = LuaStdLib::TABLE | LuaStdLib::STRING | LuaStdLib::MATH | LuaStdLib::UTF8;
  let lua = Lua::new_with(libs, LuaOptions::default()).map_err(|e| InterpretError::Runtime(e.to_string()))?;
  lua
    .set_memory_limit(MEMORY_LIMIT)
    .map_err(|e| InterpretError::Runtime(e.to_string()))?;

  let globals = lua.globals();
  for name in REMOVED_GLOBALS {
    globals
      .raw_set(*name, LuaValue::Nil)
      .map_err(|e| InterpretError::Runtime(e.to_string()))?;
  }

  let deadline = deadline.clone();
  lua
    .set_hook(
      HookTriggers::new().every_nth_instruction(DEADLINE_CHECK_INTERVAL),
      move |_, _| match deadline.check() {
        Ok(()) => Ok(VmState::Continue),
        Err(e) => Err(LuaError::external(e)),
      },
    )
    .map_err(|e| InterpretError::Runtime(e.to_string()))?;

  Ok(lua)
}

/// Map a Lua failure to an interpreter error, preferring the deadline's
/// verdict when the deadline has tripped.
fn classify(err: LuaError, deadline: &Deadline) -> InterpretError {
  if let Err(tripped) = deadline.check() {
    return tripped;
  }
  match err {
    LuaError::SyntaxError { message, .. } => InterpretError::Syntax(message),
    other => InterpretError::Runtime(other.to_string()),
  }
}

fn install_profiles(lua: &Lua, profiles: &[String]) -> LuaResult<()> {
  let names: Vec<String> = profiles
    .iter()
    .map(|p| p.strip_suffix('?').unwrap_or(p).to_string())
    .collect();

  let list = lua.create_sequence_from(names.iter().map(String::as_str))?;
  lua.globals().set("profiles", list)?;

  let has_profile = lua.create_function(move |_, name: String| Ok(names.contains(&name)))?;
  lua.globals().set("has_profile", has_profile)?;
  Ok(())
}

impl Interpreter for LuaInterpreter {
  fn decode(&self, source: &[u8], options: &DecodeOptions<'_>) -> Result<DynamicValue, InterpretError> {
    let deadline = options.deadline;
    deadline.check()?;
    let started = Instant::now();

    let text = std::str::from_utf8(source)
      .map_err(|e| InterpretError::Syntax(format!("{} is not valid UTF-8: {}", options.source_name, e)))?;

    let lua = sandbox(deadline)?;
    let args = value_to_lua(&lua, &options.args.to_value()).map_err(|e| InterpretError::Conversion(e.to_string()))?;
    lua
      .globals()
      .set("args", args)
      .map_err(|e| InterpretError::Runtime(e.to_string()))?;
    install_profiles(&lua, options.profiles).map_err(|e| InterpretError::Runtime(e.to_string()))?;

    let result: LuaValue = lua
      .load(text)
      .set_name(format!("={}", options.source_name))
      .eval()
      .map_err(|e| classify(e, deadline))?;

    if !matches!(result, LuaValue::Table(_)) {
      return Err(InterpretError::Runtime(format!(
        "{} must return a table, got {}",
        options.source_name,
        result.type_name()
      )));
    }

    let mut document = lua_to_value(result).map_err(|e| InterpretError::Conversion(e.to_string()))?;

    if let Some(schema) = options.schema {
      schema.validate(&document)?;
      schema.apply_defaults(&mut document);
    }

    debug!(
      source = options.source_name,
      elapsed_ms = started.elapsed().as_millis() as u64,
      "decoded document"
    );
    Ok(document)
  }

  fn evaluate(
    &self,
    expression: &str,
    env: &BTreeMap<String, DynamicValue>,
    deadline: &Deadline,
  ) -> Result<DynamicValue, InterpretError> {
    deadline.check()?;

    let lua = sandbox(deadline)?;
    for (name, value) in env {
      let value = value_to_lua(&lua, value).map_err(|e| InterpretError::Conversion(e.to_string()))?;
      lua
        .globals()
        .set(name.as_str(), value)
        .map_err(|e| InterpretError::Runtime(e.to_string()))?;
    }

    // A fragment is usually a bare table constructor; fall back to a chunk.
    let function = match lua
      .load(format!("return {}", expression))
      .set_name("=fragment")
      .into_function()
    {
      Ok(function) => function,
      Err(_) => lua
        .load(expression)
        .set_name("=fragment")
        .into_function()
        .map_err(|e| classify(e, deadline))?,
    };

    let result: LuaValue = function.call(()).map_err(|e| classify(e, deadline))?;
    match result {
      LuaValue::Nil => Ok(Value::Null),
      other => lua_to_value(other).map_err(|e| InterpretError::Conversion(e.to_string())),
    }
  }
}
