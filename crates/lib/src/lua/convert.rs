//! Conversion between Lua values and dynamic values.

use mlua::prelude::*;
use serde_json::{Map, Number, Value};

/// Tables nested deeper than this are rejected rather than walked.
pub const MAX_DEPTH: usize = 64;

/// Convert a Lua value into a dynamic value.
///
/// A table whose keys are exactly `1..=n` becomes an array; any other table
/// becomes an object, with integer keys rendered as strings. An empty table is
/// an empty object. Integers and floats keep their distinction.
pub fn lua_to_value(value: LuaValue) -> LuaResult<Value> {
  lua_to_value_at(value, 0)
}

fn lua_to_value_at(value: LuaValue, depth: usize) -> LuaResult<Value> {
  match value {
    LuaValue::Nil => Ok(Value::Null),
    LuaValue::Boolean(b) => Ok(Value::Bool(b)),
    LuaValue::Integer(i) => Ok(Value::Number(i.into())),
    LuaValue::Number(n) => Number::from_f64(n)
      .map(Value::Number)
      .ok_or_else(|| LuaError::external(format!("number {} cannot be represented", n))),
    LuaValue::String(s) => Ok(Value::String(s.to_str()?.to_string())),
    LuaValue::Table(t) => {
      if depth >= MAX_DEPTH {
        return Err(LuaError::external(format!("tables nested deeper than {} levels", MAX_DEPTH)));
      }

      let len = t.raw_len();
      let mut entries = Vec::new();
      for pair in t.pairs::<LuaValue, LuaValue>() {
        entries.push(pair?);
      }

      if len > 0 && entries.len() == len {
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
          let item: LuaValue = t.raw_get(i)?;
          items.push(lua_to_value_at(item, depth + 1)?);
        }
        return Ok(Value::Array(items));
      }

      let mut map = Map::new();
      for (key, item) in entries {
        let key = match key {
          LuaValue::String(s) => s.to_str()?.to_string(),
          LuaValue::Integer(i) => i.to_string(),
          other => {
            return Err(LuaError::external(format!(
              "table keys must be strings, found {}",
              other.type_name()
            )));
          }
        };
        map.insert(key, lua_to_value_at(item, depth + 1)?);
      }
      Ok(Value::Object(map))
    }
    other => Err(LuaError::external(format!("unsupported value type: {}", other.type_name()))),
  }
}

/// Convert a dynamic value into a Lua value.
pub fn value_to_lua(lua: &Lua, value: &Value) -> LuaResult<LuaValue> {
  match value {
    Value::Null => Ok(LuaValue::Nil),
    Value::Bool(b) => Ok(LuaValue::Boolean(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => Ok(LuaValue::Integer(i)),
      None => Ok(LuaValue::Number(n.as_f64().unwrap_or(f64::NAN))),
    },
    Value::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
    Value::Array(items) => {
      let table = lua.create_table_with_capacity(items.len(), 0)?;
      for (i, item) in items.iter().enumerate() {
        table.raw_set(i + 1, value_to_lua(lua, item)?)?;
      }
      Ok(LuaValue::Table(table))
    }
    Value::Object(map) => {
      let table = lua.create_table_with_capacity(0, map.len())?;
      for (k, v) in map {
        table.raw_set(k.as_str(), value_to_lua(lua, v)?)?;
      }
      Ok(LuaValue::Table(table))
    }
  }
}
