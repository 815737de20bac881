//! Lua implementation of the declarative source interpreter.
//!
//! - [`interpreter`] - the sandboxed [`LuaInterpreter`]
//! - [`convert`] - conversion between Lua values and dynamic values

pub mod convert;
pub mod interpreter;

pub use interpreter::LuaInterpreter;
