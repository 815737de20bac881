//! Shared utilities.
//!
//! Lexical path handling used by the schema defaults and the watch graph.

pub mod path;
