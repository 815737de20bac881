//! Integration tests for acorn-appdef.

mod common;

mod bundle_tests;
mod resolve_tests;
mod value_tests;
mod watch_tests;
