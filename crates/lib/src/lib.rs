//! acorn-appdef: application definitions for the deployment controller
//!
//! This crate turns a declarative Acornfile into a fully bound app spec:
//! - `value`: dynamic JSON values and the deploy-argument map
//! - `images`: image data produced by builds, layered and aggregated
//! - `appdef`: decoding, image binding, serialization and the build watch graph
//! - `lua`: the sandboxed interpreter for Acornfiles and fragments
//! - `bundle` / `controller`: reading packaged app images and parsing app instances

pub mod appdef;
pub mod appspec;
pub mod bundle;
pub mod consts;
pub mod controller;
pub mod images;
pub mod interpret;
pub mod lua;
pub mod schema;
pub mod util;
pub mod value;
