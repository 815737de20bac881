//! App spec types.
//!
//! - [`types`] - the resolved [`AppSpec`] and its workload records
//! - [`builder`] - the reduced [`BuilderSpec`] view used to find build inputs
//! - [`implied`] - volumes and secrets referenced but not declared

pub mod builder;
pub mod implied;
pub mod types;

pub use builder::{AcornBuilderSpec, BuilderSpec, ContainerImageBuilderSpec, ImageBuilderSpec};
pub use implied::add_implied_resources;
pub use types::{Acorn, AcornBuild, AppSpec, Build, Container, ImageSpec, Secret, Service, Volume};
