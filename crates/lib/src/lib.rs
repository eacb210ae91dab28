//! toolsmith-lib: staged build pipeline for native cross toolchains.
//!
//! The crate builds a dependency-ordered list of components (binutils,
//! compiler stages, C libraries, debugger) from source into one install tree:
//! - `Component`: one buildable unit, read from a TOML document
//! - `StepCache`: per-component completion markers with cascading invalidation
//! - `PathResolver`: source/build/install/staging layout of a workspace
//! - `mapping`: templated glob mappings used to promote staged artifacts
//! - `ComponentBuildDriver`: one component's lifecycle
//! - `ToolchainPipeline`: the ordered run over all components

pub mod cache;
pub mod component;
pub mod config;
pub mod consts;
pub mod driver;
pub mod layout;
pub mod lock;
pub mod mapping;
pub mod pipeline;
pub mod platform;
pub mod step;
pub mod tool;
pub mod util;

pub use cache::StepCache;
pub use component::{Component, ComponentKind, LibraryVariant, Profile};
pub use config::ToolchainConfig;
pub use driver::{BuildOutcome, BuildSettings, ComponentBuildDriver, DriverError};
pub use layout::{DirectoryLayout, PathResolver};
pub use pipeline::{BuildReport, ToolchainPipeline};
pub use step::BuildStep;
