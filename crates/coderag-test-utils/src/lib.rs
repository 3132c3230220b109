#![deny(unsafe_code)]

//! Shared test utilities for the coderag workspace.
//!
//! Provides a scripted language model, canned document stores, config
//! builders, temporary workspaces and tracing helpers so pipeline tests stay
//! short and deterministic.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! coderag-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod model;
pub mod store;
pub mod tracing_setup;
pub mod workspace;

pub use config::TestConfigBuilder;
pub use model::ScriptedModel;
pub use store::{FailingStore, StaticStore};
pub use workspace::TestWorkspace;
