#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, unused)]
#![allow(clippy::module_name_repetitions)]

//! Typed configuration for the hoist copy/validate pipeline.
//!
//! Layout: `model.rs` (typed config sections), `defaults.rs` (default values),
//! `validate.rs` (value parsing helpers), `loader.rs` (`ConfigLoader` that layers
//! defaults, environment lookups, and explicit overrides).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, KNOWN_KEYS, env_var_name};
pub use model::{
    HoistConfig, JobConfig, ObjectStoreConfig, TransferConfig, ValidateConfig, ValidateStrategy,
};
