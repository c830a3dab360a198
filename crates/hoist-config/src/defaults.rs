//! Default values for every recognised configuration key.
//!
//! # Design
//! - Centralize defaults so the loader, the CLI help text, and tests agree.
//! - Split-size defaults are per job kind and live with the orchestrator.

/// Object-store service configuration file read at connect time.
pub const OBJECT_STORE_CONFIG_FILE: &str = "/etc/hoist/hoist.conf";
/// Identity presented to the object store.
pub const OBJECT_STORE_IDENTITY: &str = "admin";
/// Pool (bucket) that receives copied objects.
pub const OBJECT_STORE_POOL: &str = "data";
/// Chunk size used when streaming a source file into the object store (4 MiB).
pub const TRANSFER_BUFFER_SIZE: usize = 4 * 1024 * 1024;
/// Lower bound for manifest split sizes in bytes.
pub const SPLIT_MIN_SIZE: u64 = 0;
/// Prefix applied to environment variable names.
pub const ENV_PREFIX: &str = "HOIST_";
