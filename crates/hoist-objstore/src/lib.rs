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

//! Object store client used by the copy and validate workers.
//!
//! Layout: `backend.rs` (connector/session seams and settings), `client.rs`
//! (`ObjectStoreClient`: chunked writes, attributes, validation), `digest.rs`
//! (MD5 helpers), `directory.rs` and `memory.rs` (concrete services),
//! `error.rs` (`StoreError`).

pub mod backend;
pub mod client;
pub mod digest;
pub mod directory;
pub mod error;
pub mod memory;

pub use backend::{ObjectBackend, ObjectStat, SessionSettings, StoreConnector};
pub use client::{ObjectStoreClient, WriteSummary};
pub use digest::{ContentDigest, DIGEST_ATTRIBUTE, digest_bytes, digest_reader, read_chunk};
pub use directory::{DirectoryConnector, DirectoryServiceConfig};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCluster, MemoryConnector};
