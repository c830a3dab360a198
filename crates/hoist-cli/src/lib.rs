#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Command-line front end for the hoist copy-and-verify pipeline.
//!
//! Layout:
//! - `cli.rs`: argument parsing, configuration assembly, and job dispatch
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;

pub use cli::run;
