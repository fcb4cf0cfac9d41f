//! gomodpack library.
//!
//! This crate packages a set of Go modules, fetched by the `go` toolchain for
//! two CPU architectures, into one self-extracting installer that rebuilds a
//! module cache on an offline host. It is used by the `gomodpack` CLI binary
//! and can be consumed programmatically for testing or custom pipelines.
//!
//! # Modules
//!
//! - [`arch`] - Architecture names, pairs, and bucket layout
//! - [`archive`] - Deterministic compressed archives of a cache root
//! - [`cache_root`] - Per-set cache directory layout
//! - [`catalog`] - Checksum and descriptor sidecars, atomic publication
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Layered build configuration
//! - [`digest`] - SHA-256 digests
//! - [`error`] - Error types and exit codes
//! - [`fetch`] - Running `go` for both architectures
//! - [`installer`] - Installer rendering, dispatch, and native reading
//! - [`inventory`] - Module list extraction from the download store
//! - [`layout`] - Merging the generic binary bucket into the host bucket
//! - [`manifest`] - Tagged manifests and their consolidation
//! - [`module_path`] - Escaped module path codec
//! - [`module_set`] - Module specifiers, fetch modes, and sets
//! - [`output`] - User-facing progress and summaries
//! - [`pipeline`] - Build orchestration
//! - [`set_list`] - Named module sets kept in a text file
//! - [`tag`] - Per-day build tags

pub mod arch;
pub mod archive;
pub mod cache_root;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod installer;
pub mod inventory;
pub mod layout;
pub mod manifest;
pub mod module_path;
pub mod module_set;
pub mod output;
pub mod pipeline;
pub mod set_list;
pub mod tag;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
