#![forbid(unsafe_code)]
//! chunkflow-core: values, group keys, immutable arrays, chunks, and the
//! allocator interfaces shared by every other crate.
//!
//! No async or I/O lives here; the concrete allocator is in `chunkflow-mem`.

pub mod array;
pub mod bitmap;
pub mod budget;
pub mod builder;
pub mod chunk;
pub mod config;
pub mod error;
pub mod group_key;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod prelude;
pub mod schema;
pub mod value;

pub use error::{Error, ErrorKind, Result};

/// Engine version stamped into manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
