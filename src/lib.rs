//! Chunkdelta: signature-based binary deltas (rsync-style) in Rust.
//!
//! A basis file is fingerprinted into a compact signature; a new file is
//! scanned against that signature with a rolling checksum to produce a delta
//! of Copy (reuse basis bytes) and Data (literal bytes) commands; the delta is
//! applied to the basis to rebuild the new file, with optional hash
//! verification.
//!
//! The crate provides:
//! - Checksum and hash primitives (`hash`)
//! - Signature building (`signature`)
//! - Delta building, copy aggregation and application (`delta`)
//! - Binary signature and delta codecs (`format`)
//! - In-memory and file-oriented helpers (`engine`, `io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use chunkdelta::delta::{DeltaOptions, PatchOptions};
//! use chunkdelta::engine;
//! use chunkdelta::signature::SignatureOptions;
//!
//! let basis = b"hello old world".repeat(1000);
//! let new = b"hello new world".repeat(1000);
//!
//! let sig = engine::signature(&basis, SignatureOptions::default()).unwrap();
//! let delta = engine::diff(&sig, &new, DeltaOptions::default()).unwrap();
//! let patched = engine::patch(&basis, &delta, PatchOptions::default()).unwrap();
//! assert_eq!(patched, new);
//! ```

pub mod config;
pub mod delta;
pub mod engine;
pub mod error;
pub mod format;
pub mod hash;
pub mod io;
pub mod progress;
pub mod signature;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};
