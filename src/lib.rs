//! # imzml - Streaming Writer for Imaging Mass Spectrometry Datasets
//!
//! `imzml` writes imzML 1.1 datasets: a binary sidecar (`.ibd`) holding the
//! encoded spectral arrays and an XML metadata document (`.imzML`) that
//! references them by byte offset. One write session produces exactly one
//! file pair.
//!
//! ## Key Features
//!
//! - **Single-pass streaming**: spectra are accepted one at a time and their
//!   arrays land in the ibd immediately, so datasets never need to fit in
//!   memory.
//! - **Mass-axis deduplication**: in the adaptive mode, identical m/z arrays
//!   are stored once and shared by every spectrum that submitted them,
//!   collapsing continuous-mode rasters to a single mass axis.
//! - **Exact-match safety**: deduplication reuses a stored array only after
//!   a byte-exact comparison against the file, never on a hash alone.
//! - **Verifiable sidecar**: the ibd digest (SHA-1) and UUID are embedded in
//!   the document so readers can check the pairing.
//! - **Ion mobility support**: an optional third array per spectrum, with
//!   configurable CV annotations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imzml::config::WriterConfig;
//! use imzml::spectrum::{Position, SpectrumParams};
//! use imzml::writer::ImzmlWriter;
//!
//! let mut writer = ImzmlWriter::new("acquisition.imzML", WriterConfig::default())?;
//!
//! // One call per pixel, in acquisition order.
//! writer.add_spectrum(
//!     &[100.0, 200.0, 300.0],
//!     &[10.0, 20.0, 15.0],
//!     Position::new(1, 1),
//!     SpectrumParams::new(),
//! )?;
//!
//! // Renders the imzML document and seals both files.
//! writer.finish()?;
//! # Ok::<(), imzml::writer::WriterError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`writer`]: the write session, mode controller and finalize step
//! - [`config`]: session configuration and its parseable enums
//! - [`codec`]: numeric encoding (data types, zlib, rounding)
//! - [`ibd`]: append-only binary sidecar with running digest
//! - [`dedup`]: two-tier content-addressed index for m/z arrays
//! - [`spectrum`]: per-spectrum records and optional-argument builder
//! - [`cv`]: controlled vocabulary accessions and param rendering
//!
//! ## Write Modes
//!
//! | Mode | m/z arrays stored | Document label |
//! |------|-------------------|----------------|
//! | continuous | first one only, shared by all | continuous |
//! | processed | one per spectrum | processed |
//! | auto | deduplicated by content | resolved at finalize |

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![allow(clippy::too_many_arguments)]

pub mod codec;
pub mod config;
pub mod cv;
pub mod dedup;
mod document;
pub mod ibd;
pub mod spectrum;
pub mod writer;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::codec::{Codec, DataType};
    pub use crate::config::{
        MobilityInfo, Polarity, SpectrumType, WriteMode, WriterConfig,
    };
    pub use crate::dedup::{DedupCache, Fingerprint, DEFAULT_CACHE_CAPACITY};
    pub use crate::ibd::{ArrayLocation, IbdWriter};
    pub use crate::spectrum::{
        IsolationOffset, Position, Precursor, SpectrumParams, SpectrumRecord, UserParam,
    };
    pub use crate::writer::{ImzmlWriter, WriterError};
}
