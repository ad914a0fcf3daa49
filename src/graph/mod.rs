//! Architecture Descriptor Module
//!
//! Layer count and per-layer widths of a dense network, independent of
//! any weight values.

mod info;

pub use info::GraphInfo;
