//! Growth Engine Module
//!
//! Function-preserving network growth:
//! - Net2Net widen/deepen transformations
//! - Rectifier forward pass used to run and check grown networks

pub mod forward;
pub mod net2net;

pub use forward::{forward, forward_trace, predict, relu, softmax, ForwardTrace};
pub use net2net::{deepen, deepen_weights, widen_weights, widen_with_columns, Net2Net};
