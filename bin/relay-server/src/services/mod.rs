//! Core chat services: history priming, turn persistence, streaming relay,
//! conversation grouping and detail lookup, plus the model client seam.

pub mod detail;
pub mod grouping;
pub mod history;
pub mod model;
pub mod persist;
pub mod relay;
