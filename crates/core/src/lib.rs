//! Core types and error taxonomy for the semantic event pipeline.

pub mod error;
pub mod events;

pub use error::{Error, ErrorKind, Result};
pub use events::*;
