//! Shared types for tapforge

pub mod error;

pub use error::{GameError, Result};
