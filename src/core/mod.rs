//! Z/IP core - constants, error types, address rendering and command tables.
//!
//! This module has no async dependencies and is always compiled.

mod address;
pub mod commands;
mod constants;
mod error;

pub use address::*;
pub use commands::{command_class, command_class_aliases};
pub use constants::*;
pub use error::*;
