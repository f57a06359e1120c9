//! Utilities shared by the Castline crates: logging setup and time handling.

pub mod logger;
pub mod time;
