//! Core logic for the Dicky translation bot.
//!
//! This crate is framework-agnostic. Telegram and the completion service live
//! behind ports (traits) implemented in adapter crates.

pub mod completion;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handler;
pub mod logging;
pub mod messaging;
pub mod prompt;
pub mod segment;

pub use errors::{Error, Result};
