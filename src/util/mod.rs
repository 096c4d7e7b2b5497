//! Utilities shared across pipeline stages

pub mod constants;

pub use constants::TERMINAL;
