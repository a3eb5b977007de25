//! Intake bot — guided-intake session engine with pluggable sinks.

pub mod config;
pub mod error;
pub mod flow;
pub mod health;
pub mod sinks;
pub mod transport;
