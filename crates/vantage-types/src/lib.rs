//! Shared domain types for the Vantage client.

pub mod board;
pub mod config;
pub mod dashboard;
pub mod events;
pub mod game;
pub mod telemetry;
pub mod wire;

mod errors;

pub use errors::{Result, VantageError};
