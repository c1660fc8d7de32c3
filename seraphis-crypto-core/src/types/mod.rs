//! Core type definitions and error types.

pub mod errors;

pub use errors::{CoreError, CoreResult};
