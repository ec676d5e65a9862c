//! Infrastructure layer for cross-cutting concerns.
//!
//! Provides:
//! - Configuration file management and validation
//! - Error types and the crate `Result` alias

pub mod config;
pub mod error;
