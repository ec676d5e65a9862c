//! Workflow pipelines orchestrating stateless services.

pub mod batch;

pub use batch::{BatchOutcome, BatchWorkflow};
