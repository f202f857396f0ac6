//! CLI command implementations.

pub mod checkpoint;
pub mod generate;
pub mod history;
pub mod rollback;
