//! Data models.

pub mod checkpoint;
pub mod config;
pub mod rollback;
pub mod transaction;
