//! Core business logic modules.

pub mod backup;
pub mod checkpoint;
pub mod events;
pub mod manager;
pub mod points;
pub mod preview;
pub mod rollback;
pub mod store;
