//! CLI command implementations.

pub mod meta;
pub mod recover;
pub mod verify;
