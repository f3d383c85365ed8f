//! Arca core domain types
//!
//! Shared types for the Arca data-curation system:
//! - Pipeline and step definitions (what to run)
//! - Curated record lifecycle states (what gets deposited)
//! - Execution status and log types (how external components report)
//! - Deposition wire DTOs (what the remote repository returns)
//!
//! This crate is pure data: no I/O, no runtime dependencies.

pub mod domain;
pub mod dto;
pub mod version;
