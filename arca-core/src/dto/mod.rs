//! Wire DTOs for external services

pub mod deposition;
