//! Arca pipeline execution and record lifecycle engine
//!
//! The engine supervises external-process execution of pipeline steps,
//! resolves file dependencies between steps, extracts metadata overrides
//! from step outputs, and drives remote deposition records through their
//! lifecycle (draft, upload, publish, discard, version) with compensating
//! recovery on failure.
//!
//! Architecture (leaf-first):
//! - `ratelimit`: durable token accounting gating every remote call
//! - `supervisor`: one OS thread + child process per step execution
//! - `resolver` / `runtime`: step input resolution and command construction
//! - `overrides`: metadata override extraction from step output files
//! - `lifecycle`: the record state machine with backup/restore compensation
//! - `orchestrator`: the per-batch-item driver tying it all together
//!
//! All services are owned by the orchestrator's composition root and passed
//! in explicitly; the engine has no process-wide singletons.

pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod overrides;
pub mod ratelimit;
pub mod remote;
pub mod resolver;
pub mod runtime;
pub mod store;
pub mod supervisor;

pub use error::{EngineError, Result};
pub use lifecycle::RecordLifecycle;
pub use orchestrator::{OrchestratorConfig, PipelineOrchestrator};
pub use ratelimit::{RateLimiter, RateLimits};
pub use remote::RateLimitedApi;
pub use resolver::ExecutionFileMap;
pub use runtime::{BuiltCommand, ComponentRuntime, OutputStrategy, ProbingRuntime};
pub use store::{FileCatalog, FileRole, JsonCatalog, JsonStore, RecordStore};
pub use supervisor::ExecutionSupervisor;
