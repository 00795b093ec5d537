//! Orchestration core: routing, workflows, async tasks, and streaming.
//!
//! The supervisor classifies each incoming message, dispatches it to the
//! simple-response or report workflow, and normalizes the result. Long
//! running report requests go through the task manager, which owns the
//! stream/async interruption protocol. The stream multiplexer turns a
//! workflow run into an ordered event sequence for one consumer.
//!
//! Persistence and the language model are injected collaborators
//! ([`store::ThreadStore`], [`model::ModelClient`]); the crate ships
//! in-memory and deterministic template implementations for the CLI and
//! tests.

pub mod classifier;
pub mod config;
pub mod model;
pub mod store;
pub mod stream;
pub mod supervisor;
pub mod tasks;
pub mod workflows;

pub use chat_orchestrator_sdk as sdk;

pub use config::OrchestratorConfig;
pub use supervisor::Supervisor;
pub use tasks::TaskManager;
