//! Workflow implementations behind the supervisor.
//!
//! Each workflow takes the thread history and the current user message and
//! produces final response text. Workflows never talk to the store; the
//! supervisor owns persistence on both sides of a dispatch.

pub mod report;
pub mod simple_chat;
