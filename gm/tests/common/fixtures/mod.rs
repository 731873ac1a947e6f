//! Shared fixtures for the group manager tests:
//! - Scripted MySQL connector whose instances answer from in-memory state
//! - In-memory status store recording every write
//! - Instance and config builders

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod instances;
pub mod memory_store;
pub mod scripted;

pub use instances::*;
pub use memory_store::MemoryStore;
pub use scripted::{InstanceScript, ScriptedConnector};
