//! Shared fixtures for the status store tests:
//! - Mock status store HTTP server
//! - Switch queue rows with confirm times relative to now

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_store;

pub use mock_store::{MockStoreServer, QueuedSwitch};
