#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fakes;
pub mod instances;
pub mod memory_store;
pub mod mock_store;

pub use fakes::*;
pub use instances::*;
pub use memory_store::MemoryStore;
pub use mock_store::MockStoreServer;
