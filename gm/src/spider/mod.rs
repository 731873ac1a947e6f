pub mod elector;

pub use elector::{PrimaryElection, SpiderPrimaryElector, TdbctlInfo};
