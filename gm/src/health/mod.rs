pub mod checker;

pub use checker::{ShieldOverrides, SlaveHealthChecker};
