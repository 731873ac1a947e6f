pub mod errors;
pub mod hadb;
pub mod instance;
pub mod logging;
pub mod mailbox;
pub mod reporter;
pub mod throttle;

// Re-export commonly used types
pub use errors::HadbError;
pub use hadb::{HaDbClient, HadbConfig, StatusStore};
pub use instance::{FailureReport, InstanceInfo, SlaveInfo, SpiderNode};
pub use mailbox::{Mailbox, OverflowPolicy, TrySendError};
pub use reporter::{Heartbeat, ReportWorker, Reporter};
pub use throttle::{SwitchThrottle, ThrottleConfig, ThrottleDecision};
