//! Tunable defaults of the detection agent

/// Defaults for the agent identity section
pub mod agent {
    pub const DB_TYPE: &str = "tendbha";
    pub const HEARTBEAT_INTERVAL_SECONDS: u64 = 10;
    pub const DETECT_INTERVAL_SECONDS: u64 = 10;
    /// Agents and GMs older than this are not alive
    pub const FRESHNESS_SECONDS: u64 = 60;
    /// Consecutive failed probes before a GM is asked to switch
    pub const DOUBLE_CHECK_TIMES: u32 = 3;
}

/// Defaults for the `[probe]` section
pub mod probe {
    pub const CONNECT_TIMEOUT_SECONDS: u64 = 3;
    pub const PROBE_STATEMENT: &str = "select 1";
}

/// GM intake
pub mod gm {
    pub const DOUBLE_CHECK_PATH: &str = "/api/doublecheck";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;
}
