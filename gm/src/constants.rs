//! Statements, names and tunable defaults used by the group manager

use std::time::Duration;

/// Escape a value for use inside a single-quoted SQL string literal
pub fn quote_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Statements sent to MySQL instances
pub mod sql {
    pub const STOP_SLAVE: &str = "stop slave";
    pub const START_SLAVE: &str = "start slave";
    pub const SHOW_MASTER_STATUS: &str = "show master status";
    pub const SHOW_SLAVE_STATUS: &str = "show slave status";
    pub const RESET_SLAVE_ALL: &str = "reset slave /*!50516 all */";
    pub const SHOW_DATABASES: &str = "show databases";
    pub const MAX_BINLOG_SIZE: &str = "show variables like 'max_binlog_size'";

    /// Tables checked by the periodic checksum job
    pub const CHECKSUM_COUNT: &str = "select count(distinct db, tbl) as cnt \
         from infodba_schema.checksum \
         where ts > date_sub(now(), interval 14 day)";

    /// Tables whose checksum disagreed with the master
    pub const CHECKSUM_FAIL_COUNT: &str = "select count(distinct db, tbl) as cnt \
         from infodba_schema.checksum \
         where (this_crc <> master_crc or this_cnt <> master_cnt) \
         and ts > date_sub(now(), interval 14 day)";

    /// Delay query; the master server id is appended as a literal
    pub const DELAY_BY_MASTER_ID: &str = "select \
         cast(delay_sec as signed) as slave_delay, \
         cast(timestampdiff(second, master_time, now()) as signed) as time_delay \
         from infodba_schema.master_slave_heartbeat \
         where slave_server_id = @@server_id and master_server_id = ";
}

/// Statements understood by TDBCTL control nodes
pub mod tdbctl {
    pub const GET_ROUTE: &str =
        "SELECT Server_name, Host, Username, Password, Port, Wrapper FROM mysql.servers";
    pub const GET_NODES: &str = "select * from information_schema.TDBCTL_NODES";
    pub const FLUSH_ROUTING_FORCE: &str = "TDBCTL FLUSH ROUTING FORCE";

    pub fn drop_node(server_name: &str) -> String {
        format!("TDBCTL DROP NODE {}", server_name)
    }

    pub fn alter_node(server_name: &str, host: &str, user: &str, password: &str, port: u16) -> String {
        format!(
            "TDBCTL ALTER NODE {} OPTIONS(HOST '{}',USER '{}',PASSWORD '{}', Port {})",
            server_name,
            super::quote_literal(host),
            super::quote_literal(user),
            super::quote_literal(password),
            port
        )
    }

    /// Cluster roles, compared case-insensitively
    pub const ROLE_PRIMARY: &str = "primary";
    pub const ROLE_SECONDARY: &str = "Secondary";

    pub const STATUS_ONLINE: &str = "Online";
}

/// Database used for every connection and skipped by the useful-database scan
pub const DEFAULT_DATABASE: &str = "infodba_schema";

/// Databases that never hold user data
pub const SYSTEM_DATABASES: [&str; 6] = [
    "mysql",
    "information_schema",
    "performance_schema",
    "test",
    DEFAULT_DATABASE,
    "sys",
];

/// Defaults for the `[gcm]` section
pub mod gcm {
    pub const ALLOWED_CHECKSUM_MAX_OFFSET: i64 = 2;
    pub const ALLOWED_SLAVE_DELAY_MAX: i64 = 600;
    pub const ALLOWED_TIME_DELAY_MAX: i64 = 300;
    pub const EXEC_SLOW_KBYTES: i64 = 102400;
    pub const SLOW_WAIT_LOOPS: u32 = 10;
    pub const SLOW_WAIT_INTERVAL_SECONDS: u64 = 3;
}

/// Defaults for the `[mysql]` section
pub mod mysql {
    pub const CONNECT_TIMEOUT_SECONDS: u64 = 5;
    pub const QUERY_TIMEOUT_SECONDS: u64 = 30;
}

/// Switch request intake
pub mod intake {
    /// Capacity of the block-policy switch mailbox
    pub const SWITCH_QUEUE_CAPACITY: usize = 64;
}

/// Default heartbeat interval of the GM
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);
