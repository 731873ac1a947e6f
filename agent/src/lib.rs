pub mod assignment;
pub mod config;
pub mod constants;
pub mod detect;
pub mod gm_client;
pub mod heartbeat;
