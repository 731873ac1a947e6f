pub mod binlog;
pub mod config;
pub mod constants;
pub mod errors;
pub mod health;
pub mod heartbeat;
pub mod lifecycle;
pub mod mysql;
pub mod spider;
pub mod switch;
pub mod web;

pub use errors::GmError;
