//! CLI module
//!
//! # Commands
//!
//! - `serve` - HTTP endpoint for storage triggers
//! - `handle` - Run one event from a file or inline JSON
//! - `plan` - Show the derived table and load configuration for an object
//! - `policy` - Print the effective load policy
//! - `audit-schema` - Print the audit table schema

mod commands;
mod runner;
mod server;

pub use commands::{Cli, Commands, EventSource};
pub use runner::Runner;
pub use server::{router, serve};
