//! CLI command implementations.

pub mod init;
pub mod run;
pub mod validate;
pub mod self_check;
pub mod benchmark;
