#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Platform abstraction for devnet
//!
//! This crate provides:
//! - Filesystem helpers (atomic rename, symlinks, atomic writes)
//! - Process execution through the `CommandExecutor` trait, used for node
//!   binaries, the docker CLI and chain transactions

pub mod fs;
pub mod process;

pub use process::{
    CommandExecutor, CommandOutput, PlatformCommand, ProcessHandle, TokioCommandExecutor,
};
