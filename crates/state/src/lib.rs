#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Activation and devnet state for devnet
//!
//! This crate owns the two pieces of mutable on-disk state outside the
//! binary cache: the active binary pointer under `home/bin/` and the
//! devnet metadata file `home/devnet.json`.

pub mod activation;
pub mod repository;

pub use activation::ActivationManager;
pub use repository::{DevnetRepository, FileDevnetRepository};
