#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for devnet
//!
//! This crate handles HTTP access to a running devnet: a pooled client with
//! bounded per-request retries, and the `RpcClient` contract the upgrade
//! orchestrator uses to read chain height, block times and governance
//! parameters.

mod client;
pub mod rpc;

pub use client::{NetClient, NetConfig};
pub use rpc::{parse_proto_duration, CometRpcClient, RpcClient};
