//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod adapter;
pub mod client;
pub mod collections;
pub mod config;
pub mod datastore;
pub mod debug;
pub mod error;
mod events;
pub mod framing;
pub mod master;
pub mod network;
pub mod proto;
pub mod show;
pub mod tasks;
pub mod txn;
pub mod xpath;
pub mod xpath_map;

pub use config::BackendCfg;
pub use master::Master;
