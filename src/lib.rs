//! relaychat - Line-oriented chat relay
//!
//! This library provides the server side of a newline-delimited text chat:
//! name registration, broadcast and private-group delivery, and symmetric
//! per-sender block lists.

pub mod chat;

pub use chat::{RelayConfig, RelayServer};
