//! Glorp Core Library
//!
//! Session and message core for Glorp, a sound-guessing game played over a
//! wallet-addressed messaging network.
//! Provides: peer resolution, roster merging, payload classification and local persistence.

pub mod catalog;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod merge;
pub mod models;
pub mod network;
pub mod resolver;
pub mod session;
pub mod storage;

pub use catalog::*;
pub use classify::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use identity::*;
pub use logging::*;
pub use merge::*;
pub use models::*;
pub use network::*;
pub use resolver::*;
pub use session::*;
pub use storage::*;
