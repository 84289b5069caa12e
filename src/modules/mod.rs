//! Core session engine modules.
//!
//! - `constants`: Protocol numbers, sizes and default values
//! - `error`: Transport, mount and filesystem error taxonomy
//! - `config`: Session configuration
//! - `proto`: NFSv3/MOUNTv3 records and the RPC channel traits
//! - `attr`: Attribute and weak cache consistency projection
//! - `procedure`: Procedure descriptors and the call executor
//! - `session`: Session state, mount handshake and unmount
//! - `ops`: The NFSv3 operations
//! - `client`: Async facade on tokio's blocking pool

pub mod attr;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
/// Operations on a mounted session.
pub mod ops;
pub mod procedure;
pub mod proto;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
