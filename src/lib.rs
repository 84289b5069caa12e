#![doc(html_root_url = "https://docs.rs/nfsc/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! nfsc: An NFSv3 client session and call-dispatch engine
//!
//! Establishes a session against a remote NFSv3 export, issues individual
//! remote procedures over it and turns wire results into typed outcomes.
//! XDR encoding and the RPC transport are supplied by the caller through
//! the [`Connector`] trait.
//!
//! ## Features
//!
//! - Two-phase mount handshake with rollback on failure
//! - At most one RPC in flight per session
//! - All NFSv3 procedures through one generic call executor
//! - Failure replies keep their attribute and consistency data
//! - Async facade on tokio's blocking pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nfsc::{AuthMethod, Client, Connector, SessionConfig, Transport};
//! use std::sync::Arc;
//!
//! # async fn run(connector: Arc<dyn Connector>) -> anyhow::Result<()> {
//! let config = SessionConfig::new("10.0.0.5", "/export")
//!     .with_transport(Transport::Tcp)
//!     .with_auth_method(AuthMethod::None);
//! let client = Client::new(config, connector)?;
//!
//! client.mount().await?;
//! let root = client.session().root_handle().ok_or(nfsc::Error::NotMounted)?;
//! let found = client
//!     .run(move |s| s.lookup(&root, "hello.txt"))
//!     .await?;
//! println!("hello.txt is {:?}", found.handle);
//! client.unmount().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! - `Transport`: the RPC exchange failed (`RPC_TIMEDOUT`, `RPC_CANTSEND`, ...)
//! - `Mount`: the MOUNT service refused the export (`MNT3ERR_*`)
//! - `Nfs`: the NFS service returned a failure status (`NFS3ERR_*`)
//! - Session errors raised by the engine itself (`NFSC_*`)

pub mod modules;

pub use modules::attr::{Attributes, FileType, SetAttributes, Wcc};
pub use modules::client::Client;
pub use modules::config::{AuthMethod, SessionConfig, Transport};
pub use modules::error::{Domain, Error, Failure, MountStat, NfsStat, RpcStatus};
pub use modules::ops::ReadDirOptions;
pub use modules::proto::{Connector, Credential, FileHandle, MountChannel, NfsChannel};
pub use modules::session::Session;
