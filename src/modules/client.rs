//! Async facade over [`Session`].
//!
//! Every RPC blocks until the server answers or the session timeout
//! expires. [`Client`] moves that work onto tokio's blocking pool so the
//! calling task stays free, and resolves once the call and its result
//! projection have finished.

use super::config::SessionConfig;
use super::error::{Error, Failure};
use super::proto::Connector;
use super::session::Session;
use log::error;
use std::sync::Arc;
use tokio::task;

/// Shareable async handle to one session.
#[derive(Clone)]
pub struct Client {
    session: Arc<Session>,
}

impl Client {
    /// Creates a client around a new, unconnected session.
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Result<Self, Error> {
        Ok(Self::from_session(Session::new(config, connector)?))
    }

    /// Wraps an existing session.
    pub fn from_session(session: Session) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    /// The underlying session, for synchronous use.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// See [`Session::is_connected`].
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Runs [`Session::mount`] off the current task.
    pub async fn mount(&self) -> Result<(), Error> {
        let session = Arc::clone(&self.session);
        blocking(move || session.mount()).await?
    }

    /// Runs [`Session::unmount`] off the current task.
    pub async fn unmount(&self) -> Result<(), Error> {
        let session = Arc::clone(&self.session);
        blocking(move || session.unmount()).await?
    }

    /// Runs one operation off the current task.
    ///
    /// ```rust,no_run
    /// # async fn example(client: nfsc::Client) -> Result<(), nfsc::Error> {
    /// let root = client.session().root_handle().ok_or(nfsc::Error::NotMounted)?;
    /// let page = client
    ///     .run(move |s| s.readdir(&root, &Default::default()))
    ///     .await
    ///     .map_err(|f| f.error)?;
    /// for entry in page.entries {
    ///     println!("{}", entry.name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<T, D, F>(&self, op: F) -> Result<T, Failure<D>>
    where
        F: FnOnce(&Session) -> Result<T, Failure<D>> + Send + 'static,
        T: Send + 'static,
        D: Send + 'static,
    {
        let session = Arc::clone(&self.session);
        blocking(move || op(&session)).await?
    }
}

/// Awaits `f` on the blocking pool; a panicked worker becomes
/// [`Error::Unknown`].
async fn blocking<R, F>(f: F) -> Result<R, Error>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    task::spawn_blocking(f).await.map_err(|e| {
        error!("blocking NFS worker failed: {}", e);
        Error::Unknown
    })
}
