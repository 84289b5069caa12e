//! Session state and lifecycle.
//!
//! A [`Session`] is one client's relationship to one remote export. It is
//! created unconnected, brought up by [`Session::mount`], used through the
//! procedure methods in `ops`, and torn down by [`Session::unmount`] or by
//! being dropped.
//!
//! All channel traffic of a session, handshake and unmount included, runs
//! under a single lock so at most one RPC is in flight per session.

use super::config::{AuthMethod, SessionConfig, Transport};
use super::constants::{MAX_MACHINE_NAME, MOUNT_PROGRAM, MOUNT_V3, NFS_PROGRAM, NFS_V3};
use super::error::{Error, Failure};
use super::procedure::{self, Procedure, GETATTR};
use super::proto::{
    Connector, Credential, Endpoint, FileHandle, GetattrArgs, GssService, MountChannel, MountRes,
    NfsChannel,
};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Connection state guarded by the session lock.
#[derive(Default)]
struct Connection {
    channel: Option<Box<dyn NfsChannel>>,
}

/// A client session against one NFSv3 export.
///
/// # Examples
///
/// ```rust,no_run
/// use nfsc::{Connector, Session, SessionConfig};
/// use std::sync::Arc;
///
/// # fn run(connector: Arc<dyn Connector>) -> Result<(), nfsc::Error> {
/// let session = Session::new(SessionConfig::new("10.0.0.5", "/export"), connector)?;
/// session.mount()?;
/// let root = session.root_handle().expect("mounted");
/// let attrs = session.getattr(&root).map_err(|f| f.error)?;
/// println!("root has mode {:o}", attrs.mode);
/// session.unmount()?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    connected: AtomicBool,
    state: Mutex<Connection>,
    /// Set and cleared together with `state.channel`, and only while
    /// `state` is locked. Readers do not wait for in-flight calls.
    root: RwLock<Option<FileHandle>>,
}

impl Session {
    /// Creates an unconnected session.
    ///
    /// The configuration is validated here; channels are only opened by
    /// [`Session::mount`].
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Result<Self, Error> {
        config.validate()?;
        let session = Self {
            id: Uuid::new_v4(),
            config,
            connector,
            connected: AtomicBool::new(false),
            state: Mutex::new(Connection::default()),
            root: RwLock::new(None),
        };
        debug!("[{}] created session for {}", session.id, session.target());
        Ok(session)
    }

    /// Id prefixed to this session's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configuration the session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Server host name or address.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Path of the export on the server.
    pub fn export_path(&self) -> &str {
        &self.config.export_path
    }

    /// RPC transport of both channels.
    pub fn transport(&self) -> Transport {
        self.config.transport
    }

    /// User id sent in AUTH_SYS credentials.
    pub fn uid(&self) -> u32 {
        self.config.uid
    }

    /// Group id sent in AUTH_SYS credentials.
    pub fn gid(&self) -> u32 {
        self.config.gid
    }

    /// Authentication used on the NFS channel.
    pub fn auth_method(&self) -> AuthMethod {
        self.config.auth_method
    }

    /// Bound on every blocking call.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// True while a mounted export and its NFS channel are held.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Copy of the export's root file handle, if mounted.
    ///
    /// Does not wait for a call in progress.
    pub fn root_handle(&self) -> Option<FileHandle> {
        self.root.read().clone()
    }

    /// Replaces the root file handle with a copy of `bytes`.
    ///
    /// Only a connected session holds a root handle, so this fails with
    /// [`Error::NotMounted`] otherwise.
    pub fn set_root_handle(&self, bytes: &[u8]) -> Result<(), Error> {
        let handle = FileHandle::new(bytes);
        handle.check()?;
        let state = self.state.lock();
        if state.channel.is_none() {
            return Err(Error::NotMounted);
        }
        *self.root.write() = Some(handle);
        Ok(())
    }

    /// Runs one procedure on the session's NFS channel.
    ///
    /// Fails with [`Error::NotMounted`] without taking the lock when the
    /// session is not connected.
    pub(crate) fn execute<A, O, F, T, D>(
        &self,
        procedure: Procedure<A, O, F>,
        args: A,
        on_ok: impl FnOnce(&mut O) -> T,
        on_fail: impl FnOnce(&mut F) -> D,
    ) -> Result<T, Failure<D>> {
        if !self.is_connected() {
            return Err(Error::NotMounted.into());
        }
        let mut state = self.state.lock();
        // Unmounted while we waited for the lock.
        let channel = state.channel.as_deref_mut().ok_or(Error::NotMounted)?;
        procedure::invoke(channel, procedure, args, on_ok, on_fail)
    }

    /// Mounts the export and opens the NFS channel.
    ///
    /// On failure the session is left unconnected; anything the handshake
    /// opened has been released and a mounted export has been unmounted
    /// on a best-effort basis.
    pub fn mount(&self) -> Result<(), Error> {
        if self.is_connected() {
            return Err(Error::AlreadyMounted);
        }
        let mut state = self.state.lock();
        if state.channel.is_some() {
            return Err(Error::AlreadyMounted);
        }

        match self.handshake() {
            Ok((channel, root)) => {
                *self.root.write() = Some(root);
                state.channel = Some(channel);
                self.connected.store(true, Ordering::Release);
                info!(
                    "[{}] mounted {} over {}",
                    self.id,
                    self.target(),
                    self.config.transport
                );
                Ok(())
            }
            Err(err) => {
                error!("[{}] mount of {} failed: {}", self.id, self.target(), err);
                Err(err)
            }
        }
    }

    /// Unmounts the export and drops the NFS channel.
    ///
    /// The MOUNT channel is not kept after [`Session::mount`], so a new one
    /// is opened for the UMNT call. If that call fails the session stays
    /// connected.
    pub fn unmount(&self) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::NotMounted);
        }
        let mut state = self.state.lock();
        if state.channel.is_none() {
            return Err(Error::NotMounted);
        }

        let addr = resolve(&self.config.host)?;
        let mut mount_channel = self.open_mount_channel(addr)?;
        if let Err(status) = mount_channel.umnt(&self.config.export_path) {
            error!("[{}] unmount of {} failed: {}", self.id, self.target(), status);
            return Err(Error::Transport(status));
        }
        drop(mount_channel);

        self.connected.store(false, Ordering::Release);
        state.channel = None;
        *self.root.write() = None;
        info!("[{}] unmounted {}", self.id, self.target());
        Ok(())
    }

    /// MNT, then NFS channel bring-up with rollback.
    fn handshake(&self) -> Result<(Box<dyn NfsChannel>, FileHandle), Error> {
        let addr = resolve(&self.config.host)?;
        let mut mount_channel = self.open_mount_channel(addr)?;
        let root = match mount_channel.mnt(&self.config.export_path) {
            Ok(MountRes::Ok { fhandle, .. }) => fhandle,
            Ok(MountRes::Fail(status)) => return Err(Error::Mount(status)),
            Err(status) => return Err(Error::Transport(status)),
        };
        debug!("[{}] MNT {} returned {:?}", self.id, self.config.export_path, root);

        match self.open_nfs_channel(addr, &root) {
            Ok(channel) => Ok((channel, root)),
            Err(err) => {
                if let Err(status) = mount_channel.umnt(&self.config.export_path) {
                    warn!(
                        "[{}] rollback UMNT of {} failed: {}",
                        self.id, self.config.export_path, status
                    );
                }
                Err(err)
            }
        }
    }

    fn open_mount_channel(&self, addr: IpAddr) -> Result<Box<dyn MountChannel>, Error> {
        let endpoint = self.endpoint(addr, MOUNT_PROGRAM, MOUNT_V3);
        let credential = self.unix_credential()?;
        self.connector.connect_mount(&endpoint, credential)
    }

    /// Opens the NFS channel and checks it with a GETATTR of the root.
    fn open_nfs_channel(
        &self,
        addr: IpAddr,
        root: &FileHandle,
    ) -> Result<Box<dyn NfsChannel>, Error> {
        root.check()?;
        let endpoint = self.endpoint(addr, NFS_PROGRAM, NFS_V3);
        let credential = self.nfs_credential()?;
        let mut channel = self.connector.connect_nfs(&endpoint, credential)?;

        let args = GetattrArgs {
            object: root.clone(),
        };
        procedure::invoke(channel.as_mut(), GETATTR, args, |_| (), |_| ())
            .map_err(Failure::into_error)?;
        Ok(channel)
    }

    fn endpoint(&self, addr: IpAddr, program: u32, version: u32) -> Endpoint {
        Endpoint {
            addr,
            host: self.config.host.clone(),
            program,
            version,
            transport: self.config.transport,
            timeout: self.config.timeout(),
        }
    }

    fn nfs_credential(&self) -> Result<Credential, Error> {
        let credential = match self.config.auth_method {
            AuthMethod::None => Credential::Anonymous,
            AuthMethod::Unix => self.unix_credential()?,
            AuthMethod::Krb5 => Credential::Gss {
                service: GssService::None,
            },
            AuthMethod::Krb5i => Credential::Gss {
                service: GssService::Integrity,
            },
            AuthMethod::Krb5p => Credential::Gss {
                service: GssService::Privacy,
            },
        };
        Ok(credential)
    }

    fn unix_credential(&self) -> Result<Credential, Error> {
        let hostname =
            nix::unistd::gethostname().map_err(|e| Error::Hostname(e.desc().to_string()))?;
        Ok(Credential::Unix {
            machine_name: machine_name(&hostname.to_string_lossy()),
            uid: self.config.uid,
            gid: self.config.gid,
            gids: vec![self.config.gid],
        })
    }

    fn target(&self) -> String {
        format!("{}:{}", self.config.host, self.config.export_path)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        *self.root.get_mut() = None;
        if self.state.get_mut().channel.take().is_some() {
            info!("[{}] closing NFS channel to {}", self.id, self.target());
        }
    }
}

/// Numeric address first, then the system resolver.
fn resolve(host: &str) -> Result<IpAddr, Error> {
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Ok(addr);
    }
    let resolution = |reason: String| Error::Resolution {
        host: host.to_string(),
        reason,
    };
    (host, 0)
        .to_socket_addrs()
        .map_err(|e| resolution(e.to_string()))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| resolution("no addresses".to_string()))
}

/// Truncates to `MAX_MACHINE_NAME` bytes on a character boundary.
fn machine_name(hostname: &str) -> String {
    if hostname.len() <= MAX_MACHINE_NAME {
        return hostname.to_string();
    }
    let mut end = MAX_MACHINE_NAME;
    while !hostname.is_char_boundary(end) {
        end -= 1;
    }
    hostname[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::error::{MountStat, NfsStat, RpcStatus};
    use crate::modules::proto::{NfsCall, NfsReply, Res};
    use crate::modules::testing::{FakeServer, Record};
    use anyhow::Result;
    use std::thread;
    use std::time::Instant;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn setup_test_session(server: &FakeServer) -> Result<Session> {
        init_logging();
        let config = SessionConfig::new("10.0.0.5", "/export")
            .with_transport(Transport::Tcp)
            .with_identity(0, 0)
            .with_auth_method(AuthMethod::None)
            .with_timeout(Duration::from_secs(30));
        Ok(Session::new(config, server.connector())?)
    }

    fn assert_balanced(record: &Record) {
        assert_eq!(record.mount_opened, record.mount_dropped);
    }

    #[test]
    fn test_mount_connects_session() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        let session = setup_test_session(&server)?;

        session.mount()?;

        assert!(session.is_connected());
        let root = session.root_handle().expect("root handle");
        assert_eq!(root.as_bytes(), b"root-fh");

        let record = server.record();
        assert_eq!(record.mnt, vec!["/export".to_string()]);
        assert_eq!(record.mount_opened, 1);
        assert_eq!(record.mount_dropped, 1);
        assert_eq!(record.nfs_opened, 1);
        assert_eq!(record.nfs_dropped, 0);
        assert_eq!(record.nfs_credentials, vec![Credential::Anonymous]);
        assert!(matches!(record.calls[0], NfsCall::Getattr(_)));
        assert_eq!(record.released.len(), 1);

        let mount = &record.endpoints[0];
        assert_eq!(mount.program, MOUNT_PROGRAM);
        assert_eq!(mount.transport, Transport::Tcp);
        assert_eq!(mount.timeout, Duration::from_secs(30));
        assert_eq!(record.endpoints[1].program, NFS_PROGRAM);
        Ok(())
    }

    #[test]
    fn test_mount_channel_uses_unix_credential() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        let session = setup_test_session(&server)?;

        session.mount()?;

        match &server.record().mount_credentials[0] {
            Credential::Unix {
                machine_name,
                uid,
                gid,
                gids,
            } => {
                assert!(machine_name.len() <= MAX_MACHINE_NAME);
                assert_eq!((*uid, *gid), (0, 0));
                assert_eq!(gids, &vec![0]);
            }
            other => panic!("unexpected credential {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_mount_without_mount_service() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        server.fail_connect_mount(Some(Error::Transport(RpcStatus::CantConnect)));
        let session = setup_test_session(&server)?;

        let err = session.mount().unwrap_err();

        assert_eq!(err, Error::Transport(RpcStatus::CantConnect));
        assert!(!session.is_connected());
        assert!(session.root_handle().is_none());
        assert_eq!(server.record().nfs_opened, 0);
        Ok(())
    }

    #[test]
    fn test_mount_timeout_destroys_mount_channel() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        server.fail_mnt(Some(RpcStatus::TimedOut));
        let session = setup_test_session(&server)?;

        let err = session.mount().unwrap_err();

        assert!(err.is_timeout());
        assert!(!session.is_connected());
        let record = server.record();
        assert_eq!(record.mount_opened, 1);
        assert_balanced(&record);
        assert!(record.umnt.is_empty());
        Ok(())
    }

    #[test]
    fn test_mount_of_unexported_path() -> Result<()> {
        let server = FakeServer::new().export("/other", b"root-fh");
        let session = setup_test_session(&server)?;

        let err = session.mount().unwrap_err();

        assert_eq!(err, Error::Mount(MountStat::NoSuchEntry));
        assert!(!session.is_connected());
        let record = server.record();
        assert_balanced(&record);
        assert!(record.umnt.is_empty());
        assert_eq!(record.nfs_opened, 0);
        Ok(())
    }

    #[test]
    fn test_nfs_channel_failure_rolls_back_mount() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        server.fail_connect_nfs(Some(Error::Transport(RpcStatus::ProgramUnavailable)));
        let session = setup_test_session(&server)?;

        let err = session.mount().unwrap_err();

        assert_eq!(err, Error::Transport(RpcStatus::ProgramUnavailable));
        assert!(!session.is_connected());
        assert!(session.root_handle().is_none());
        let record = server.record();
        assert_eq!(record.umnt, vec!["/export".to_string()]);
        assert_balanced(&record);
        Ok(())
    }

    #[test]
    fn test_failed_liveness_check_rolls_back() -> Result<()> {
        let server = FakeServer::new()
            .export("/export", b"root-fh")
            .handler(|_| Ok(NfsReply::Getattr(Res::Fail(NfsStat::Stale, ()))));
        server.fail_umnt(Some(RpcStatus::CantSend));
        let session = setup_test_session(&server)?;

        let err = session.mount().unwrap_err();

        assert_eq!(err, Error::Nfs(NfsStat::Stale));
        assert!(!session.is_connected());
        let record = server.record();
        assert_eq!(record.umnt.len(), 1);
        assert_eq!(record.nfs_opened, 1);
        assert_eq!(record.nfs_dropped, 1);
        assert_eq!(record.released.len(), 1);
        assert_balanced(&record);
        Ok(())
    }

    #[test]
    fn test_double_mount_is_rejected() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        let session = setup_test_session(&server)?;
        session.mount()?;
        let before = server.record();

        assert_eq!(session.mount(), Err(Error::AlreadyMounted));

        assert!(session.is_connected());
        assert_eq!(session.root_handle().expect("root").as_bytes(), b"root-fh");
        assert_eq!(server.record().network_activity(), before.network_activity());
        Ok(())
    }

    #[test]
    fn test_unmount_resets_session() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        let session = setup_test_session(&server)?;
        session.mount()?;

        session.unmount()?;

        assert!(!session.is_connected());
        assert!(session.root_handle().is_none());
        let record = server.record();
        assert_eq!(record.umnt, vec!["/export".to_string()]);
        assert_eq!(record.mount_opened, 2);
        assert_balanced(&record);
        assert_eq!(record.nfs_dropped, 1);

        // A fresh handshake works after unmount.
        session.mount()?;
        assert!(session.is_connected());
        Ok(())
    }

    #[test]
    fn test_unmount_failure_keeps_connection() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        let session = setup_test_session(&server)?;
        session.mount()?;
        server.fail_umnt(Some(RpcStatus::TimedOut));

        let err = session.unmount().unwrap_err();

        assert_eq!(err, Error::Transport(RpcStatus::TimedOut));
        assert!(session.is_connected());
        assert!(session.root_handle().is_some());
        assert_eq!(server.record().nfs_dropped, 0);
        Ok(())
    }

    #[test]
    fn test_unmount_when_not_mounted() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        let session = setup_test_session(&server)?;

        assert_eq!(session.unmount(), Err(Error::NotMounted));
        assert_eq!(server.record().network_activity(), 0);
        Ok(())
    }

    #[test]
    fn test_drop_releases_channel() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        let session = setup_test_session(&server)?;
        session.mount()?;

        drop(session);

        let record = server.record();
        assert_eq!(record.nfs_dropped, 1);
        assert!(record.umnt.is_empty());
        Ok(())
    }

    #[test]
    fn test_set_root_handle_copies_bytes() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        let session = setup_test_session(&server)?;
        assert_eq!(session.set_root_handle(b"x"), Err(Error::NotMounted));

        session.mount()?;
        let mut bytes = b"replacement".to_vec();
        session.set_root_handle(&bytes)?;
        bytes.clear();

        assert_eq!(
            session.root_handle().expect("root").as_bytes(),
            b"replacement"
        );
        assert!(session.set_root_handle(&[0; 65]).is_err());
        Ok(())
    }

    #[test]
    fn test_root_handle_does_not_wait_for_calls() -> Result<()> {
        let server = FakeServer::new()
            .export("/export", b"root-fh")
            .call_delay(Duration::from_millis(500));
        let session = Arc::new(setup_test_session(&server)?);
        session.mount()?;

        let worker = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.null())
        };
        while server.record().in_flight == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        let started = Instant::now();
        let root = session.root_handle();
        let waited = started.elapsed();

        assert_eq!(root.map(FileHandle::into_bytes), Some(b"root-fh".to_vec()));
        assert!(waited < Duration::from_millis(100), "waited {:?}", waited);
        assert_eq!(server.record().in_flight, 1);
        assert!(worker.join().expect("worker panicked").is_ok());
        Ok(())
    }

    #[test]
    fn test_calls_are_serialized() -> Result<()> {
        let server = FakeServer::new()
            .export("/export", b"root-fh")
            .call_delay(Duration::from_millis(5));
        let session = Arc::new(setup_test_session(&server)?);
        session.mount()?;

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                thread::spawn(move || session.null())
            })
            .collect();
        for worker in workers {
            assert!(worker.join().expect("worker panicked").is_ok());
        }

        let record = server.record();
        // GETATTR from the handshake plus eight NULL calls.
        assert_eq!(record.calls.len(), 9);
        assert_eq!(record.max_in_flight, 1);
        Ok(())
    }

    #[test]
    fn test_unresolvable_host() {
        init_logging();
        let server = FakeServer::new().export("/export", b"root-fh");
        let config = SessionConfig::new("no-such-host.invalid", "/export");
        let session = Session::new(config, server.connector()).expect("valid config");

        let err = session.mount().unwrap_err();

        assert_eq!(err.name(), "NFSC_EGETHOSTBYNAME");
        assert_eq!(server.record().network_activity(), 0);
    }

    #[test]
    fn test_machine_name_truncation() {
        assert_eq!(machine_name("client"), "client");
        let long = "h".repeat(300);
        assert_eq!(machine_name(&long).len(), MAX_MACHINE_NAME);
        let multibyte = "é".repeat(200);
        let truncated = machine_name(&multibyte);
        assert!(truncated.len() <= MAX_MACHINE_NAME);
        assert!(truncated.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_gss_credentials() -> Result<()> {
        let server = FakeServer::new().export("/export", b"root-fh");
        let config =
            SessionConfig::new("10.0.0.5", "/export").with_auth_method(AuthMethod::Krb5p);
        let session = Session::new(config, server.connector())?;

        session.mount()?;

        assert_eq!(
            server.record().nfs_credentials,
            vec![Credential::Gss {
                service: GssService::Privacy
            }]
        );
        Ok(())
    }
}
