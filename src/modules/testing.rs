//! Scripted in-memory RPC peers for unit tests.

use super::error::{Error, MountStat, RpcStatus};
use super::proto::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Handler = Box<dyn FnMut(&NfsCall) -> Result<NfsReply, RpcStatus> + Send>;

/// What the fake peers observed.
#[derive(Debug, Default, Clone)]
pub(crate) struct Record {
    pub mount_opened: usize,
    pub mount_dropped: usize,
    pub nfs_opened: usize,
    pub nfs_dropped: usize,
    pub mount_credentials: Vec<Credential>,
    pub nfs_credentials: Vec<Credential>,
    pub endpoints: Vec<Endpoint>,
    pub mnt: Vec<String>,
    pub umnt: Vec<String>,
    pub calls: Vec<NfsCall>,
    pub released: Vec<NfsReply>,
    pub in_flight: usize,
    pub max_in_flight: usize,
}

impl Record {
    /// Number of channels opened or RPCs sent.
    pub fn network_activity(&self) -> usize {
        self.mount_opened + self.nfs_opened + self.mnt.len() + self.umnt.len() + self.calls.len()
    }
}

struct ServerState {
    exports: HashMap<String, FileHandle>,
    connect_mount_error: Option<Error>,
    connect_nfs_error: Option<Error>,
    mnt_error: Option<RpcStatus>,
    umnt_error: Option<RpcStatus>,
    call_delay: Duration,
    handler: Handler,
    record: Record,
}

/// A fake MOUNT and NFS server shared by the channels it hands out.
#[derive(Clone)]
pub(crate) struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

pub(crate) fn directory_attributes() -> Fattr {
    Fattr {
        ftype: Ftype::Directory,
        mode: 0o755,
        nlink: 2,
        uid: 0,
        gid: 0,
        size: 4096,
        used: 4096,
        rdev: SpecData::default(),
        fsid: 1,
        fileid: 1,
        atime: NfsTime::default(),
        mtime: NfsTime::default(),
        ctime: NfsTime::default(),
    }
}

/// Answers NULL and GETATTR; everything else is unavailable.
fn default_reply(call: &NfsCall) -> Result<NfsReply, RpcStatus> {
    match call {
        NfsCall::Null => Ok(NfsReply::Null(Res::Ok(()))),
        NfsCall::Getattr(_) => Ok(NfsReply::Getattr(Res::Ok(GetattrOk {
            obj_attributes: directory_attributes(),
        }))),
        _ => Err(RpcStatus::ProcedureUnavailable),
    }
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                exports: HashMap::new(),
                connect_mount_error: None,
                connect_nfs_error: None,
                mnt_error: None,
                umnt_error: None,
                call_delay: Duration::ZERO,
                handler: Box::new(default_reply),
                record: Record::default(),
            })),
        }
    }

    pub fn export(self, path: &str, root: &[u8]) -> Self {
        self.state
            .lock()
            .exports
            .insert(path.to_string(), FileHandle::new(root));
        self
    }

    pub fn handler(
        self,
        handler: impl FnMut(&NfsCall) -> Result<NfsReply, RpcStatus> + Send + 'static,
    ) -> Self {
        self.state.lock().handler = Box::new(handler);
        self
    }

    pub fn call_delay(self, delay: Duration) -> Self {
        self.state.lock().call_delay = delay;
        self
    }

    pub fn fail_connect_mount(&self, error: Option<Error>) {
        self.state.lock().connect_mount_error = error;
    }

    pub fn fail_connect_nfs(&self, error: Option<Error>) {
        self.state.lock().connect_nfs_error = error;
    }

    pub fn fail_mnt(&self, status: Option<RpcStatus>) {
        self.state.lock().mnt_error = status;
    }

    pub fn fail_umnt(&self, status: Option<RpcStatus>) {
        self.state.lock().umnt_error = status;
    }

    pub fn record(&self) -> Record {
        self.state.lock().record.clone()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(FakeConnector {
            server: self.clone(),
        })
    }
}

struct FakeConnector {
    server: FakeServer,
}

impl Connector for FakeConnector {
    fn connect_mount(
        &self,
        endpoint: &Endpoint,
        credential: Credential,
    ) -> Result<Box<dyn MountChannel>, Error> {
        let mut state = self.server.state.lock();
        state.record.endpoints.push(endpoint.clone());
        if let Some(err) = state.connect_mount_error.clone() {
            return Err(err);
        }
        state.record.mount_opened += 1;
        state.record.mount_credentials.push(credential);
        Ok(Box::new(FakeMountChannel {
            server: self.server.clone(),
        }))
    }

    fn connect_nfs(
        &self,
        endpoint: &Endpoint,
        credential: Credential,
    ) -> Result<Box<dyn NfsChannel>, Error> {
        let mut state = self.server.state.lock();
        state.record.endpoints.push(endpoint.clone());
        if let Some(err) = state.connect_nfs_error.clone() {
            return Err(err);
        }
        state.record.nfs_opened += 1;
        state.record.nfs_credentials.push(credential);
        Ok(Box::new(ScriptedChannel {
            server: self.server.clone(),
        }))
    }
}

struct FakeMountChannel {
    server: FakeServer,
}

impl MountChannel for FakeMountChannel {
    fn mnt(&mut self, dirpath: &str) -> Result<MountRes, RpcStatus> {
        let mut state = self.server.state.lock();
        state.record.mnt.push(dirpath.to_string());
        if let Some(status) = state.mnt_error {
            return Err(status);
        }
        Ok(match state.exports.get(dirpath) {
            Some(root) => MountRes::Ok {
                fhandle: root.clone(),
                auth_flavors: vec![1],
            },
            None => MountRes::Fail(MountStat::NoSuchEntry),
        })
    }

    fn umnt(&mut self, dirpath: &str) -> Result<(), RpcStatus> {
        let mut state = self.server.state.lock();
        state.record.umnt.push(dirpath.to_string());
        match state.umnt_error {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

impl Drop for FakeMountChannel {
    fn drop(&mut self) {
        self.server.state.lock().record.mount_dropped += 1;
    }
}

/// NFS channel answering from the server's handler.
pub(crate) struct ScriptedChannel {
    server: FakeServer,
}

impl ScriptedChannel {
    /// A channel on a fresh server that has not been opened by a connector.
    pub fn new(
        handler: impl FnMut(&NfsCall) -> Result<NfsReply, RpcStatus> + Send + 'static,
    ) -> Self {
        Self {
            server: FakeServer::new().handler(handler),
        }
    }

    pub fn released(&self) -> Vec<NfsReply> {
        self.server.record().released
    }

    pub fn calls(&self) -> Vec<NfsCall> {
        self.server.record().calls
    }
}

impl NfsChannel for ScriptedChannel {
    fn call(&mut self, call: NfsCall) -> Result<NfsReply, RpcStatus> {
        let delay = {
            let mut state = self.server.state.lock();
            let record = &mut state.record;
            record.in_flight += 1;
            record.max_in_flight = record.max_in_flight.max(record.in_flight);
            record.calls.push(call.clone());
            state.call_delay
        };

        // Let concurrent callers overlap if nothing serializes them.
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.server.state.lock();
        let reply = (state.handler)(&call);
        state.record.in_flight -= 1;
        reply
    }

    fn release(&mut self, reply: NfsReply) {
        self.server.state.lock().record.released.push(reply);
    }
}

impl Drop for ScriptedChannel {
    fn drop(&mut self) {
        self.server.state.lock().record.nfs_dropped += 1;
    }
}
