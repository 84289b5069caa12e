//! NFSv3 and MOUNTv3 wire records and the RPC collaborator seams.
//!
//! The record shapes follow RFC 1813. Encoding them to XDR is the job of
//! whatever implements [`Connector`], [`MountChannel`] and [`NfsChannel`];
//! the engine only moves typed records through those traits.

use super::constants::NFS3_FHSIZE;
use super::error::{Error, MountStat, NfsStat, RpcStatus};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Directory position returned by READDIR and READDIRPLUS.
pub type Cookie = u64;
/// Server token validating a [`Cookie`].
pub type CookieVerf = [u8; 8];
/// Client token of an exclusive CREATE.
pub type CreateVerf = [u8; 8];
/// Server boot token returned by WRITE and COMMIT.
pub type WriteVerf = [u8; 8];

/// Opaque handle of a remote filesystem object (`nfs_fh3`).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct FileHandle(Vec<u8>);

impl FileHandle {
    /// Copies `bytes` into a new handle.
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Raw handle bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Handle length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-length handle.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the handle, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub(crate) fn check(&self) -> Result<(), Error> {
        if self.0.len() > NFS3_FHSIZE {
            return Err(Error::InvalidRange("file handle longer than NFS3_FHSIZE"));
        }
        Ok(())
    }
}

impl From<Vec<u8>> for FileHandle {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// `nfstime3`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NfsTime {
    /// Seconds since the epoch.
    pub seconds: u32,
    /// Nanoseconds within the second.
    pub nseconds: u32,
}

/// `ftype3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ftype {
    /// Regular file.
    Regular = 1,
    /// Directory.
    Directory = 2,
    /// Block device.
    Block = 3,
    /// Character device.
    Character = 4,
    /// Symbolic link.
    Symlink = 5,
    /// Unix domain socket.
    Socket = 6,
    /// Named pipe.
    Fifo = 7,
}

/// `specdata3`: device numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecData {
    /// Major device number.
    pub major: u32,
    /// Minor device number.
    pub minor: u32,
}

/// `fattr3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fattr {
    /// Object type.
    pub ftype: Ftype,
    /// Protection mode bits.
    pub mode: u32,
    /// Hard link count.
    pub nlink: u32,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// Size in bytes.
    pub size: u64,
    /// Disk space used, in bytes.
    pub used: u64,
    /// Device numbers of a block or character device.
    pub rdev: SpecData,
    /// Filesystem id.
    pub fsid: u64,
    /// File id within the filesystem.
    pub fileid: u64,
    /// Last access.
    pub atime: NfsTime,
    /// Last data change.
    pub mtime: NfsTime,
    /// Last attribute change.
    pub ctime: NfsTime,
}

/// `wcc_attr`: the pre-operation subset of attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WccAttr {
    /// Size in bytes.
    pub size: u64,
    /// Last data change.
    pub mtime: NfsTime,
    /// Last attribute change.
    pub ctime: NfsTime,
}

/// `post_op_attr`
pub type PostOpAttr = Option<Fattr>;
/// `pre_op_attr`
pub type PreOpAttr = Option<WccAttr>;

/// `wcc_data`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WccData {
    /// Attributes before the operation.
    pub before: PreOpAttr,
    /// Attributes after the operation.
    pub after: PostOpAttr,
}

/// How SETATTR treats a timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SetTime {
    /// Leave it alone.
    #[default]
    DontChange,
    /// Use the server's clock.
    ServerTime,
    /// Use the given time.
    ClientTime(NfsTime),
}

/// `sattr3`: `None` leaves the attribute unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sattr {
    /// Protection mode bits.
    pub mode: Option<u32>,
    /// Owner user id.
    pub uid: Option<u32>,
    /// Owner group id.
    pub gid: Option<u32>,
    /// Truncate or extend to this size.
    pub size: Option<u64>,
    /// Access time.
    pub atime: SetTime,
    /// Modification time.
    pub mtime: SetTime,
}

/// `stable_how`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StableHow {
    /// The server may cache the data.
    Unstable = 0,
    /// Data is on stable storage, metadata may not be.
    DataSync = 1,
    /// Data and metadata are on stable storage.
    FileSync = 2,
}

/// `createhow3`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateHow {
    /// Create or truncate.
    Unchecked(Sattr),
    /// Fail if the name exists.
    Guarded(Sattr),
    /// Idempotent create keyed by a verifier.
    Exclusive(CreateVerf),
}

/// `diropargs3`: a name within a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirOpArgs {
    /// Directory handle.
    pub dir: FileHandle,
    /// Entry name.
    pub name: String,
}

/// GETATTR arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetattrArgs {
    /// Object to query.
    pub object: FileHandle,
}

/// SETATTR arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetattrArgs {
    /// Object to change.
    pub object: FileHandle,
    /// Attributes to set.
    pub new_attributes: Sattr,
    /// Expected ctime; the server refuses the change if it differs.
    pub guard: Option<NfsTime>,
}

/// ACCESS arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessArgs {
    /// Object to check.
    pub object: FileHandle,
    /// Requested `ACCESS_*` bits.
    pub access: u32,
}

/// READ arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadArgs {
    /// File to read.
    pub file: FileHandle,
    /// Byte offset.
    pub offset: u64,
    /// Bytes requested.
    pub count: u32,
}

/// WRITE arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteArgs {
    /// File to write.
    pub file: FileHandle,
    /// Byte offset.
    pub offset: u64,
    /// Bytes to write.
    pub count: u32,
    /// Commitment requested from the server.
    pub stable: StableHow,
    /// Exactly `count` bytes.
    pub data: Vec<u8>,
}

/// COMMIT arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitArgs {
    /// File to flush.
    pub file: FileHandle,
    /// Start of the range.
    pub offset: u64,
    /// Length of the range, 0 meaning to the end of file.
    pub count: u32,
}

/// CREATE arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateArgs {
    /// Where to create.
    pub place: DirOpArgs,
    /// Creation mode.
    pub how: CreateHow,
}

/// MKDIR arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkdirArgs {
    /// Where to create.
    pub place: DirOpArgs,
    /// Initial attributes.
    pub attributes: Sattr,
}

/// SYMLINK arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkArgs {
    /// Where to create.
    pub place: DirOpArgs,
    /// Initial attributes.
    pub attributes: Sattr,
    /// Link contents.
    pub target: String,
}

/// `mknoddata3`: the special file to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MknodData {
    /// Character device.
    Character(Sattr, SpecData),
    /// Block device.
    Block(Sattr, SpecData),
    /// Unix domain socket.
    Socket(Sattr),
    /// Named pipe.
    Fifo(Sattr),
}

/// MKNOD arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MknodArgs {
    /// Where to create.
    pub place: DirOpArgs,
    /// Node type and attributes.
    pub what: MknodData,
}

/// RENAME arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameArgs {
    /// Current name.
    pub from: DirOpArgs,
    /// New name.
    pub to: DirOpArgs,
}

/// READLINK arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadlinkArgs {
    /// Link to read.
    pub symlink: FileHandle,
}

/// READDIR arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaddirArgs {
    /// Directory to list.
    pub dir: FileHandle,
    /// Resume position, 0 for the start.
    pub cookie: Cookie,
    /// Verifier from the previous page.
    pub cookieverf: CookieVerf,
    /// Maximum reply size.
    pub count: u32,
}

/// READDIRPLUS arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaddirplusArgs {
    /// Directory to list.
    pub dir: FileHandle,
    /// Resume position, 0 for the start.
    pub cookie: Cookie,
    /// Verifier from the previous page.
    pub cookieverf: CookieVerf,
    /// Maximum size of the directory information.
    pub dircount: u32,
    /// Maximum reply size.
    pub maxcount: u32,
}

/// FSSTAT arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsstatArgs {
    /// Any handle within the filesystem.
    pub fsroot: FileHandle,
}

/// Status-discriminated result union shared by every NFSv3 reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Res<T, F> {
    /// `NFS3_OK` with the success body.
    Ok(T),
    /// Any other status with the failure body.
    Fail(NfsStat, F),
}

/// Successful LOOKUP body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupOk {
    /// Handle of the entry found.
    pub object: FileHandle,
    /// Attributes of the object.
    pub obj_attributes: PostOpAttr,
    /// Attributes of the directory.
    pub dir_attributes: PostOpAttr,
}

/// Successful GETATTR body.
#[derive(Debug, Clone, PartialEq)]
pub struct GetattrOk {
    /// Attributes of the object.
    pub obj_attributes: Fattr,
}

/// Successful ACCESS body.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessOk {
    /// Attributes of the object.
    pub obj_attributes: PostOpAttr,
    /// Granted subset of the requested bits.
    pub access: u32,
}

/// Successful READ body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOk {
    /// Attributes of the file.
    pub file_attributes: PostOpAttr,
    /// Bytes returned.
    pub count: u32,
    /// The read reached end of file.
    pub eof: bool,
    /// Bytes read.
    pub data: Vec<u8>,
}

/// Successful WRITE body.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOk {
    /// File attributes before and after.
    pub file_wcc: WccData,
    /// Bytes written.
    pub count: u32,
    /// Commitment the server actually gave.
    pub committed: StableHow,
    /// Changes when the server reboots.
    pub verf: WriteVerf,
}

/// Successful COMMIT body.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOk {
    /// File attributes before and after.
    pub file_wcc: WccData,
    /// Changes when the server reboots.
    pub verf: WriteVerf,
}

/// Successful CREATE, MKDIR, SYMLINK and MKNOD replies share this shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatedOk {
    /// New handle; servers may omit it.
    pub obj: Option<FileHandle>,
    /// Attributes of the object.
    pub obj_attributes: PostOpAttr,
    /// Parent directory before and after.
    pub dir_wcc: WccData,
}

/// RENAME body, both on success and failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenameWcc {
    /// Source directory before and after.
    pub fromdir_wcc: WccData,
    /// Target directory before and after.
    pub todir_wcc: WccData,
}

/// Successful READLINK body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadlinkOk {
    /// Attributes of the link.
    pub symlink_attributes: PostOpAttr,
    /// Link contents.
    pub data: String,
}

/// `entry3`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    /// File id within the filesystem.
    pub fileid: u64,
    /// Entry name.
    pub name: String,
    /// Position after this entry.
    pub cookie: Cookie,
}

/// Successful READDIR body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaddirOk {
    /// Attributes of the directory.
    pub dir_attributes: PostOpAttr,
    /// Verifier to send with the next page.
    pub cookieverf: CookieVerf,
    /// Entries in server order.
    pub entries: Vec<Entry>,
    /// No entries follow the last one.
    pub eof: bool,
}

/// `entryplus3`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPlus {
    /// File id within the filesystem.
    pub fileid: u64,
    /// Entry name.
    pub name: String,
    /// Position after this entry.
    pub cookie: Cookie,
    /// Attributes of the entry.
    pub name_attributes: PostOpAttr,
    /// Handle of the entry.
    pub name_handle: Option<FileHandle>,
}

/// Successful READDIRPLUS body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaddirplusOk {
    /// Attributes of the directory.
    pub dir_attributes: PostOpAttr,
    /// Verifier to send with the next page.
    pub cookieverf: CookieVerf,
    /// Entries in server order.
    pub entries: Vec<EntryPlus>,
    /// No entries follow the last one.
    pub eof: bool,
}

/// Successful FSSTAT body.
#[derive(Debug, Clone, PartialEq)]
pub struct FsstatOk {
    /// Attributes of the object.
    pub obj_attributes: PostOpAttr,
    /// Total bytes.
    pub tbytes: u64,
    /// Free bytes.
    pub fbytes: u64,
    /// Bytes available to the caller.
    pub abytes: u64,
    /// Total file slots.
    pub tfiles: u64,
    /// Free file slots.
    pub ffiles: u64,
    /// File slots available to the caller.
    pub afiles: u64,
    /// Seconds the values are expected to stay valid.
    pub invarsec: u32,
}

/// NULL reply.
pub type NullRes = Res<(), ()>;
/// LOOKUP reply.
pub type LookupRes = Res<LookupOk, PostOpAttr>;
/// GETATTR reply.
pub type GetattrRes = Res<GetattrOk, ()>;
/// SETATTR reply.
pub type SetattrRes = Res<WccData, WccData>;
/// ACCESS reply.
pub type AccessRes = Res<AccessOk, PostOpAttr>;
/// READ reply.
pub type ReadRes = Res<ReadOk, PostOpAttr>;
/// WRITE reply.
pub type WriteRes = Res<WriteOk, WccData>;
/// COMMIT reply.
pub type CommitRes = Res<CommitOk, WccData>;
/// CREATE, MKDIR, SYMLINK and MKNOD reply.
pub type CreatedRes = Res<CreatedOk, WccData>;
/// REMOVE and RMDIR reply.
pub type RemoveRes = Res<WccData, WccData>;
/// RENAME reply.
pub type RenameRes = Res<RenameWcc, RenameWcc>;
/// READLINK reply.
pub type ReadlinkRes = Res<ReadlinkOk, PostOpAttr>;
/// READDIR reply.
pub type ReaddirRes = Res<ReaddirOk, PostOpAttr>;
/// READDIRPLUS reply.
pub type ReaddirplusRes = Res<ReaddirplusOk, PostOpAttr>;
/// FSSTAT reply.
pub type FsstatRes = Res<FsstatOk, PostOpAttr>;

/// Arguments of one NFSv3 procedure, tagged by procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum NfsCall {
    /// NFSPROC3_NULL
    Null,
    /// NFSPROC3_GETATTR
    Getattr(GetattrArgs),
    /// NFSPROC3_SETATTR
    Setattr(SetattrArgs),
    /// NFSPROC3_LOOKUP
    Lookup(DirOpArgs),
    /// NFSPROC3_ACCESS
    Access(AccessArgs),
    /// NFSPROC3_READLINK
    Readlink(ReadlinkArgs),
    /// NFSPROC3_READ
    Read(ReadArgs),
    /// NFSPROC3_WRITE
    Write(WriteArgs),
    /// NFSPROC3_CREATE
    Create(CreateArgs),
    /// NFSPROC3_MKDIR
    Mkdir(MkdirArgs),
    /// NFSPROC3_SYMLINK
    Symlink(SymlinkArgs),
    /// NFSPROC3_MKNOD
    Mknod(MknodArgs),
    /// NFSPROC3_REMOVE
    Remove(DirOpArgs),
    /// NFSPROC3_RMDIR
    Rmdir(DirOpArgs),
    /// NFSPROC3_RENAME
    Rename(RenameArgs),
    /// NFSPROC3_READDIR
    Readdir(ReaddirArgs),
    /// NFSPROC3_READDIRPLUS
    Readdirplus(ReaddirplusArgs),
    /// NFSPROC3_FSSTAT
    Fsstat(FsstatArgs),
    /// NFSPROC3_COMMIT
    Commit(CommitArgs),
}

impl NfsCall {
    /// RFC 1813 procedure number.
    pub fn procedure(&self) -> u32 {
        match self {
            NfsCall::Null => 0,
            NfsCall::Getattr(_) => 1,
            NfsCall::Setattr(_) => 2,
            NfsCall::Lookup(_) => 3,
            NfsCall::Access(_) => 4,
            NfsCall::Readlink(_) => 5,
            NfsCall::Read(_) => 6,
            NfsCall::Write(_) => 7,
            NfsCall::Create(_) => 8,
            NfsCall::Mkdir(_) => 9,
            NfsCall::Symlink(_) => 10,
            NfsCall::Mknod(_) => 11,
            NfsCall::Remove(_) => 12,
            NfsCall::Rmdir(_) => 13,
            NfsCall::Rename(_) => 14,
            NfsCall::Readdir(_) => 16,
            NfsCall::Readdirplus(_) => 17,
            NfsCall::Fsstat(_) => 18,
            NfsCall::Commit(_) => 21,
        }
    }
}

/// Decoded reply of one NFSv3 procedure, tagged like [`NfsCall`].
#[derive(Debug, Clone, PartialEq)]
pub enum NfsReply {
    /// NFSPROC3_NULL
    Null(NullRes),
    /// NFSPROC3_GETATTR
    Getattr(GetattrRes),
    /// NFSPROC3_SETATTR
    Setattr(SetattrRes),
    /// NFSPROC3_LOOKUP
    Lookup(LookupRes),
    /// NFSPROC3_ACCESS
    Access(AccessRes),
    /// NFSPROC3_READLINK
    Readlink(ReadlinkRes),
    /// NFSPROC3_READ
    Read(ReadRes),
    /// NFSPROC3_WRITE
    Write(WriteRes),
    /// NFSPROC3_CREATE
    Create(CreatedRes),
    /// NFSPROC3_MKDIR
    Mkdir(CreatedRes),
    /// NFSPROC3_SYMLINK
    Symlink(CreatedRes),
    /// NFSPROC3_MKNOD
    Mknod(CreatedRes),
    /// NFSPROC3_REMOVE
    Remove(RemoveRes),
    /// NFSPROC3_RMDIR
    Rmdir(RemoveRes),
    /// NFSPROC3_RENAME
    Rename(RenameRes),
    /// NFSPROC3_READDIR
    Readdir(ReaddirRes),
    /// NFSPROC3_READDIRPLUS
    Readdirplus(ReaddirplusRes),
    /// NFSPROC3_FSSTAT
    Fsstat(FsstatRes),
    /// NFSPROC3_COMMIT
    Commit(CommitRes),
}

/// Reply of the MOUNT `MNT` procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum MountRes {
    /// The export was mounted.
    Ok {
        /// Root handle of the export.
        fhandle: FileHandle,
        /// Flavors the server accepts, in preference order.
        auth_flavors: Vec<u32>,
    },
    /// The server refused the mount.
    Fail(MountStat),
}

/// RPCSEC_GSS protection level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GssService {
    /// Authentication only (`krb5`).
    None,
    /// Checksummed messages (`krb5i`).
    Integrity,
    /// Encrypted messages (`krb5p`).
    Privacy,
}

/// Authentication attached to an RPC channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// AUTH_NONE
    Anonymous,
    /// AUTH_SYS
    Unix {
        /// Client host name, at most `MAX_MACHINE_NAME` bytes.
        machine_name: String,
        /// Caller's user id.
        uid: u32,
        /// Caller's group id.
        gid: u32,
        /// Supplementary groups.
        gids: Vec<u32>,
    },
    /// RPCSEC_GSS with the Kerberos 5 mechanism for the `nfs` service.
    Gss {
        /// Protection level.
        service: GssService,
    },
}

/// Where and how to open a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Resolved server address.
    pub addr: IpAddr,
    /// Host name as configured.
    pub host: String,
    /// ONC RPC program number.
    pub program: u32,
    /// Program version.
    pub version: u32,
    /// UDP or TCP.
    pub transport: super::config::Transport,
    /// Bound on every call made through the channel.
    pub timeout: Duration,
}

/// An open channel to the MOUNT service.
///
/// Dropping the channel releases it together with its credential.
pub trait MountChannel: Send {
    /// MOUNTPROC3_MNT
    fn mnt(&mut self, dirpath: &str) -> Result<MountRes, RpcStatus>;

    /// MOUNTPROC3_UMNT
    fn umnt(&mut self, dirpath: &str) -> Result<(), RpcStatus>;
}

/// An open channel to the NFS service.
///
/// Dropping the channel releases it together with its credential.
pub trait NfsChannel: Send {
    /// Performs one blocking round trip.
    fn call(&mut self, call: NfsCall) -> Result<NfsReply, RpcStatus>;

    /// Releases whatever the decoder allocated for `reply`.
    fn release(&mut self, reply: NfsReply) {
        drop(reply);
    }
}

/// Opens RPC channels; implemented by the transport layer.
pub trait Connector: Send + Sync {
    /// Opens a channel to the MOUNT program at `endpoint`.
    fn connect_mount(
        &self,
        endpoint: &Endpoint,
        credential: Credential,
    ) -> Result<Box<dyn MountChannel>, Error>;

    /// Opens a channel to the NFS program at `endpoint`.
    fn connect_nfs(
        &self,
        endpoint: &Endpoint,
        credential: Credential,
    ) -> Result<Box<dyn NfsChannel>, Error>;
}
