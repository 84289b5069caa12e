//! Attribute projection.
//!
//! Converts wire attribute records into the values handed to callers, and
//! builds settable attributes the other way round.

use super::proto::{Fattr, Ftype, NfsTime, Sattr, SetTime, SpecData, WccAttr, WccData};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Kind of a remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file
    RegularFile,
    /// Directory
    Directory,
    /// Block device
    BlockDevice,
    /// Character device
    CharDevice,
    /// Symbolic link
    Symlink,
    /// Unix socket
    Socket,
    /// Named pipe
    NamedPipe,
}

impl From<Ftype> for FileType {
    fn from(ftype: Ftype) -> Self {
        match ftype {
            Ftype::Regular => FileType::RegularFile,
            Ftype::Directory => FileType::Directory,
            Ftype::Block => FileType::BlockDevice,
            Ftype::Character => FileType::CharDevice,
            Ftype::Symlink => FileType::Symlink,
            Ftype::Socket => FileType::Socket,
            Ftype::Fifo => FileType::NamedPipe,
        }
    }
}

/// Converts a wire timestamp.
pub fn system_time(time: NfsTime) -> SystemTime {
    UNIX_EPOCH + Duration::new(u64::from(time.seconds), time.nseconds.min(999_999_999))
}

/// Attributes of a remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    /// Object kind
    pub kind: FileType,
    /// Permission bits
    pub mode: u32,
    /// Hard link count
    pub nlink: u32,
    /// Owner
    pub uid: u32,
    /// Group
    pub gid: u32,
    /// Size in bytes
    pub size: u64,
    /// Bytes of disk space used
    pub used: u64,
    /// Device numbers for block and character devices
    pub rdev: SpecData,
    /// Filesystem id
    pub fsid: u64,
    /// File id, unique within the filesystem
    pub fileid: u64,
    /// Last access
    pub atime: SystemTime,
    /// Last data modification
    pub mtime: SystemTime,
    /// Last attribute change
    pub ctime: SystemTime,
}

impl Attributes {
    /// True for a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Directory
    }
}

impl From<&Fattr> for Attributes {
    fn from(attr: &Fattr) -> Self {
        Self {
            kind: attr.ftype.into(),
            mode: attr.mode,
            nlink: attr.nlink,
            uid: attr.uid,
            gid: attr.gid,
            size: attr.size,
            used: attr.used,
            rdev: attr.rdev,
            fsid: attr.fsid,
            fileid: attr.fileid,
            atime: system_time(attr.atime),
            mtime: system_time(attr.mtime),
            ctime: system_time(attr.ctime),
        }
    }
}

/// Pre-operation attributes of weak cache consistency data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreAttributes {
    /// Size before the operation
    pub size: u64,
    /// Modification time before the operation
    pub mtime: SystemTime,
    /// Change time before the operation
    pub ctime: SystemTime,
}

impl From<&WccAttr> for PreAttributes {
    fn from(attr: &WccAttr) -> Self {
        Self {
            size: attr.size,
            mtime: system_time(attr.mtime),
            ctime: system_time(attr.ctime),
        }
    }
}

/// Before/after snapshot around a mutating operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wcc {
    /// Attributes before the operation, if the server sent them
    pub before: Option<PreAttributes>,
    /// Attributes after the operation, if the server sent them
    pub after: Option<Attributes>,
}

impl Wcc {
    /// True when the object was not changed by anyone else between the
    /// cached attributes and the operation.
    pub fn unchanged_since(&self, cached: &Attributes) -> bool {
        match self.before {
            Some(before) => before.mtime == cached.mtime && before.size == cached.size,
            None => false,
        }
    }
}

pub(crate) fn post_op(attr: &Option<Fattr>) -> Option<Attributes> {
    attr.as_ref().map(Attributes::from)
}

pub(crate) fn wcc(data: &WccData) -> Wcc {
    Wcc {
        before: data.before.as_ref().map(PreAttributes::from),
        after: post_op(&data.after),
    }
}

/// Attributes to set on SETATTR, CREATE, MKDIR, SYMLINK and MKNOD.
///
/// Fields left unset are not changed on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetAttributes(Sattr);

impl SetAttributes {
    /// Changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the protection mode bits.
    pub fn mode(mut self, mode: u32) -> Self {
        self.0.mode = Some(mode);
        self
    }

    /// Sets the owner.
    pub fn uid(mut self, uid: u32) -> Self {
        self.0.uid = Some(uid);
        self
    }

    /// Sets the group.
    pub fn gid(mut self, gid: u32) -> Self {
        self.0.gid = Some(gid);
        self
    }

    /// Truncates or extends to `size` bytes.
    pub fn size(mut self, size: u64) -> Self {
        self.0.size = Some(size);
        self
    }

    /// Sets atime to the given client time.
    pub fn atime(mut self, seconds: u32, nseconds: u32) -> Self {
        self.0.atime = SetTime::ClientTime(NfsTime { seconds, nseconds });
        self
    }

    /// Sets atime to the server's current time.
    pub fn atime_now(mut self) -> Self {
        self.0.atime = SetTime::ServerTime;
        self
    }

    /// Sets mtime to the given client time.
    pub fn mtime(mut self, seconds: u32, nseconds: u32) -> Self {
        self.0.mtime = SetTime::ClientTime(NfsTime { seconds, nseconds });
        self
    }

    /// Sets mtime to the server's current time.
    pub fn mtime_now(mut self) -> Self {
        self.0.mtime = SetTime::ServerTime;
        self
    }

    /// The wire form.
    pub fn into_sattr(self) -> Sattr {
        self.0
    }
}

impl From<SetAttributes> for Sattr {
    fn from(attrs: SetAttributes) -> Self {
        attrs.0
    }
}
