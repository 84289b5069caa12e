//! Protocol numbers, sizes and default values.

use std::time::Duration;

// ONC RPC programs
/// MOUNT program number.
pub const MOUNT_PROGRAM: u32 = 100005;
/// MOUNT protocol version.
pub const MOUNT_V3: u32 = 3;
/// NFS program number.
pub const NFS_PROGRAM: u32 = 100003;
/// NFS protocol version.
pub const NFS_V3: u32 = 3;

// RFC 1813 sizes
/// Largest file handle, in bytes.
pub const NFS3_FHSIZE: usize = 64;
/// Size of a READDIR cookie verifier.
pub const NFS3_COOKIEVERFSIZE: usize = 8;
/// Size of an exclusive CREATE verifier.
pub const NFS3_CREATEVERFSIZE: usize = 8;
/// Size of a WRITE verifier.
pub const NFS3_WRITEVERFSIZE: usize = 8;

/// Longest machine name carried by an AUTH_SYS credential.
pub const MAX_MACHINE_NAME: usize = 255;

/// Call timeout of a new session.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

// Directory read sizes, same as the Linux client
/// READDIR reply size.
pub const DEFAULT_READDIR_COUNT: u32 = 32688;
/// READDIRPLUS directory information size.
pub const DEFAULT_READDIRPLUS_DIRCOUNT: u32 = 8172;
/// READDIRPLUS reply size.
pub const DEFAULT_READDIRPLUS_MAXCOUNT: u32 = 32688;

// ACCESS3 bits
/// Read data or list a directory.
pub const ACCESS_READ: u32 = 0x0001;
/// Look up names in a directory.
pub const ACCESS_LOOKUP: u32 = 0x0002;
/// Rewrite data or directory entries.
pub const ACCESS_MODIFY: u32 = 0x0004;
/// Append data or add directory entries.
pub const ACCESS_EXTEND: u32 = 0x0008;
/// Delete directory entries.
pub const ACCESS_DELETE: u32 = 0x0010;
/// Execute a file.
pub const ACCESS_EXECUTE: u32 = 0x0020;

// Unix mode bits
/// Owner read, write and execute.
pub const MODE_IRWXU: u32 = 0o700;
/// Owner read.
pub const MODE_IRUSR: u32 = 0o400;
/// Owner write.
pub const MODE_IWUSR: u32 = 0o200;
/// Owner execute.
pub const MODE_IXUSR: u32 = 0o100;
/// Group read, write and execute.
pub const MODE_IRWXG: u32 = 0o070;
/// Group read.
pub const MODE_IRGRP: u32 = 0o040;
/// Group write.
pub const MODE_IWGRP: u32 = 0o020;
/// Group execute.
pub const MODE_IXGRP: u32 = 0o010;
/// Others read, write and execute.
pub const MODE_IRWXO: u32 = 0o007;
/// Others read.
pub const MODE_IROTH: u32 = 0o004;
/// Others write.
pub const MODE_IWOTH: u32 = 0o002;
/// Others execute.
pub const MODE_IXOTH: u32 = 0o001;
