//! NFSv3 operations on a mounted [`Session`].
//!
//! Each method checks its arguments, runs its procedure through the
//! session's executor and projects the reply. Argument errors are reported
//! as [`Error::InvalidRange`] before any network activity.
//!
//! Failed calls return a [`Failure`] carrying the attributes or weak cache
//! consistency data the server sent along with the error status.

use super::attr::{post_op, wcc, Attributes, SetAttributes, Wcc};
use super::constants::{
    DEFAULT_READDIRPLUS_DIRCOUNT, DEFAULT_READDIRPLUS_MAXCOUNT, DEFAULT_READDIR_COUNT,
};
use super::error::{Error, Failure};
use super::procedure::*;
use super::proto::*;
use super::session::Session;
use std::mem;

/// Result of LOOKUP.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    /// Handle of the named object
    pub handle: FileHandle,
    /// Attributes of the object
    pub attributes: Option<Attributes>,
    /// Attributes of the directory searched
    pub dir_attributes: Option<Attributes>,
}

/// Result of ACCESS.
#[derive(Debug, Clone, PartialEq)]
pub struct Access {
    /// Attributes of the object
    pub attributes: Option<Attributes>,
    /// Subset of the requested `ACCESS_*` bits the server grants
    pub granted: u32,
}

/// Result of READ.
#[derive(Debug, Clone, PartialEq)]
pub struct Read {
    /// Attributes of the file
    pub attributes: Option<Attributes>,
    /// Bytes read
    pub count: u32,
    /// True if the read reached the end of the file
    pub eof: bool,
    /// The bytes, `count` of them
    pub data: Vec<u8>,
}

/// Result of WRITE.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    /// Consistency data of the file
    pub wcc: Wcc,
    /// Bytes written
    pub count: u32,
    /// Stability the server committed the data with
    pub committed: StableHow,
    /// Write verifier, changes when the server reboots
    pub verifier: WriteVerf,
}

/// Result of COMMIT.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// Consistency data of the file
    pub wcc: Wcc,
    /// Write verifier, compare with the one WRITE returned
    pub verifier: WriteVerf,
}

/// Result of CREATE, MKDIR, SYMLINK and MKNOD.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    /// Handle of the new object, if the server returned one
    pub handle: Option<FileHandle>,
    /// Attributes of the new object
    pub attributes: Option<Attributes>,
    /// Consistency data of the parent directory
    pub dir_wcc: Wcc,
}

/// Directory consistency data of RENAME, on success and failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rename {
    /// Source directory
    pub from_dir_wcc: Wcc,
    /// Target directory
    pub to_dir_wcc: Wcc,
}

/// Result of READLINK.
#[derive(Debug, Clone, PartialEq)]
pub struct Readlink {
    /// Attributes of the link
    pub attributes: Option<Attributes>,
    /// Link target
    pub target: String,
}

/// Directory entry returned by READDIR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File id within the filesystem
    pub fileid: u64,
    /// Entry name
    pub name: String,
    /// Resume point after this entry
    pub cookie: Cookie,
}

/// Directory entry returned by READDIRPLUS.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntryPlus {
    /// File id within the filesystem
    pub fileid: u64,
    /// Entry name
    pub name: String,
    /// Resume point after this entry
    pub cookie: Cookie,
    /// Attributes of the entry, if the server sent them
    pub attributes: Option<Attributes>,
    /// Handle of the entry, if the server sent one
    pub handle: Option<FileHandle>,
}

/// One page of a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DirPage<E> {
    /// Attributes of the directory
    pub dir_attributes: Option<Attributes>,
    /// Verifier to send with the next page
    pub cookieverf: CookieVerf,
    /// Entries in server order
    pub entries: Vec<E>,
    /// True if this is the last page
    pub eof: bool,
}

/// Result of FSSTAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    /// Attributes of the filesystem root
    pub attributes: Option<Attributes>,
    /// Size of the filesystem
    pub total_bytes: u64,
    /// Free bytes
    pub free_bytes: u64,
    /// Free bytes available to the caller
    pub available_bytes: u64,
    /// File slots in the filesystem
    pub total_files: u64,
    /// Free file slots
    pub free_files: u64,
    /// Free file slots available to the caller
    pub available_files: u64,
    /// Seconds for which the values are not expected to change
    pub invarsec: u32,
}

/// Position and sizes of a READDIR or READDIRPLUS request.
///
/// Start with the default and pass the last entry's cookie and the
/// returned verifier to fetch the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadDirOptions {
    /// Resume point, 0 for the first page
    pub cookie: Cookie,
    /// Verifier returned with the previous page
    pub cookieverf: CookieVerf,
    /// READDIR reply size limit
    pub count: u32,
    /// READDIRPLUS limit on directory information
    pub dircount: u32,
    /// READDIRPLUS reply size limit
    pub maxcount: u32,
}

impl Default for ReadDirOptions {
    fn default() -> Self {
        Self {
            cookie: 0,
            cookieverf: [0; 8],
            count: DEFAULT_READDIR_COUNT,
            dircount: DEFAULT_READDIRPLUS_DIRCOUNT,
            maxcount: DEFAULT_READDIRPLUS_MAXCOUNT,
        }
    }
}

impl ReadDirOptions {
    /// Options resuming after `cookie`.
    pub fn resume(cookie: Cookie, cookieverf: CookieVerf) -> Self {
        Self {
            cookie,
            cookieverf,
            ..Self::default()
        }
    }
}

fn dir_op(dir: &FileHandle, name: &str) -> Result<DirOpArgs, Error> {
    dir.check()?;
    Ok(DirOpArgs {
        dir: dir.clone(),
        name: name.to_string(),
    })
}

fn check_range(offset: u64, count: u32) -> Result<(), Error> {
    match offset.checked_add(u64::from(count)) {
        Some(_) => Ok(()),
        None => Err(Error::InvalidRange("offset + count overflows")),
    }
}

fn created(ok: &mut CreatedOk) -> Created {
    Created {
        handle: ok.obj.take(),
        attributes: post_op(&ok.obj_attributes),
        dir_wcc: wcc(&ok.dir_wcc),
    }
}

fn rename_wcc(data: &mut RenameWcc) -> Rename {
    Rename {
        from_dir_wcc: wcc(&data.fromdir_wcc),
        to_dir_wcc: wcc(&data.todir_wcc),
    }
}

fn wcc_of(data: &mut WccData) -> Wcc {
    wcc(data)
}

fn attributes_of(attr: &mut PostOpAttr) -> Option<Attributes> {
    post_op(attr)
}

impl Session {
    /// NULL: checks that the server answers.
    pub fn null(&self) -> Result<(), Failure<()>> {
        self.execute(NULL, (), |_| (), |_| ())
    }

    /// Looks up `name` in `dir`.
    pub fn lookup(
        &self,
        dir: &FileHandle,
        name: &str,
    ) -> Result<Lookup, Failure<Option<Attributes>>> {
        let args = dir_op(dir, name)?;
        self.execute(
            LOOKUP,
            args,
            |ok| Lookup {
                handle: mem::take(&mut ok.object),
                attributes: post_op(&ok.obj_attributes),
                dir_attributes: post_op(&ok.dir_attributes),
            },
            attributes_of,
        )
    }

    /// GETATTR: current attributes of `object`.
    pub fn getattr(&self, object: &FileHandle) -> Result<Attributes, Failure<()>> {
        object.check()?;
        let args = GetattrArgs {
            object: object.clone(),
        };
        self.execute(
            GETATTR,
            args,
            |ok| Attributes::from(&ok.obj_attributes),
            |_| (),
        )
    }

    /// Sets attributes of `object`.
    ///
    /// With `guard` set the server only applies the change if the object's
    /// ctime still equals it, and fails with `NFS3ERR_NOT_SYNC` otherwise.
    pub fn setattr(
        &self,
        object: &FileHandle,
        attributes: SetAttributes,
        guard: Option<NfsTime>,
    ) -> Result<Wcc, Failure<Wcc>> {
        object.check()?;
        let args = SetattrArgs {
            object: object.clone(),
            new_attributes: attributes.into(),
            guard,
        };
        self.execute(SETATTR, args, wcc_of, wcc_of)
    }

    /// Asks which of the `ACCESS_*` bits in `access` the caller holds.
    pub fn access(
        &self,
        object: &FileHandle,
        access: u32,
    ) -> Result<Access, Failure<Option<Attributes>>> {
        object.check()?;
        let args = AccessArgs {
            object: object.clone(),
            access,
        };
        self.execute(
            ACCESS,
            args,
            |ok| Access {
                attributes: post_op(&ok.obj_attributes),
                granted: ok.access,
            },
            attributes_of,
        )
    }

    /// Reads up to `count` bytes at `offset`.
    pub fn read(
        &self,
        file: &FileHandle,
        offset: u64,
        count: u32,
    ) -> Result<Read, Failure<Option<Attributes>>> {
        file.check()?;
        check_range(offset, count)?;
        let args = ReadArgs {
            file: file.clone(),
            offset,
            count,
        };
        self.execute(
            READ,
            args,
            |ok| Read {
                attributes: post_op(&ok.file_attributes),
                count: ok.count,
                eof: ok.eof,
                data: mem::take(&mut ok.data),
            },
            attributes_of,
        )
    }

    /// Writes the first `count` bytes of `data` at `offset`.
    pub fn write(
        &self,
        file: &FileHandle,
        offset: u64,
        count: u32,
        stable: StableHow,
        data: &[u8],
    ) -> Result<Write, Failure<Wcc>> {
        file.check()?;
        let len = usize::try_from(count).map_err(|_| Error::InvalidRange("count"))?;
        if len > data.len() {
            return Err(Error::InvalidRange("count exceeds buffer length").into());
        }
        check_range(offset, count)?;
        let args = WriteArgs {
            file: file.clone(),
            offset,
            count,
            stable,
            data: data[..len].to_vec(),
        };
        self.execute(
            WRITE,
            args,
            |ok| Write {
                wcc: wcc(&ok.file_wcc),
                count: ok.count,
                committed: ok.committed,
                verifier: ok.verf,
            },
            wcc_of,
        )
    }

    /// Flushes unstable writes in `offset..offset + count` to stable
    /// storage. A count of zero means to the end of the file.
    pub fn commit(
        &self,
        file: &FileHandle,
        offset: u64,
        count: u32,
    ) -> Result<Commit, Failure<Wcc>> {
        file.check()?;
        check_range(offset, count)?;
        let args = CommitArgs {
            file: file.clone(),
            offset,
            count,
        };
        self.execute(
            COMMIT,
            args,
            |ok| Commit {
                wcc: wcc(&ok.file_wcc),
                verifier: ok.verf,
            },
            wcc_of,
        )
    }

    /// Creates a regular file.
    pub fn create(
        &self,
        dir: &FileHandle,
        name: &str,
        how: CreateHow,
    ) -> Result<Created, Failure<Wcc>> {
        let args = CreateArgs {
            place: dir_op(dir, name)?,
            how,
        };
        self.execute(CREATE, args, created, wcc_of)
    }

    /// REMOVE: deletes a non-directory entry.
    pub fn remove(&self, dir: &FileHandle, name: &str) -> Result<Wcc, Failure<Wcc>> {
        let args = dir_op(dir, name)?;
        self.execute(REMOVE, args, wcc_of, wcc_of)
    }

    /// MKDIR
    pub fn mkdir(
        &self,
        dir: &FileHandle,
        name: &str,
        attributes: SetAttributes,
    ) -> Result<Created, Failure<Wcc>> {
        let args = MkdirArgs {
            place: dir_op(dir, name)?,
            attributes: attributes.into(),
        };
        self.execute(MKDIR, args, created, wcc_of)
    }

    /// RMDIR: deletes an empty directory.
    pub fn rmdir(&self, dir: &FileHandle, name: &str) -> Result<Wcc, Failure<Wcc>> {
        let args = dir_op(dir, name)?;
        self.execute(RMDIR, args, wcc_of, wcc_of)
    }

    /// Renames `from_dir/from_name` to `to_dir/to_name`.
    pub fn rename(
        &self,
        from_dir: &FileHandle,
        from_name: &str,
        to_dir: &FileHandle,
        to_name: &str,
    ) -> Result<Rename, Failure<Rename>> {
        let args = RenameArgs {
            from: dir_op(from_dir, from_name)?,
            to: dir_op(to_dir, to_name)?,
        };
        self.execute(RENAME, args, rename_wcc, rename_wcc)
    }

    /// Creates a symbolic link `name` in `dir` pointing at `target`.
    pub fn symlink(
        &self,
        dir: &FileHandle,
        name: &str,
        target: &str,
        attributes: SetAttributes,
    ) -> Result<Created, Failure<Wcc>> {
        let args = SymlinkArgs {
            place: dir_op(dir, name)?,
            attributes: attributes.into(),
            target: target.to_string(),
        };
        self.execute(SYMLINK, args, created, wcc_of)
    }

    /// Creates a device, socket or named pipe.
    pub fn mknod(
        &self,
        dir: &FileHandle,
        name: &str,
        what: MknodData,
    ) -> Result<Created, Failure<Wcc>> {
        let args = MknodArgs {
            place: dir_op(dir, name)?,
            what,
        };
        self.execute(MKNOD, args, created, wcc_of)
    }

    /// READLINK: contents of a symbolic link.
    pub fn readlink(
        &self,
        symlink: &FileHandle,
    ) -> Result<Readlink, Failure<Option<Attributes>>> {
        symlink.check()?;
        let args = ReadlinkArgs {
            symlink: symlink.clone(),
        };
        self.execute(
            READLINK,
            args,
            |ok| Readlink {
                attributes: post_op(&ok.symlink_attributes),
                target: mem::take(&mut ok.data),
            },
            attributes_of,
        )
    }

    /// Reads one page of directory entries.
    pub fn readdir(
        &self,
        dir: &FileHandle,
        options: &ReadDirOptions,
    ) -> Result<DirPage<DirEntry>, Failure<Option<Attributes>>> {
        dir.check()?;
        let args = ReaddirArgs {
            dir: dir.clone(),
            cookie: options.cookie,
            cookieverf: options.cookieverf,
            count: options.count,
        };
        self.execute(
            READDIR,
            args,
            |ok| DirPage {
                dir_attributes: post_op(&ok.dir_attributes),
                cookieverf: ok.cookieverf,
                entries: mem::take(&mut ok.entries)
                    .into_iter()
                    .map(|entry| DirEntry {
                        fileid: entry.fileid,
                        name: entry.name,
                        cookie: entry.cookie,
                    })
                    .collect(),
                eof: ok.eof,
            },
            attributes_of,
        )
    }

    /// Reads one page of directory entries with their attributes and
    /// handles.
    pub fn readdirplus(
        &self,
        dir: &FileHandle,
        options: &ReadDirOptions,
    ) -> Result<DirPage<DirEntryPlus>, Failure<Option<Attributes>>> {
        dir.check()?;
        if options.dircount > options.maxcount {
            return Err(Error::InvalidRange("dircount exceeds maxcount").into());
        }
        let args = ReaddirplusArgs {
            dir: dir.clone(),
            cookie: options.cookie,
            cookieverf: options.cookieverf,
            dircount: options.dircount,
            maxcount: options.maxcount,
        };
        self.execute(
            READDIRPLUS,
            args,
            |ok| DirPage {
                dir_attributes: post_op(&ok.dir_attributes),
                cookieverf: ok.cookieverf,
                entries: mem::take(&mut ok.entries)
                    .into_iter()
                    .map(|entry| DirEntryPlus {
                        attributes: post_op(&entry.name_attributes),
                        fileid: entry.fileid,
                        name: entry.name,
                        cookie: entry.cookie,
                        handle: entry.name_handle,
                    })
                    .collect(),
                eof: ok.eof,
            },
            attributes_of,
        )
    }

    /// Filesystem space and file counts.
    pub fn fsstat(&self, root: &FileHandle) -> Result<FsStat, Failure<Option<Attributes>>> {
        root.check()?;
        let args = FsstatArgs {
            fsroot: root.clone(),
        };
        self.execute(
            FSSTAT,
            args,
            |ok| FsStat {
                attributes: post_op(&ok.obj_attributes),
                total_bytes: ok.tbytes,
                free_bytes: ok.fbytes,
                available_bytes: ok.abytes,
                total_files: ok.tfiles,
                free_files: ok.ffiles,
                available_files: ok.afiles,
                invarsec: ok.invarsec,
            },
            attributes_of,
        )
    }
}
