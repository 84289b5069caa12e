//! Procedure descriptors and the call executor.
//!
//! Every NFSv3 procedure is described by a [`Procedure`]: a name plus a pair
//! of plain functions that wrap its arguments into an [`NfsCall`] and pick
//! its result out of an [`NfsReply`]. [`invoke`] is the only code path that
//! talks to an [`NfsChannel`]; the operations in `ops` differ only in the
//! descriptor they pass and in how they project the result.

use super::error::{Error, Failure, RpcStatus};
use super::proto::*;
use log::debug;

/// Binding of one remote procedure to its argument and result shapes.
pub struct Procedure<A, O, F> {
    /// Procedure name as used in log lines.
    pub name: &'static str,
    /// Wraps the arguments for the channel.
    pub marshal: fn(A) -> NfsCall,
    /// Selects the matching result from a decoded reply.
    pub unmarshal: fn(&mut NfsReply) -> Option<&mut Res<O, F>>,
}

impl<A, O, F> Clone for Procedure<A, O, F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, O, F> Copy for Procedure<A, O, F> {}

macro_rules! procedure {
    ($(#[$meta:meta])* $konst:ident, $name:literal, $variant:ident, $args:ty, $ok:ty, $fail:ty) => {
        #[doc = concat!("NFSPROC3_", $name)]
        $(#[$meta])*
        pub const $konst: Procedure<$args, $ok, $fail> = Procedure {
            name: $name,
            marshal: NfsCall::$variant,
            unmarshal: {
                fn unmarshal(reply: &mut NfsReply) -> Option<&mut Res<$ok, $fail>> {
                    match reply {
                        NfsReply::$variant(res) => Some(res),
                        _ => None,
                    }
                }
                unmarshal
            },
        };
    };
}

/// NFSPROC3_NULL takes no arguments.
pub const NULL: Procedure<(), (), ()> = Procedure {
    name: "NULL",
    marshal: null_call,
    unmarshal: {
        fn unmarshal(reply: &mut NfsReply) -> Option<&mut NullRes> {
            match reply {
                NfsReply::Null(res) => Some(res),
                _ => None,
            }
        }
        unmarshal
    },
};

fn null_call(_: ()) -> NfsCall {
    NfsCall::Null
}

procedure!(GETATTR, "GETATTR", Getattr, GetattrArgs, GetattrOk, ());
procedure!(SETATTR, "SETATTR", Setattr, SetattrArgs, WccData, WccData);
procedure!(LOOKUP, "LOOKUP", Lookup, DirOpArgs, LookupOk, PostOpAttr);
procedure!(ACCESS, "ACCESS", Access, AccessArgs, AccessOk, PostOpAttr);
procedure!(READLINK, "READLINK", Readlink, ReadlinkArgs, ReadlinkOk, PostOpAttr);
procedure!(READ, "READ", Read, ReadArgs, ReadOk, PostOpAttr);
procedure!(WRITE, "WRITE", Write, WriteArgs, WriteOk, WccData);
procedure!(CREATE, "CREATE", Create, CreateArgs, CreatedOk, WccData);
procedure!(MKDIR, "MKDIR", Mkdir, MkdirArgs, CreatedOk, WccData);
procedure!(SYMLINK, "SYMLINK", Symlink, SymlinkArgs, CreatedOk, WccData);
procedure!(MKNOD, "MKNOD", Mknod, MknodArgs, CreatedOk, WccData);
procedure!(REMOVE, "REMOVE", Remove, DirOpArgs, WccData, WccData);
procedure!(RMDIR, "RMDIR", Rmdir, DirOpArgs, WccData, WccData);
procedure!(RENAME, "RENAME", Rename, RenameArgs, RenameWcc, RenameWcc);
procedure!(READDIR, "READDIR", Readdir, ReaddirArgs, ReaddirOk, PostOpAttr);
procedure!(READDIRPLUS, "READDIRPLUS", Readdirplus, ReaddirplusArgs, ReaddirplusOk, PostOpAttr);
procedure!(FSSTAT, "FSSTAT", Fsstat, FsstatArgs, FsstatOk, PostOpAttr);
procedure!(COMMIT, "COMMIT", Commit, CommitArgs, CommitOk, WccData);

/// Performs one call on `channel` and classifies the outcome.
///
/// `on_ok` runs on the success data and may take owned payloads out of it;
/// `on_fail` projects the failure-case data. Whatever is left of the reply
/// is handed back to the channel through [`NfsChannel::release`] exactly
/// once, on every path that produced a reply.
pub(crate) fn invoke<A, O, F, T, D>(
    channel: &mut dyn NfsChannel,
    procedure: Procedure<A, O, F>,
    args: A,
    on_ok: impl FnOnce(&mut O) -> T,
    on_fail: impl FnOnce(&mut F) -> D,
) -> Result<T, Failure<D>> {
    debug!("NFSPROC3_{} dispatched", procedure.name);

    let mut reply = match channel.call((procedure.marshal)(args)) {
        Ok(reply) => reply,
        Err(status) => {
            debug!("NFSPROC3_{} failed: {}", procedure.name, status);
            return Err(Error::Transport(status).into());
        }
    };

    let outcome = match (procedure.unmarshal)(&mut reply) {
        Some(Res::Ok(ok)) => Ok(on_ok(ok)),
        Some(Res::Fail(status, fail)) => {
            debug!("NFSPROC3_{} returned {}", procedure.name, status);
            Err(Failure::with_detail(Error::Nfs(*status), on_fail(fail)))
        }
        None => {
            debug!("NFSPROC3_{} got a reply for another procedure", procedure.name);
            Err(Error::Transport(RpcStatus::CantDecodeRes).into())
        }
    };

    channel.release(reply);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::error::NfsStat;
    use crate::modules::testing::ScriptedChannel;

    fn lookup_args(name: &str) -> DirOpArgs {
        DirOpArgs {
            dir: FileHandle::new(b"root"),
            name: name.into(),
        }
    }

    #[test]
    fn test_success_hands_payload_to_continuation() {
        let mut channel = ScriptedChannel::new(|_| {
            Ok(NfsReply::Lookup(Res::Ok(LookupOk {
                object: FileHandle::new(b"child"),
                ..Default::default()
            })))
        });

        let handle = invoke(
            &mut channel,
            LOOKUP,
            lookup_args("a"),
            |ok| std::mem::take(&mut ok.object),
            |_| (),
        )
        .unwrap();

        assert_eq!(handle.as_bytes(), b"child");
        let released = channel.released();
        assert_eq!(released.len(), 1);
        match &released[0] {
            NfsReply::Lookup(Res::Ok(ok)) => assert!(ok.object.is_empty()),
            other => panic!("unexpected release {:?}", other),
        }
    }

    #[test]
    fn test_status_failure_keeps_detail() {
        let mut channel = ScriptedChannel::new(|_| {
            Ok(NfsReply::Remove(Res::Fail(
                NfsStat::NotEmpty,
                WccData::default(),
            )))
        });

        let failure = invoke(&mut channel, REMOVE, lookup_args("d"), |_| (), |wcc| *wcc)
            .unwrap_err();

        assert_eq!(failure.error, Error::Nfs(NfsStat::NotEmpty));
        assert_eq!(failure.detail, Some(WccData::default()));
        assert_eq!(channel.released().len(), 1);
    }

    #[test]
    fn test_transport_failure_has_nothing_to_release() {
        let mut channel = ScriptedChannel::new(|_| Err(RpcStatus::TimedOut));

        let failure = invoke(&mut channel, NULL, (), |_| (), |_| ()).unwrap_err();

        assert!(failure.error.is_timeout());
        assert!(failure.detail.is_none());
        assert!(channel.released().is_empty());
    }

    #[test]
    fn test_mismatched_reply_is_a_decode_error() {
        let mut channel = ScriptedChannel::new(|_| Ok(NfsReply::Null(Res::Ok(()))));

        let failure = invoke(&mut channel, LOOKUP, lookup_args("a"), |_| (), |_| ())
            .unwrap_err();

        assert_eq!(failure.error, Error::Transport(RpcStatus::CantDecodeRes));
        assert_eq!(channel.released().len(), 1);
    }

    #[test]
    fn test_marshal_tags_the_call() {
        let mut channel = ScriptedChannel::new(|call| {
            assert_eq!(call.procedure(), 3);
            Ok(NfsReply::Lookup(Res::Fail(NfsStat::NoSuchEntry, None)))
        });

        let failure = invoke(&mut channel, LOOKUP, lookup_args("x"), |_| (), |_| ())
            .unwrap_err();
        assert_eq!(failure.error.name(), "NFS3ERR_NOENT");
        assert_eq!(channel.calls().len(), 1);
    }
}
