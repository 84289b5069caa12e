//! Error taxonomy.
//!
//! Errors fall into three wire domains (RPC transport, MOUNT protocol and
//! NFS protocol status codes) plus the engine's own session errors. Each
//! status carries its RFC symbolic name and a short description.

use std::fmt;
use thiserror::Error;

/// Which layer produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// The RPC layer failed before a protocol reply was decoded.
    Transport,
    /// The MOUNT service answered with a non-OK status.
    Mount,
    /// The NFS service answered with a non-OK status.
    Filesystem,
    /// The engine refused or could not start the operation.
    Session,
}

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $unknown:literal {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $code:literal, $sym:literal, $desc:literal;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                #[doc = $desc]
                $(#[$vmeta])*
                $variant,
            )*
        }

        impl $name {
            /// Numeric value on the wire.
            pub fn code(self) -> u32 {
                match self {
                    $($name::$variant => $code,)*
                }
            }

            /// Symbolic name as used in RFC 1813.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $sym,)*
                }
            }

            /// Human readable cause.
            pub fn description(self) -> &'static str {
                match self {
                    $($name::$variant => $desc,)*
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = u32;

            fn try_from(code: u32) -> Result<Self, u32> {
                match code {
                    $($code => Ok($name::$variant),)*
                    other => Err(other),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}: {}", self.name(), self.description())
            }
        }

        impl $name {
            /// Display text for a code outside the known set.
            pub fn unknown_name() -> &'static str {
                $unknown
            }
        }
    };
}

status_enum! {
    /// Outcome of an RPC exchange that did not produce a decodable reply.
    RpcStatus, "RPC unknown error" {
        CantEncodeArgs = 1, "RPC_CANTENCODEARGS", "can't encode arguments";
        CantDecodeRes = 2, "RPC_CANTDECODERES", "can't decode result";
        CantSend = 3, "RPC_CANTSEND", "unable to send";
        CantRecv = 4, "RPC_CANTRECV", "unable to receive";
        TimedOut = 5, "RPC_TIMEDOUT", "timed out";
        VersionMismatch = 6, "RPC_VERSMISMATCH", "incompatible versions of RPC";
        AuthError = 7, "RPC_AUTHERROR", "authentication error";
        ProgramUnavailable = 8, "RPC_PROGUNAVAIL", "program unavailable";
        ProgramVersionMismatch = 9, "RPC_PROGVERSMISMATCH", "program/version mismatch";
        ProcedureUnavailable = 10, "RPC_PROCUNAVAIL", "procedure unavailable";
        CantDecodeArgs = 11, "RPC_CANTDECODEARGS", "server can't decode arguments";
        SystemError = 12, "RPC_SYSTEMERROR", "remote system error";
        UnknownHost = 13, "RPC_UNKNOWNHOST", "unknown host";
        PortmapFailure = 14, "RPC_PMAPFAILURE", "port mapper failure";
        ProgramNotRegistered = 15, "RPC_PROGNOTREGISTERED", "program not registered";
        Failed = 16, "RPC_FAILED", "failed (unspecified error)";
        UnknownProtocol = 17, "RPC_UNKNOWNPROTO", "unknown protocol";
        ///
        /// Raised by a [`Connector`](super::proto::Connector) that cannot reach
        /// the service. It has no `clnt_stat` value and no server sends it.
        CantConnect = 100, "RPC_CANTCONNECT", "can't connect to remote service";
    }
}

status_enum! {
    /// MOUNTv3 `mountstat3` failure codes.
    MountStat, "MNT3 unknown error" {
        PermissionDenied = 1, "MNT3ERR_PERM", "not owner";
        NoSuchEntry = 2, "MNT3ERR_NOENT", "no such file or directory";
        IoError = 5, "MNT3ERR_IO", "I/O error";
        AccessDenied = 13, "MNT3ERR_ACCES", "permission denied";
        NotADirectory = 20, "MNT3ERR_NOTDIR", "not a directory";
        InvalidArgument = 22, "MNT3ERR_INVAL", "invalid argument";
        NameTooLong = 63, "MNT3ERR_NAMETOOLONG", "filename too long";
        NotSupported = 10004, "MNT3ERR_NOTSUPP", "operation not supported";
        ServerFault = 10006, "MNT3ERR_SERVERFAULT", "a failure on the server";
    }
}

status_enum! {
    /// NFSv3 `nfsstat3` failure codes.
    NfsStat, "NFS3 unknown error" {
        PermissionDenied = 1, "NFS3ERR_PERM", "not owner";
        NoSuchEntry = 2, "NFS3ERR_NOENT", "no such file or directory";
        IoError = 5, "NFS3ERR_IO", "I/O error";
        NoSuchDevice = 6, "NFS3ERR_NXIO", "no such device or address";
        AccessDenied = 13, "NFS3ERR_ACCES", "permission denied";
        Exists = 17, "NFS3ERR_EXIST", "file exists";
        CrossDevice = 18, "NFS3ERR_XDEV", "attempt to do a cross-device hard link";
        NoDevice = 19, "NFS3ERR_NODEV", "no such device";
        NotADirectory = 20, "NFS3ERR_NOTDIR", "not a directory";
        IsADirectory = 21, "NFS3ERR_ISDIR", "is a directory";
        InvalidArgument = 22, "NFS3ERR_INVAL", "invalid argument";
        FileTooLarge = 27, "NFS3ERR_FBIG", "file too large";
        NoSpace = 28, "NFS3ERR_NOSPC", "no space left on device";
        ReadOnlyFilesystem = 30, "NFS3ERR_ROFS", "read-only file system";
        TooManyLinks = 31, "NFS3ERR_MLINK", "too many hard links";
        NameTooLong = 63, "NFS3ERR_NAMETOOLONG", "filename too long";
        NotEmpty = 66, "NFS3ERR_NOTEMPTY", "directory not empty";
        QuotaExceeded = 69, "NFS3ERR_DQUOT", "resource quota exceeded";
        Stale = 70, "NFS3ERR_STALE", "stale file handle";
        Remote = 71, "NFS3ERR_REMOTE", "too many levels of remote in path";
        BadHandle = 10001, "NFS3ERR_BADHANDLE", "illegal NFS file handle";
        NotSynchronized = 10002, "NFS3ERR_NOT_SYNC", "update synchronization mismatch";
        BadCookie = 10003, "NFS3ERR_BAD_COOKIE", "stale READDIR cookie";
        NotSupported = 10004, "NFS3ERR_NOTSUPP", "operation not supported";
        TooSmall = 10005, "NFS3ERR_TOOSMALL", "buffer or request is too small";
        ServerFault = 10006, "NFS3ERR_SERVERFAULT", "a failure on the server";
        BadType = 10007, "NFS3ERR_BADTYPE", "type not supported by the server";
        JukeboxDelay = 10008, "NFS3ERR_JUKEBOX", "request initiated, retry later";
    }
}

/// Errors surfaced by the session engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The RPC exchange itself failed.
    #[error("{0}")]
    Transport(RpcStatus),

    /// The MOUNT service rejected the request.
    #[error("{0}")]
    Mount(MountStat),

    /// The NFS service rejected the request.
    #[error("{0}")]
    Nfs(NfsStat),

    /// The session has no mounted export.
    #[error("NFSC_NOT_MOUNTED: session is not mounted")]
    NotMounted,

    /// The session already holds a mounted export.
    #[error("NFSC_ALREADY_MOUNTED: session is already mounted")]
    AlreadyMounted,

    /// The server host name could not be resolved.
    #[error("NFSC_EGETHOSTBYNAME: {host}: {reason}")]
    Resolution {
        /// Host name as configured.
        host: String,
        /// Resolver message.
        reason: String,
    },

    /// The local machine name for an AUTH_SYS credential is unavailable.
    #[error("NFSC_EGETHOSTNAME: {0}")]
    Hostname(String),

    /// An offset, count or buffer size is out of range.
    #[error("NFSC_ERANGE: {0}")]
    InvalidRange(&'static str),

    /// The session configuration is unusable.
    #[error("NFSC_EINVAL: {0}")]
    InvalidConfig(String),

    /// No diagnostic could be produced.
    #[error("NFSC_UNKNOWN_ERROR")]
    Unknown,
}

impl Error {
    /// The layer this error belongs to.
    pub fn domain(&self) -> Domain {
        match self {
            Error::Transport(_) => Domain::Transport,
            Error::Mount(_) => Domain::Mount,
            Error::Nfs(_) => Domain::Filesystem,
            _ => Domain::Session,
        }
    }

    /// Stable symbolic name of the error.
    pub fn name(&self) -> &'static str {
        match self {
            Error::Transport(status) => status.name(),
            Error::Mount(status) => status.name(),
            Error::Nfs(status) => status.name(),
            Error::NotMounted => "NFSC_NOT_MOUNTED",
            Error::AlreadyMounted => "NFSC_ALREADY_MOUNTED",
            Error::Resolution { .. } => "NFSC_EGETHOSTBYNAME",
            Error::Hostname(_) => "NFSC_EGETHOSTNAME",
            Error::InvalidRange(_) => "NFSC_ERANGE",
            Error::InvalidConfig(_) => "NFSC_EINVAL",
            Error::Unknown => "NFSC_UNKNOWN_ERROR",
        }
    }

    /// True for the RPC timeout outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(RpcStatus::TimedOut))
    }
}

impl From<RpcStatus> for Error {
    fn from(status: RpcStatus) -> Self {
        Error::Transport(status)
    }
}

impl From<MountStat> for Error {
    fn from(status: MountStat) -> Self {
        Error::Mount(status)
    }
}

impl From<NfsStat> for Error {
    fn from(status: NfsStat) -> Self {
        Error::Nfs(status)
    }
}

/// A failed procedure call.
///
/// NFSv3 failure replies still carry attribute data (post-op attributes or
/// weak cache consistency data); it is kept in `detail` so callers can
/// invalidate caches. `detail` is only ever set for filesystem-domain
/// errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure<D> {
    /// What went wrong.
    pub error: Error,
    /// Failure-case data from the reply, if the server sent one.
    pub detail: Option<D>,
}

impl<D> Failure<D> {
    /// A failure with attached reply data.
    pub fn with_detail(error: Error, detail: D) -> Self {
        Self {
            error,
            detail: Some(detail),
        }
    }

    /// Drops the failure data and keeps the error.
    pub fn into_error(self) -> Error {
        self.error
    }
}

impl<D> From<Error> for Failure<D> {
    fn from(error: Error) -> Self {
        Self {
            error,
            detail: None,
        }
    }
}

impl<D> fmt::Display for Failure<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<D: fmt::Debug> std::error::Error for Failure<D> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
