//! The engine's error taxonomy (see spec §7).
//!
//! Mirrors the style of the teacher's `vfs::Error`: a plain enum, one doc
//! comment per variant, no derive macro beyond what's needed for equality
//! and matching.

use std::fmt;

/// Errors the storage engine can return from any operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrickError {
    /// A GFID resolved to nothing, or the resolved object's GFID differs
    /// from the one the caller expected.
    StaleHandle,
    /// The `preop-parent` precondition in a create-class operation failed;
    /// nothing was created. The caller should retry after reconciling
    /// state.
    PreopCheckFailed,
    /// The disk-reserve threshold was crossed, or the backend returned
    /// `ENOSPC` directly.
    NoSpace,
    /// The requested extended attribute is not present.
    NoSuchXattr,
    /// The backend filesystem does not support extended attributes.
    XattrNotSupported,
    /// A disallow-listed xattr was targeted by `removexattr`, or an
    /// engine-owned xattr was targeted by `setxattr`.
    Disallowed,
    /// `unlink`/`write` was refused because open fds exist, or an internal
    /// writer is currently protected against external writes.
    Busy,
    /// The configured hard-link cap (`max-hardlinks`) was reached.
    MaxHardlinks,
    /// The descriptor failed to migrate across a graph switch; the caller
    /// should reopen. Never surfaced to a POSIX caller directly — this is
    /// translator-visible only, per spec §7.
    FdStale,
    /// The engine is in a degraded state after a failed health-check probe
    /// and refuses mutating operations until the next successful probe.
    BackendIll,
    /// Catch-all for a POSIX errno the engine passed through unchanged
    /// from the underlying filesystem.
    Errno(i32),
    /// The argument supplied to the operation was invalid (e.g. a name
    /// exceeding `NAME_MAX`, or `.`/`..` where a real name was required).
    InvalidArgument,
    /// The target of a directory operation exists and is the wrong type
    /// (file where a directory was expected, or vice versa).
    WrongType,
    /// The directory is not empty (`rmdir` of a populated directory).
    NotEmpty,
}

impl BrickError {
    /// The POSIX errno this error is signaled by, per spec §7's table.
    pub fn errno(&self) -> i32 {
        match self {
            BrickError::StaleHandle => libc::ESTALE,
            BrickError::PreopCheckFailed => libc::EIO,
            BrickError::NoSpace => libc::ENOSPC,
            BrickError::NoSuchXattr => libc::ENODATA,
            BrickError::XattrNotSupported => libc::ENOTSUP,
            BrickError::Disallowed => libc::EPERM,
            BrickError::Busy => libc::EBUSY,
            BrickError::MaxHardlinks => libc::EMLINK,
            BrickError::FdStale => libc::EBADF,
            BrickError::BackendIll => libc::EIO,
            BrickError::Errno(e) => *e,
            BrickError::InvalidArgument => libc::EINVAL,
            BrickError::WrongType => libc::EISDIR,
            BrickError::NotEmpty => libc::ENOTEMPTY,
        }
    }

    /// Maps a raw `errno` returned by a syscall into a [`BrickError`].
    pub fn from_errno(errno: i32) -> BrickError {
        match errno {
            libc::ESTALE => BrickError::StaleHandle,
            libc::ENOSPC => BrickError::NoSpace,
            libc::ENODATA => BrickError::NoSuchXattr,
            libc::ENOTSUP => BrickError::XattrNotSupported,
            libc::EPERM => BrickError::Disallowed,
            libc::EBUSY => BrickError::Busy,
            libc::EMLINK => BrickError::MaxHardlinks,
            libc::EINVAL => BrickError::InvalidArgument,
            libc::EISDIR | libc::ENOTDIR => BrickError::WrongType,
            libc::ENOTEMPTY => BrickError::NotEmpty,
            other => BrickError::Errno(other),
        }
    }

    /// Returns the last OS error as a [`BrickError`] (for use right after a
    /// failing libc call).
    pub fn last_os_error() -> BrickError {
        BrickError::from_errno(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO))
    }
}

impl fmt::Display for BrickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrickError::StaleHandle => write!(f, "stale handle"),
            BrickError::PreopCheckFailed => write!(f, "preop check failed"),
            BrickError::NoSpace => write!(f, "no space left on device"),
            BrickError::NoSuchXattr => write!(f, "no such extended attribute"),
            BrickError::XattrNotSupported => write!(f, "extended attributes not supported"),
            BrickError::Disallowed => write!(f, "operation disallowed on reserved attribute"),
            BrickError::Busy => write!(f, "resource busy"),
            BrickError::MaxHardlinks => write!(f, "too many hard links"),
            BrickError::FdStale => write!(f, "descriptor stale after graph switch"),
            BrickError::BackendIll => write!(f, "backend degraded, refusing mutating operations"),
            BrickError::Errno(e) => write!(f, "errno {e}"),
            BrickError::InvalidArgument => write!(f, "invalid argument"),
            BrickError::WrongType => write!(f, "wrong object type"),
            BrickError::NotEmpty => write!(f, "directory not empty"),
        }
    }
}

impl std::error::Error for BrickError {}

/// Result alias used throughout the storage engine.
pub type BrickResult<T> = std::result::Result<T, BrickError>;
