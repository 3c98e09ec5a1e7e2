//! `fallocate` / `discard` / `zerofill` — share one module since the
//! original keeps all three in one file (punch-hole and zero-range are
//! just `fallocate(2)` with different mode flags).

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};

use super::PosixEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallocateMode {
    /// Plain preallocation; keep the file size if it grows the file.
    Allocate,
    /// Punch a hole over `[offset, offset+len)` (`discard`).
    Discard,
    /// Zero `[offset, offset+len)`, converting to a hole when the
    /// filesystem supports it (`zerofill`).
    Zerofill,
}

pub struct Args {
    pub mode: FallocateMode,
    pub offset: u64,
    pub len: u64,
}

pub async fn fallocate(engine: &PosixEngine, fd: &Arc<PosixFd>, args: Args) -> BrickResult<()> {
    engine.check_writable()?;
    engine.reserve.check_now();
    if fd.is_stale() {
        return Err(BrickError::FdStale);
    }
    let raw_fd = *fd.active_fd.lock().await;
    raw_fallocate(raw_fd, args.mode, args.offset, args.len)
}

#[cfg(target_os = "linux")]
fn raw_fallocate(fd: std::os::unix::io::RawFd, mode: FallocateMode, offset: u64, len: u64) -> BrickResult<()> {
    let flags = match mode {
        FallocateMode::Allocate => 0,
        FallocateMode::Discard => libc::FALLOC_FL_PUNCH_HOLE | libc::FALLOC_FL_KEEP_SIZE,
        FallocateMode::Zerofill => libc::FALLOC_FL_ZERO_RANGE,
    };
    let ret = unsafe { libc::fallocate(fd, flags, offset as libc::off_t, len as libc::off_t) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn raw_fallocate(_fd: std::os::unix::io::RawFd, _mode: FallocateMode, _offset: u64, _len: u64) -> BrickResult<()> {
    Err(BrickError::from_errno(libc::ENOTSUP))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfid::Gfid;
    use crate::posix::{create, testutil::test_engine};

    #[tokio::test]
    #[cfg(target_os = "linux")]
    async fn fallocate_preallocates_space() {
        let (_dir, engine) = test_engine();
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();
        let result = fallocate(&engine, &created.fd, Args { mode: FallocateMode::Allocate, offset: 0, len: 4096 }).await;
        assert!(result.is_ok());
    }
}
