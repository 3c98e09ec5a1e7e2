//! `readv` — positioned read into a caller-owned buffer.

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};

use super::PosixEngine;

pub struct Args {
    pub offset: u64,
    pub len: usize,
}

pub async fn readv(engine: &PosixEngine, fd: &Arc<PosixFd>, args: Args) -> BrickResult<Vec<u8>> {
    if fd.is_stale() {
        return Err(BrickError::FdStale);
    }
    let raw_fd = *fd.active_fd.lock().await;
    let mut buf = vec![0u8; args.len];
    let read = if engine.config.linux_aio {
        let iov = libc::iovec { iov_base: buf.as_mut_ptr() as *mut libc::c_void, iov_len: buf.len() };
        unsafe { libc::preadv(raw_fd, &iov, 1, args.offset as libc::off_t) }
    } else {
        unsafe { libc::pread(raw_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), args.offset as libc::off_t) }
    };
    if read < 0 {
        return Err(BrickError::last_os_error());
    }
    buf.truncate(read as usize);
    Ok(buf)
}
