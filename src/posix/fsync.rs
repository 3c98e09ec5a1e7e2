//! `fsync` / `fdatasync` — force a descriptor's data to stable storage.
//!
//! When `batch_fsync_mode` is anything but `None`, the actual syscall is
//! deferred to the background fsyncer (spec §4.6): the fd is handed to
//! `engine.fsync_queue` and this call returns once it's enqueued, not once
//! the data is durable. Callers that need a synchronous guarantee disable
//! batching.

use std::sync::Arc;

use crate::config::BatchFsyncMode;
use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};

use super::PosixEngine;

pub struct Args {
    pub datasync: bool,
}

pub async fn fsync(engine: &PosixEngine, fd: &Arc<PosixFd>, args: Args) -> BrickResult<()> {
    if fd.is_stale() {
        return Err(BrickError::FdStale);
    }
    let raw_fd = *fd.active_fd.lock().await;

    if engine.config.batch_fsync_mode != BatchFsyncMode::None {
        engine.fsync_queue.enqueue(raw_fd);
        return Ok(());
    }

    let ret = if args.datasync {
        unsafe { libc::fdatasync(raw_fd) }
    } else {
        unsafe { libc::fsync(raw_fd) }
    };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}
