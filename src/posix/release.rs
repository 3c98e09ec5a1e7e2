//! `release` — close a regular-file descriptor and drop its inode
//! reference, deferring the actual `close(2)` to the janitor (spec §4.5)
//! and finalizing unlink staging when this was the object's last open
//! descriptor (spec §8 scenario 3).
//!
//! Grounded on `original_source/xlators/storage/posix/src/posix-inode-fd-ops.c`
//! (`posix_release`), mirrored against the directory-only
//! [`super::releasedir::releasedir`] already in this crate.

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::BrickResult;

use super::PosixEngine;

pub async fn release(engine: &PosixEngine, fd: Arc<PosixFd>) -> BrickResult<()> {
    let raw_fd = *fd.active_fd.lock().await;
    engine.inodes.enqueue_close(raw_fd);

    let remaining = fd.inode.dec_open_fds();
    if remaining == 0 && fd.inode.is_unlinked() {
        crate::handle::finalize_unlink_staging(&engine.root, &fd.inode.gfid)?;
    }
    Ok(())
}
