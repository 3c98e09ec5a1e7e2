//! `releasedir` — close a directory descriptor and drop its inode
//! reference, deferring the actual `close(2)` to the janitor (spec §4.5).

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::BrickResult;

use super::PosixEngine;

pub async fn releasedir(engine: &PosixEngine, fd: Arc<PosixFd>) -> BrickResult<()> {
    let raw_fd = *fd.active_fd.lock().await;
    engine.inodes.enqueue_close(raw_fd);
    fd.inode.dec_open_fds();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfid::Gfid;
    use crate::posix::{opendir, testutil::test_engine};

    #[tokio::test]
    async fn releasedir_queues_fd_for_janitor_close() {
        let (_dir, engine) = test_engine();
        let fd = opendir::opendir(&engine, opendir::Args { gfid: Gfid::ROOT }).await.unwrap();
        releasedir(&engine, fd).await.unwrap();
        assert_eq!(engine.inodes.drain_close_queue().len(), 1);
    }
}
