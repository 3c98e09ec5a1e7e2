//! `flush` — release a caller's reference to a descriptor without closing
//! the underlying fd. No data is forced to disk; that's `fsync`'s job.

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::BrickResult;

pub async fn flush(fd: &Arc<PosixFd>) -> BrickResult<()> {
    let _ = fd.active_fd.lock().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfid::Gfid;
    use crate::posix::{mknod, open, testutil::test_engine};

    #[tokio::test]
    async fn flush_on_open_descriptor_succeeds() {
        let (_dir, engine) = test_engine();
        let created = mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();
        let fd = open::open(&engine, open::Args { gfid: created.gfid, flags: libc::O_RDWR }).await.unwrap();
        flush(&fd).await.unwrap();
    }
}
