//! `seek` — `SEEK_DATA`/`SEEK_HOLE` probing of a sparse file (Linux only).

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhat {
    Data,
    Hole,
}

pub struct Args {
    pub offset: u64,
    pub what: SeekWhat,
}

#[cfg(target_os = "linux")]
pub async fn seek(fd: &Arc<PosixFd>, args: Args) -> BrickResult<u64> {
    if fd.is_stale() {
        return Err(BrickError::FdStale);
    }
    let raw_fd = *fd.active_fd.lock().await;
    let whence = match args.what {
        SeekWhat::Data => libc::SEEK_DATA,
        SeekWhat::Hole => libc::SEEK_HOLE,
    };
    let result = unsafe { libc::lseek(raw_fd, args.offset as libc::off_t, whence) };
    if result < 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(result as u64)
}

#[cfg(not(target_os = "linux"))]
pub async fn seek(_fd: &Arc<PosixFd>, _args: Args) -> BrickResult<u64> {
    Err(BrickError::from_errno(libc::ENOTSUP))
}

#[cfg(test)]
#[cfg(target_os = "linux")]
mod tests {
    use super::*;
    use crate::gfid::Gfid;
    use crate::posix::{create, testutil::test_engine, writev};

    #[tokio::test]
    async fn seek_data_finds_written_region() {
        let (_dir, engine) = test_engine();
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();
        writev::writev(&engine, &created.fd, writev::Args { offset: 0, data: b"hi".to_vec(), is_append_intent: false, update_atomic: false, internal_write: false })
            .await
            .unwrap();

        let found = seek(&created.fd, Args { offset: 0, what: SeekWhat::Data }).await.unwrap();
        assert_eq!(found, 0);
    }
}
