//! `truncate` / `ftruncate` — resize an object's data.

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::{stat_path, PosixEngine, Stat};

pub struct Args {
    pub gfid: Gfid,
    pub size: u64,
}

pub async fn truncate(engine: &PosixEngine, args: Args) -> BrickResult<Stat> {
    engine.check_writable()?;
    let path = engine.resolve_handle(&args.gfid)?;
    raw_truncate(&path, args.size)?;
    stat_path(&path)
}

pub async fn ftruncate(fd: &Arc<PosixFd>, size: u64) -> BrickResult<()> {
    if fd.is_stale() {
        return Err(BrickError::FdStale);
    }
    let raw_fd = *fd.active_fd.lock().await;
    let ret = unsafe { libc::ftruncate(raw_fd, size as libc::off_t) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}

fn raw_truncate(path: &std::path::Path, size: u64) -> BrickResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let ret = unsafe { libc::truncate(c_path.as_ptr(), size as libc::off_t) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{mknod, testutil::test_engine};

    #[tokio::test]
    async fn truncate_resizes_file() {
        let (dir, engine) = test_engine();
        let created = mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();
        std::fs::write(dir.path().join("f"), b"hello").unwrap();

        let attr = truncate(&engine, Args { gfid: created.gfid, size: 2 }).await.unwrap();
        assert_eq!(attr.size, 2);
    }
}
