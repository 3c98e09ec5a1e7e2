//! `open` — open an existing object by GFID.

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::PosixEngine;

pub struct Args {
    pub gfid: Gfid,
    pub flags: i32,
}

pub async fn open(engine: &PosixEngine, args: Args) -> BrickResult<Arc<PosixFd>> {
    let path = engine.resolve_handle(&args.gfid)?;
    let flags = if engine.config.o_direct { args.flags | o_direct_flag() } else { args.flags };
    let raw_fd = raw_open(&path, flags)?;
    let inode = engine.inode_ctx(args.gfid).await;
    Ok(PosixFd::new_file(inode, raw_fd, flags))
}

#[cfg(target_os = "linux")]
fn o_direct_flag() -> i32 {
    libc::O_DIRECT
}

#[cfg(not(target_os = "linux"))]
fn o_direct_flag() -> i32 {
    0
}

fn raw_open(path: &std::path::Path, flags: i32) -> BrickResult<std::os::unix::io::RawFd> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let fd = unsafe { libc::open(c_path.as_ptr(), flags) };
    if fd < 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(fd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{mknod, testutil::test_engine};

    #[tokio::test]
    async fn open_returns_usable_descriptor() {
        let (_dir, engine) = test_engine();
        let created = mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();
        let fd = open(&engine, Args { gfid: created.gfid, flags: libc::O_RDWR }).await.unwrap();
        assert!(*fd.active_fd.lock().await >= 0);
    }
}
