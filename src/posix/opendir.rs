//! `opendir` — open a directory handle for later `readdir`/`readdirp`.

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::PosixEngine;

pub struct Args {
    pub gfid: Gfid,
}

pub async fn opendir(engine: &PosixEngine, args: Args) -> BrickResult<Arc<PosixFd>> {
    let path = engine.resolve_handle(&args.gfid)?;
    let raw_fd = raw_open_dir(&path)?;
    let inode = engine.inode_ctx(args.gfid).await;
    Ok(PosixFd::new_dir(inode, raw_fd))
}

fn raw_open_dir(path: &std::path::Path) -> BrickResult<std::os::unix::io::RawFd> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY) };
    if fd < 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(fd)
}
