//! `create` — atomically create and open a regular file (spec §4.1's
//! create-class ordering, plus the resulting open descriptor).

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::{finish_create, stat_path, CreateRequest, NewEntry, PosixEngine};

pub struct Args {
    pub parent: Gfid,
    pub name: String,
    pub mode: u32,
    pub flags: i32,
    pub xattrs: Vec<(String, Vec<u8>)>,
}

pub struct Success {
    pub entry: NewEntry,
    pub fd: Arc<PosixFd>,
}

pub async fn create(engine: &PosixEngine, args: Args) -> BrickResult<Success> {
    engine.check_writable()?;
    let parent_path = engine.resolve_handle(&args.parent)?;
    let _parent_attr = stat_path(&parent_path)?;

    let path = parent_path.join(&args.name);
    let mode = engine.config.mode_shaping.shape_file_mode(args.mode);
    let raw_fd = open_create_exclusive(&path, mode)?;

    let entry = match finish_create(
        engine,
        CreateRequest {
            parent: args.parent,
            name: &args.name,
            path: path.clone(),
            parent_path,
            is_directory: false,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            xattrs: args.xattrs,
        },
    )
    .await
    {
        Ok(entry) => entry,
        Err(e) => {
            unsafe { libc::close(raw_fd) };
            return Err(e);
        }
    };

    let inode = engine.inode_ctx(entry.gfid).await;
    let fd = PosixFd::new_file(inode, raw_fd, args.flags);
    Ok(Success { entry, fd })
}

fn open_create_exclusive(path: &std::path::Path, mode: u32) -> BrickResult<std::os::unix::io::RawFd> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_CREAT | libc::O_EXCL | libc::O_RDWR, mode) };
    if fd < 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(fd)
}
