//! `symlink` — create-class operation creating a symbolic link object.
//!
//! A symlink object is a non-directory for handle purposes: it gets a
//! hard-link handle like a regular file, never a directory-style
//! target-pointing handle (spec §4.2 reserves the symlink-as-handle
//! shape for directories alone).

use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::{finish_create, stat_path, CreateRequest, NewEntry, PosixEngine};

pub struct Args {
    pub parent: Gfid,
    pub name: String,
    pub link_target: String,
    pub xattrs: Vec<(String, Vec<u8>)>,
}

pub async fn symlink(engine: &PosixEngine, args: Args) -> BrickResult<NewEntry> {
    engine.check_writable()?;
    let parent_path = engine.resolve_handle(&args.parent)?;
    let _parent_attr = stat_path(&parent_path)?;

    let path = parent_path.join(&args.name);
    create_symlink(&args.link_target, &path)?;

    finish_create(
        engine,
        CreateRequest {
            parent: args.parent,
            name: &args.name,
            path,
            parent_path,
            is_directory: false,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            xattrs: args.xattrs,
        },
    )
    .await
}

fn create_symlink(target: &str, link: &std::path::Path) -> BrickResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let target_c = CString::new(target).map_err(|_| BrickError::InvalidArgument)?;
    let link_c = CString::new(link.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let ret = unsafe { libc::symlink(target_c.as_ptr(), link_c.as_ptr()) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}
