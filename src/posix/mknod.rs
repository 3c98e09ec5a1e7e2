//! `mknod` — create-class operation for regular files, device nodes, and
//! FIFOs created without a following `open` (spec §4.1).

use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::{finish_create, stat_path, CreateRequest, NewEntry, PosixEngine};

pub struct Args {
    pub parent: Gfid,
    pub name: String,
    pub mode: u32,
    pub rdev: u64,
    pub xattrs: Vec<(String, Vec<u8>)>,
}

pub async fn mknod(engine: &PosixEngine, args: Args) -> BrickResult<NewEntry> {
    engine.check_writable()?;
    let parent_path = engine.resolve_handle(&args.parent)?;
    let _parent_attr = stat_path(&parent_path)?;

    let path = parent_path.join(&args.name);
    let mode = engine.config.mode_shaping.shape_file_mode(args.mode);
    create_node(&path, mode, args.rdev)?;

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

fn create_node(path: &std::path::Path, mode: u32, rdev: u64) -> BrickResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let ret = unsafe { libc::mknod(c_path.as_ptr(), mode, rdev as libc::dev_t) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::testutil::test_engine;

    #[tokio::test]
    async fn mknod_creates_regular_file_with_handle() {
        let (_dir, engine) = test_engine();
        let created = mknod(
            &engine,
            Args { parent: Gfid::ROOT, name: "f".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() },
        )
        .await
        .unwrap();
        assert_eq!(created.attr.nlink, 2);
    }
}
