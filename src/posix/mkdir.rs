//! `mkdir` — create-class operation with the "preop parent" precondition
//! (spec §4.1 step 2, the only race-free way for a higher layer to
//! condition directory creation on the parent's replication state).

use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::{finish_create, stat_path, CreateRequest, NewEntry, PosixEngine};

pub struct Args {
    pub parent: Gfid,
    pub name: String,
    pub mode: u32,
    /// `(key, expected_value)` from `GF_PREOP_PARENT_KEY`/
    /// `preop-parent-xattr` xdata, when the caller supplied one.
    pub preop_parent_xattr: Option<(String, Vec<u8>)>,
}

pub async fn mkdir(engine: &PosixEngine, args: Args) -> BrickResult<NewEntry> {
    engine.check_writable()?;
    let parent_path = engine.resolve_handle(&args.parent)?;
    let _parent_attr = stat_path(&parent_path)?;

    if let Some((key, expected)) = &args.preop_parent_xattr {
        let current = xattr::get(&parent_path, key).map_err(|_| BrickError::last_os_error())?;
        if current.as_deref() != Some(expected.as_slice()) {
            return Err(BrickError::PreopCheckFailed);
        }
    }

    let path = parent_path.join(&args.name);
    let mode = engine.config.mode_shaping.shape_directory_mode(args.mode);
    create_dir(&path, mode)?;

    finish_create(
        engine,
        CreateRequest {
            parent: args.parent,
            name: &args.name,
            path,
            parent_path,
            is_directory: true,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            xattrs: Vec::new(),
        },
    )
    .await
}

fn create_dir(path: &std::path::Path, mode: u32) -> BrickResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let ret = unsafe { libc::mkdir(c_path.as_ptr(), mode) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}
