//! `access` — check a requested permission mask against an object.

use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;

use super::PosixEngine;

pub struct Args {
    pub gfid: Gfid,
    /// `R_OK | W_OK | X_OK`-style mask, POSIX `access(2)` semantics.
    pub mask: i32,
}

pub async fn access(engine: &PosixEngine, args: Args) -> BrickResult<()> {
    let path = engine.resolve_handle(&args.gfid)?;
    check_access(&path, args.mask)
}

fn check_access(path: &std::path::Path, mask: i32) -> BrickResult<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let ret = unsafe { libc::access(c_path.as_ptr(), mask) };
    if ret != 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{mkdir, testutil::test_engine};

    #[tokio::test]
    async fn access_succeeds_for_readable_directory() {
        let (_dir, engine) = test_engine();
        let created = mkdir::mkdir(&engine, mkdir::Args { parent: Gfid::ROOT, name: "d".to_string(), mode: 0o755, preop_parent_xattr: None })
            .await
            .unwrap();
        access(&engine, Args { gfid: created.gfid, mask: libc::R_OK }).await.unwrap();
    }
}
