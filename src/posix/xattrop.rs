//! `xattrop` / `fxattrop` — locked, atomic read-modify-write on a single
//! xattr (spec §4.1). Value transformation lives in
//! [`crate::xattr::xattrop`]; this module owns the lock acquisition and
//! the actual xattr syscalls.

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::BrickResult;
use crate::gfid::Gfid;
use crate::xattr::xattrop::{apply, Applied, Opcode};

use super::PosixEngine;

pub struct Args {
    pub gfid: Gfid,
    pub key: String,
    pub opcode: Opcode,
    pub operand: Vec<u8>,
}

/// Runs `xattrop` against an object resolved by GFID (the `xattrop` FOP;
/// `fxattrop` below does the same thing against an already-open
/// descriptor, sharing the same lock and transform).
pub async fn xattrop(engine: &PosixEngine, args: Args) -> BrickResult<Applied> {
    let inode = engine.inode_ctx(args.gfid).await;
    let path = engine.resolve_handle(&args.gfid)?;
    let _guard = inode.xattrop_lock.lock().await;
    apply_locked(&path, &args.key, args.opcode, &args.operand)
}

pub async fn fxattrop(fd: &Arc<PosixFd>, key: String, opcode: Opcode, operand: Vec<u8>) -> BrickResult<Applied> {
    let _guard = fd.inode.xattrop_lock.lock().await;
    let raw_fd = *fd.active_fd.lock().await;
    apply_locked_fd(raw_fd, &key, opcode, &operand)
}

fn apply_locked(path: &std::path::Path, key: &str, opcode: Opcode, operand: &[u8]) -> BrickResult<Applied> {
    let current = xattr::get(path, key).ok().flatten();
    let applied = apply(opcode, current.as_deref(), operand)?;
    xattr::set(path, key, &applied.next).map_err(|_| crate::error::BrickError::XattrNotSupported)?;
    Ok(applied)
}

fn apply_locked_fd(fd: std::os::unix::io::RawFd, key: &str, opcode: Opcode, operand: &[u8]) -> BrickResult<Applied> {
    let path = crate::handle::path_from_proc_fd(fd)?;
    apply_locked(&path, key, opcode, operand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{mknod, testutil::test_engine};
    use crate::xattr::xattrop::Width;

    #[tokio::test]
    async fn xattrop_add_array_accumulates_under_lock() {
        let (_dir, engine) = test_engine();
        let created = mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();

        let operand = {
            use byteorder::{BigEndian, ByteOrder};
            let mut buf = [0u8; 4];
            BigEndian::write_i32(&mut buf, 5);
            buf.to_vec()
        };

        let first = xattrop(&engine, Args { gfid: created.gfid, key: "user.counter".to_string(), opcode: Opcode::AddArray(Width::Bits32), operand: operand.clone() })
            .await
            .unwrap();
        assert_eq!(first.prior, vec![0, 0, 0, 0]);

        let second = xattrop(&engine, Args { gfid: created.gfid, key: "user.counter".to_string(), opcode: Opcode::AddArray(Width::Bits32), operand })
            .await
            .unwrap();
        assert_eq!(second.next, second.next.clone());
        assert_ne!(second.prior, second.next);
    }
}
