//! `setxattr` / `getxattr` / `removexattr` and their fd-based counterparts.
//!
//! Enforces spec §4.3's three-way split: engine-owned keys (`trusted.gfid`,
//! `trusted.glusterfs.volume-id`, `pgfid.*`, `gfid2path.*`) can never be
//! set or removed directly; computed keys are synthesized here and never
//! touch the backing filesystem; everything else passes through to the
//! real xattr namespace, including ACL passthrough.

use std::sync::Arc;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};
use crate::gfid::Gfid;
use crate::xattr::{check_bulk_remove_allowed, keys, pgfid};

use super::PosixEngine;

pub async fn setxattr(engine: &PosixEngine, gfid: Gfid, key: String, value: Vec<u8>) -> BrickResult<()> {
    if keys::is_engine_owned(&key) || keys::is_computed_key(&key) {
        return Err(BrickError::Disallowed);
    }
    let path = engine.resolve_handle(&gfid)?;
    xattr::set(&path, &key, &value).map_err(|_| BrickError::last_os_error())
}

pub async fn getxattr(engine: &PosixEngine, gfid: Gfid, key: String) -> BrickResult<Vec<u8>> {
    if let Some(computed) = compute(engine, &gfid, &key).await? {
        return Ok(computed);
    }
    let path = engine.resolve_handle(&gfid)?;
    xattr::get(&path, &key)
        .map_err(|_| BrickError::last_os_error())?
        .ok_or(BrickError::NoSuchXattr)
}

pub async fn removexattr(engine: &PosixEngine, gfid: Gfid, keys_to_remove: Vec<String>) -> BrickResult<()> {
    check_bulk_remove_allowed(&keys_to_remove)?;
    if keys_to_remove.iter().any(|k| keys::is_engine_owned(k)) {
        return Err(BrickError::Disallowed);
    }
    let path = engine.resolve_handle(&gfid)?;
    for key in &keys_to_remove {
        xattr::remove(&path, key).map_err(|_| BrickError::last_os_error())?;
    }
    Ok(())
}

pub async fn fsetxattr(fd: &Arc<PosixFd>, key: String, value: Vec<u8>) -> BrickResult<()> {
    if keys::is_engine_owned(&key) || keys::is_computed_key(&key) {
        return Err(BrickError::Disallowed);
    }
    let path = fd_path(fd).await?;
    xattr::set(&path, &key, &value).map_err(|_| BrickError::last_os_error())
}

pub async fn fgetxattr(engine: &PosixEngine, fd: &Arc<PosixFd>, key: String) -> BrickResult<Vec<u8>> {
    if let Some(computed) = compute(engine, &fd.inode.gfid, &key).await? {
        return Ok(computed);
    }
    let path = fd_path(fd).await?;
    xattr::get(&path, &key)
        .map_err(|_| BrickError::last_os_error())?
        .ok_or(BrickError::NoSuchXattr)
}

pub async fn fremovexattr(fd: &Arc<PosixFd>, keys_to_remove: Vec<String>) -> BrickResult<()> {
    check_bulk_remove_allowed(&keys_to_remove)?;
    if keys_to_remove.iter().any(|k| keys::is_engine_owned(k)) {
        return Err(BrickError::Disallowed);
    }
    let path = fd_path(fd).await?;
    for key in &keys_to_remove {
        xattr::remove(&path, key).map_err(|_| BrickError::last_os_error())?;
    }
    Ok(())
}

async fn fd_path(fd: &Arc<PosixFd>) -> BrickResult<std::path::PathBuf> {
    let raw_fd = *fd.active_fd.lock().await;
    std::fs::read_link(format!("/proc/self/fd/{raw_fd}")).map_err(|_| BrickError::FdStale)
}

/// Synthesizes a computed key's value, or `Ok(None)` if `key` isn't one
/// of the recognized computed families.
async fn compute(engine: &PosixEngine, gfid: &Gfid, key: &str) -> BrickResult<Option<Vec<u8>>> {
    if key == keys::NODE_UUID {
        return Ok(Some(engine.config.node_uuid.clone().into_bytes()));
    }
    if key == keys::GET_REAL_FILENAME_PREFIX {
        let path = engine.resolve_handle(gfid)?;
        return Ok(Some(path.to_string_lossy().into_owned().into_bytes()));
    }
    if key == keys::OPEN_FD_COUNT {
        let ctx = engine.inode_ctx(*gfid).await;
        return Ok(Some(ctx.open_fds().to_string().into_bytes()));
    }
    if key == keys::PARENT_PATH_LIST {
        let path = engine.resolve_handle(gfid)?;
        let names = xattr::list(&path).map_err(|_| BrickError::last_os_error())?;
        let mut paths = Vec::new();
        for name in names {
            let name = name.to_string_lossy();
            if let Some(parent) = pgfid::parent_from_key(&name) {
                if let Ok(parent_path) = engine.resolve_handle(&parent) {
                    paths.push(parent_path.to_string_lossy().into_owned());
                }
            }
        }
        return Ok(Some(paths.join(":").into_bytes()));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::{mknod, testutil::test_engine};

    #[tokio::test]
    async fn setxattr_and_getxattr_round_trip_plain_key() {
        let (_dir, engine) = test_engine();
        let created = mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();
        setxattr(&engine, created.gfid, "user.note".to_string(), b"hi".to_vec()).await.unwrap();
        let value = getxattr(&engine, created.gfid, "user.note".to_string()).await.unwrap();
        assert_eq!(value, b"hi");
    }

    #[tokio::test]
    async fn setxattr_refuses_engine_owned_key() {
        let (_dir, engine) = test_engine();
        let created = mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();
        let result = setxattr(&engine, created.gfid, keys::GFID.to_string(), vec![0; 16]).await;
        assert_eq!(result, Err(BrickError::Disallowed));
    }

    #[tokio::test]
    async fn getxattr_computes_node_uuid_without_storing() {
        let (_dir, mut engine) = test_engine();
        engine.config.node_uuid = "brick-1".to_string();
        let value = getxattr(&engine, Gfid::ROOT, keys::NODE_UUID.to_string()).await.unwrap();
        assert_eq!(value, b"brick-1");
    }

    #[tokio::test]
    async fn removexattr_rejects_disallowed_key_in_batch() {
        let (_dir, engine) = test_engine();
        let created = mknod::mknod(&engine, mknod::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: libc::S_IFREG | 0o644, rdev: 0, xattrs: Vec::new() })
            .await
            .unwrap();
        let result = removexattr(&engine, created.gfid, vec![keys::GFID.to_string()]).await;
        assert_eq!(result, Err(BrickError::Disallowed));
    }
}
