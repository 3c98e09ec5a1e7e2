//! `put` — single-shot create-and-write, used by geo-replication and
//! self-heal to materialize a whole file in one call instead of
//! create/write/flush/close round trips (supplement, grounded on the
//! original's `posix_put` in `posix-entry-ops.c`).

use crate::error::BrickResult;
use crate::gfid::Gfid;

use super::{create, flush, release, stat_path, writev, NewEntry};

pub struct Args {
    pub parent: Gfid,
    pub name: String,
    pub mode: u32,
    pub data: Vec<u8>,
    pub xattrs: Vec<(String, Vec<u8>)>,
}

pub struct Success {
    pub entry: NewEntry,
}

pub async fn put(engine: &super::PosixEngine, args: Args) -> BrickResult<Success> {
    let created = create::create(
        engine,
        create::Args {
            parent: args.parent,
            name: args.name,
            mode: args.mode,
            flags: libc::O_RDWR,
            xattrs: args.xattrs,
        },
    )
    .await?;

    writev::writev(
        engine,
        &created.fd,
        // `put` is itself the kind of internal, single-shot writer
        // (self-heal, geo-replication) the protection fence exists to
        // let through, so it never refuses itself.
        writev::Args { offset: 0, data: args.data, is_append_intent: false, update_atomic: false, internal_write: true },
    )
    .await?;

    flush::flush(&created.fd).await?;

    // Re-stat through the handle, not `created.entry.attr`: that was
    // taken by `finish_create` on the just-`mknod`'d empty file, before
    // the write above landed any bytes (grounded on `posix_put`
    // returning the post-op iatt, not the pre-op one).
    let attr = stat_path(&engine.root.handle_abs_path(&created.entry.gfid))?;
    release::release(engine, created.fd.clone()).await?;

    Ok(Success { entry: NewEntry { attr, ..created.entry } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posix::testutil::test_engine;

    #[tokio::test]
    async fn put_materializes_file_in_one_call() {
        let (_dir, engine) = test_engine();
        let result = put(
            &engine,
            Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, data: b"hello".to_vec(), xattrs: Vec::new() },
        )
        .await
        .unwrap();
        assert_eq!(result.entry.attr.size, 5);
    }
}
