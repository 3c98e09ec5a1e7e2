//! Component G — per-inode and per-fd context held by the storage engine.
//!
//! Grounded on the teacher's unused `moka`/`crossbeam-queue` dependencies:
//! `moka::sync::Cache` gives the concurrent map this component needs for
//! "per-inode state kept while referenced" (used here as an unbounded,
//! never-evicting map rather than an LRU — entries are removed explicitly
//! by [`InodeTable::forget`], never by capacity pressure), and
//! `crossbeam_queue::SegQueue` gives the janitor its lock-free fd-close
//! queue.

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use moka::sync::Cache;
use tokio::sync::Mutex;

use crate::gfid::Gfid;

/// Serializes atomic read-modify-write on arbitrary xattrs (spec §3).
pub type XattropLock = Mutex<()>;
/// Serializes prestat/write/poststat triples when a caller requests atomicity.
pub type WriteAtomicLock = Mutex<()>;
/// Serializes parent-link-count xattr updates.
pub type PgfidLock = Mutex<()>;

/// Per-inode state kept by the engine while the inode is referenced.
pub struct PosixInodeCtx {
    pub gfid: Gfid,
    pub xattrop_lock: XattropLock,
    pub write_atomic_lock: WriteAtomicLock,
    pub pgfid_lock: PgfidLock,
    /// Set when the object has been moved to unlink staging but still has
    /// open descriptors.
    pub unlink_flag: AtomicBool,
    /// Count of live [`PosixFd`]s referencing this inode, used to decide
    /// when an unlink-staged object can finally be deleted.
    open_fd_count: AtomicU64,
}

impl PosixInodeCtx {
    pub fn new(gfid: Gfid) -> Arc<PosixInodeCtx> {
        Arc::new(PosixInodeCtx {
            gfid,
            xattrop_lock: Mutex::new(()),
            write_atomic_lock: Mutex::new(()),
            pgfid_lock: Mutex::new(()),
            unlink_flag: AtomicBool::new(false),
            open_fd_count: AtomicU64::new(0),
        })
    }

    pub fn is_unlinked(&self) -> bool {
        self.unlink_flag.load(Ordering::Acquire)
    }

    pub fn mark_unlinked(&self) {
        self.unlink_flag.store(true, Ordering::Release);
    }

    pub fn inc_open_fds(&self) -> u64 {
        self.open_fd_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the open-fd count and returns the value after the
    /// decrement; `0` means the last descriptor just closed.
    pub fn dec_open_fds(&self) -> u64 {
        self.open_fd_count.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn open_fds(&self) -> u64 {
        self.open_fd_count.load(Ordering::Acquire)
    }
}

/// An open descriptor record (spec §3's `pfd`).
///
/// Pairs an OS file descriptor with its open flags. For directory
/// descriptors, also carries the `DIR *`-equivalent handle state: the
/// last-returned offset and a sticky end-of-directory flag.
pub struct PosixFd {
    /// The inode this descriptor is open against.
    pub inode: Arc<PosixInodeCtx>,
    /// Current active OS descriptor. `ArcSwap`-like via a mutex because a
    /// graph switch may replace it in place (spec §4.4 descriptor
    /// migration) while in-flight operations still hold the `PosixFd`.
    pub active_fd: Mutex<RawFd>,
    pub flags: i32,
    pub is_directory: bool,
    /// Last `d_off` returned by `readdir`; `None` before the first call.
    pub dir_offset: Mutex<Option<u64>>,
    /// Sticky end-of-directory marker: once set, re-seeking to the stored
    /// EOF offset yields empty, not an error (spec §4.1 readdir).
    pub dir_eof: AtomicBool,
    /// Set when a graph-switch migration of this descriptor failed; any
    /// later operation on it returns [`crate::error::BrickError::FdStale`].
    pub stale: AtomicBool,
}

impl PosixFd {
    pub fn new_file(inode: Arc<PosixInodeCtx>, fd: RawFd, flags: i32) -> Arc<PosixFd> {
        inode.inc_open_fds();
        Arc::new(PosixFd {
            inode,
            active_fd: Mutex::new(fd),
            flags,
            is_directory: false,
            dir_offset: Mutex::new(None),
            dir_eof: AtomicBool::new(false),
            stale: AtomicBool::new(false),
        })
    }

    pub fn new_dir(inode: Arc<PosixInodeCtx>, fd: RawFd) -> Arc<PosixFd> {
        inode.inc_open_fds();
        Arc::new(PosixFd {
            inode,
            active_fd: Mutex::new(fd),
            flags: 0,
            is_directory: true,
            dir_offset: Mutex::new(None),
            dir_eof: AtomicBool::new(false),
            stale: AtomicBool::new(false),
        })
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }
}

/// The inode table: maps a [`Gfid`] to its live [`PosixInodeCtx`].
///
/// Entries are reference-counted via the `Arc` stored as the value; the
/// table itself never holds the last reference once a caller forgets an
/// inode (see [`InodeTable::forget`]).
pub struct InodeTable {
    inner: Cache<Gfid, Arc<PosixInodeCtx>>,
    /// Fds handed to the janitor for deferred close (§4.5).
    close_queue: SegQueue<RawFd>,
}

impl InodeTable {
    pub fn new() -> InodeTable {
        InodeTable {
            // No `max_capacity`/TTL: entries live exactly as long as a
            // caller holds a reference, removed only by `forget`.
            inner: Cache::builder().build(),
            close_queue: SegQueue::new(),
        }
    }

    /// Returns the context for `gfid`, creating one on first reference.
    ///
    /// Uses moka's coalescing `get_with` rather than a get-then-insert
    /// pair: two tasks racing to first-reference the same GFID must
    /// observe the same `PosixInodeCtx`, or they end up serializing
    /// xattrop/write-atomic/pgfid updates against two different mutexes
    /// instead of one (spec §5, §8 scenario 4).
    pub async fn get_or_insert(&self, gfid: Gfid) -> Arc<PosixInodeCtx> {
        self.inner.get_with(gfid, || PosixInodeCtx::new(gfid))
    }

    pub async fn lookup(&self, gfid: &Gfid) -> Option<Arc<PosixInodeCtx>> {
        self.inner.get(gfid)
    }

    /// Removes the context for `gfid`. If its `unlink_flag` is set, the
    /// caller (the release path) is responsible for running unlink-staging
    /// cleanup; this function only drops the table's reference.
    pub async fn forget(&self, gfid: &Gfid) -> Option<Arc<PosixInodeCtx>> {
        let existing = self.inner.get(gfid);
        self.inner.invalidate(gfid);
        existing
    }

    /// Enqueues an OS descriptor for the janitor to close on its own
    /// worker, so close() latency is never visible to a calling request.
    pub fn enqueue_close(&self, fd: RawFd) {
        self.close_queue.push(fd);
    }

    /// Drains descriptors queued for closing. Called only from the janitor
    /// task.
    pub fn drain_close_queue(&self) -> Vec<RawFd> {
        let mut drained = Vec::new();
        while let Some(fd) = self.close_queue.pop() {
            drained.push(fd);
        }
        drained
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        InodeTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_insert_is_idempotent() {
        let table = InodeTable::new();
        let g = Gfid::new_random();
        let a = table.get_or_insert(g).await;
        let b = table.get_or_insert(g).await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn concurrent_get_or_insert_coalesces_to_one_context() {
        let table = Arc::new(InodeTable::new());
        let g = Gfid::new_random();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let table = table.clone();
            tasks.push(tokio::spawn(async move { table.get_or_insert(g).await }));
        }
        let mut ctxs = Vec::new();
        for task in tasks {
            ctxs.push(task.await.unwrap());
        }
        for ctx in &ctxs[1..] {
            assert!(Arc::ptr_eq(&ctxs[0], ctx));
        }
    }

    #[tokio::test]
    async fn forget_removes_entry() {
        let table = InodeTable::new();
        let g = Gfid::new_random();
        table.get_or_insert(g).await;
        assert!(table.forget(&g).await.is_some());
        assert!(table.lookup(&g).await.is_none());
    }

    #[test]
    fn close_queue_drains_in_fifo_order() {
        let table = InodeTable::new();
        table.enqueue_close(3);
        table.enqueue_close(4);
        assert_eq!(table.drain_close_queue(), vec![3, 4]);
    }

    #[test]
    fn open_fd_accounting_tracks_last_close() {
        let ctx = PosixInodeCtx::new(Gfid::new_random());
        assert_eq!(ctx.inc_open_fds(), 1);
        assert_eq!(ctx.inc_open_fds(), 2);
        assert_eq!(ctx.dec_open_fds(), 1);
        assert_eq!(ctx.dec_open_fds(), 0);
    }
}
