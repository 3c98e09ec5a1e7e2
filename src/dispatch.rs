//! Component F — the dispatch contract: frame, stack, and xdata plumbing.
//!
//! Design Notes §9 flags the source's callback-threaded forward/reply
//! pattern for re-architecture. This module reshapes it as explicit
//! request/response values: `dispatch()` is a plain async function that
//! resolves an operation against the active graph snapshot and returns a
//! `Reply` value, rather than threading a callback through translators.

use std::sync::Arc;

use crate::graph::GraphSnapshot;
use crate::xattr::xdata::Xdata;

/// Caller credentials carried on every [`Frame`] (spec §4.6).
#[derive(Debug, Clone)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
    pub groups: Vec<u32>,
    pub pid: i32,
    pub lock_owner: Vec<u8>,
}

/// The operation identifier for a request (spec §4.1's operation set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpId {
    Lookup,
    Stat,
    Readlink,
    Mknod,
    Mkdir,
    Unlink,
    Rmdir,
    Symlink,
    Rename,
    Link,
    Create,
    Open,
    Readv,
    Writev,
    Flush,
    Fsync,
    Opendir,
    Readdir,
    Release,
    Releasedir,
    Statfs,
    Setxattr,
    Getxattr,
    Removexattr,
    Fsetxattr,
    Fgetxattr,
    Fremovexattr,
    Truncate,
    Ftruncate,
    Access,
    Fallocate,
    Discard,
    Zerofill,
    Seek,
    Rchecksum,
    Xattrop,
    Fxattrop,
    Put,
    Setattr,
    Fsetattr,
}

/// A per-call record: the unit of work traveling through the graph.
pub struct Frame {
    pub credentials: Credentials,
    pub op: OpId,
    pub xdata: Xdata,
    /// The graph snapshot this frame was issued against; held for the
    /// frame's lifetime so a concurrent graph switch can't invalidate the
    /// translator topology mid-request.
    pub graph: Arc<GraphSnapshot>,
}

/// A call-path through the graph for one request. In this reshaped model
/// the stack carries only the originating frame; the original's
/// per-translator stack-frame rewriting is replaced by each translator
/// reading/writing `xdata` on the shared [`Frame`] and returning a value
/// rather than rewinding a callback chain.
pub struct Stack {
    pub frame: Frame,
}

impl Stack {
    pub fn new(frame: Frame) -> Stack {
        Stack { frame }
    }

    /// Captures a wind guard on the frame's graph for the duration of the
    /// dispatched call.
    pub fn enter(&self) -> crate::graph::WindGuard {
        self.frame.graph.enter()
    }
}

/// A reply travelling back through the stack: a POSIX-style
/// `(op_ret, op_errno)` pair plus any sideband data the engine filled in.
///
/// Unknown xdata keys the caller asked about that the engine doesn't
/// recognize are simply absent from `xdata` here — the engine never
/// manufactures answers for keys it didn't understand (spec §4.6).
pub struct Reply {
    pub op_ret: i32,
    pub op_errno: i32,
    pub xdata: Xdata,
}

impl Reply {
    pub fn ok(op_ret: i32) -> Reply {
        Reply { op_ret, op_errno: 0, xdata: Xdata::new() }
    }

    pub fn ok_with_xdata(op_ret: i32, xdata: Xdata) -> Reply {
        Reply { op_ret, op_errno: 0, xdata }
    }

    pub fn err(errno: i32) -> Reply {
        Reply { op_ret: -1, op_errno: errno, xdata: Xdata::new() }
    }

    pub fn from_result<T>(result: Result<T, crate::error::BrickError>, to_ret: impl FnOnce(T) -> i32) -> Reply
    where
        T: Sized,
    {
        match result {
            Ok(value) => Reply::ok(to_ret(value)),
            Err(e) => Reply::err(e.errno()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.op_ret >= 0
    }
}

/// Every request `dispatch` knows how to run, each wrapping the exact
/// `Args` (or, for fd-addressed operations, an already-open descriptor
/// plus `Args`) the corresponding `crate::posix` module expects.
///
/// `OpId` on the enclosing [`Frame`] still names the logical operation
/// for tracing/accounting; this enum carries the typed payload a caller
/// above the engine (the FUSE bridge, the RPC server) is responsible for
/// having already resolved out of the wire request.
pub enum Request {
    Lookup(crate::posix::lookup::Args),
    Stat(crate::posix::stat::Args),
    Readlink(crate::posix::readlink::Args),
    Mknod(crate::posix::mknod::Args),
    Mkdir(crate::posix::mkdir::Args),
    Unlink(crate::posix::unlink::Args),
    Rmdir(crate::posix::rmdir::Args),
    Symlink(crate::posix::symlink::Args),
    Rename(crate::posix::rename::Args),
    Link(crate::posix::link::Args),
    Create(crate::posix::create::Args),
    Open(crate::posix::open::Args),
    Readv { fd: Arc<crate::context::PosixFd>, args: crate::posix::readv::Args },
    Writev { fd: Arc<crate::context::PosixFd>, args: crate::posix::writev::Args },
    Flush { fd: Arc<crate::context::PosixFd> },
    Fsync { fd: Arc<crate::context::PosixFd>, args: crate::posix::fsync::Args },
    Opendir(crate::posix::opendir::Args),
    Readdir { fd: Arc<crate::context::PosixFd>, args: crate::posix::readdir::Args },
    Readdirp { fd: Arc<crate::context::PosixFd>, args: crate::posix::readdir::Args },
    Release { fd: Arc<crate::context::PosixFd> },
    Releasedir { fd: Arc<crate::context::PosixFd> },
    Statfs,
    Setxattr { gfid: crate::gfid::Gfid, key: String, value: Vec<u8> },
    Getxattr { gfid: crate::gfid::Gfid, key: String },
    Removexattr { gfid: crate::gfid::Gfid, keys: Vec<String> },
    Fsetxattr { fd: Arc<crate::context::PosixFd>, key: String, value: Vec<u8> },
    Fgetxattr { fd: Arc<crate::context::PosixFd>, key: String },
    Fremovexattr { fd: Arc<crate::context::PosixFd>, keys: Vec<String> },
    Truncate(crate::posix::truncate::Args),
    Ftruncate { fd: Arc<crate::context::PosixFd>, size: u64 },
    Access(crate::posix::access::Args),
    Fallocate { fd: Arc<crate::context::PosixFd>, args: crate::posix::fallocate::Args },
    Seek { fd: Arc<crate::context::PosixFd>, args: crate::posix::seek::Args },
    Rchecksum { fd: Arc<crate::context::PosixFd>, args: crate::posix::rchecksum::Args },
    Xattrop(crate::posix::xattrop::Args),
    Fxattrop {
        fd: Arc<crate::context::PosixFd>,
        key: String,
        opcode: crate::xattr::xattrop::Opcode,
        operand: Vec<u8>,
    },
    Put(crate::posix::put::Args),
    Setattr(crate::posix::setattr::Args),
    Fsetattr { fd: Arc<crate::context::PosixFd>, update: crate::posix::setattr::AttrUpdate },
}

/// The typed result of a dispatched request. Scalar, fd-free operations
/// (`flush`, `fsync`, `access`, ...) collapse to `Unit`; everything else
/// carries the same `Success`/return type its `crate::posix` module
/// already returns, so nothing is re-encoded or lossily flattened here.
pub enum Response {
    Lookup(crate::posix::lookup::Success),
    Stat(crate::posix::stat::Success),
    Readlink(crate::posix::readlink::Success),
    Entry(crate::posix::NewEntry),
    Unlink(crate::posix::unlink::Success),
    Rmdir(crate::posix::rmdir::Success),
    Rename(crate::posix::rename::Success),
    Link(crate::posix::link::Success),
    Created(crate::posix::create::Success),
    Opened(Arc<crate::context::PosixFd>),
    Data(Vec<u8>),
    Write(crate::posix::writev::Success),
    Readdir(crate::posix::readdir::Success),
    Statfs(crate::posix::statfs::Statfs),
    Xattr(Vec<u8>),
    Attr(crate::posix::Stat),
    Seek(u64),
    Rchecksum(crate::posix::rchecksum::Success),
    Xattrop(crate::xattr::xattrop::Applied),
    Put(crate::posix::put::Success),
    Release,
    Unit,
}

/// Resolves `request` against `engine`, holding a wind guard on
/// `stack.frame`'s graph snapshot for the duration so a concurrent graph
/// switch can't retire the snapshot mid-call.
pub async fn dispatch(
    engine: &crate::posix::PosixEngine,
    stack: &Stack,
    request: Request,
) -> crate::error::BrickResult<Response> {
    let _wind = stack.enter();

    use crate::posix::{
        access, create, fallocate, flush, fsync, link, lookup, mkdir, mknod, open, opendir, put,
        rchecksum, readdir, readlink, readv, release, releasedir, rename, rmdir, seek, setattr,
        stat, statfs, symlink, truncate, unlink, writev, xattr_ops,
    };

    match request {
        Request::Lookup(args) => lookup::lookup(engine, args).await.map(Response::Lookup),
        Request::Stat(args) => stat::stat(engine, args).await.map(Response::Stat),
        Request::Readlink(args) => readlink::readlink(engine, args).await.map(Response::Readlink),
        Request::Mknod(args) => mknod::mknod(engine, args).await.map(Response::Entry),
        Request::Mkdir(args) => mkdir::mkdir(engine, args).await.map(Response::Entry),
        Request::Symlink(args) => symlink::symlink(engine, args).await.map(Response::Entry),
        Request::Unlink(args) => unlink::unlink(engine, args).await.map(Response::Unlink),
        Request::Rmdir(args) => rmdir::rmdir(engine, args).await.map(Response::Rmdir),
        Request::Rename(args) => rename::rename(engine, args).await.map(Response::Rename),
        Request::Link(args) => link::link(engine, args).await.map(Response::Link),
        Request::Create(args) => create::create(engine, args).await.map(Response::Created),
        Request::Open(args) => open::open(engine, args).await.map(Response::Opened),
        Request::Readv { fd, args } => readv::readv(engine, &fd, args).await.map(Response::Data),
        Request::Writev { fd, args } => writev::writev(engine, &fd, args).await.map(Response::Write),
        Request::Flush { fd } => flush::flush(&fd).await.map(|_| Response::Unit),
        Request::Fsync { fd, args } => fsync::fsync(engine, &fd, args).await.map(|_| Response::Unit),
        Request::Opendir(args) => opendir::opendir(engine, args).await.map(Response::Opened),
        Request::Readdir { fd, args } => readdir::readdir(engine, &fd, args).await.map(Response::Readdir),
        Request::Readdirp { fd, args } => readdir::readdirp(engine, &fd, args).await.map(Response::Readdir),
        Request::Release { fd } => release::release(engine, fd).await.map(|_| Response::Release),
        Request::Releasedir { fd } => releasedir::releasedir(engine, fd).await.map(|_| Response::Unit),
        Request::Statfs => statfs::statfs(engine).await.map(Response::Statfs),
        Request::Setxattr { gfid, key, value } => {
            xattr_ops::setxattr(engine, gfid, key, value).await.map(|_| Response::Unit)
        }
        Request::Getxattr { gfid, key } => xattr_ops::getxattr(engine, gfid, key).await.map(Response::Xattr),
        Request::Removexattr { gfid, keys } => {
            xattr_ops::removexattr(engine, gfid, keys).await.map(|_| Response::Unit)
        }
        Request::Fsetxattr { fd, key, value } => {
            xattr_ops::fsetxattr(&fd, key, value).await.map(|_| Response::Unit)
        }
        Request::Fgetxattr { fd, key } => {
            xattr_ops::fgetxattr(engine, &fd, key).await.map(Response::Xattr)
        }
        Request::Fremovexattr { fd, keys } => {
            xattr_ops::fremovexattr(&fd, keys).await.map(|_| Response::Unit)
        }
        Request::Truncate(args) => truncate::truncate(engine, args).await.map(Response::Attr),
        Request::Ftruncate { fd, size } => truncate::ftruncate(&fd, size).await.map(|_| Response::Unit),
        Request::Access(args) => access::access(engine, args).await.map(|_| Response::Unit),
        Request::Fallocate { fd, args } => fallocate::fallocate(engine, &fd, args).await.map(|_| Response::Unit),
        Request::Seek { fd, args } => seek::seek(&fd, args).await.map(Response::Seek),
        Request::Rchecksum { fd, args } => rchecksum::rchecksum(engine, &fd, args).await.map(Response::Rchecksum),
        Request::Xattrop(args) => {
            crate::posix::xattrop::xattrop(engine, args).await.map(Response::Xattrop)
        }
        Request::Fxattrop { fd, key, opcode, operand } => {
            crate::posix::xattrop::fxattrop(&fd, key, opcode, operand).await.map(Response::Xattrop)
        }
        Request::Put(args) => put::put(engine, args).await.map(Response::Put),
        Request::Setattr(args) => setattr::setattr(engine, args).await.map(Response::Attr),
        Request::Fsetattr { fd, update } => setattr::fsetattr(engine, &fd, update).await.map(|_| Response::Unit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_reply_has_nonnegative_ret_and_zero_errno() {
        let reply = Reply::ok(0);
        assert!(reply.is_success());
        assert_eq!(reply.op_errno, 0);
    }

    #[test]
    fn err_reply_has_negative_ret_and_matching_errno() {
        let reply = Reply::err(libc::ESTALE);
        assert!(!reply.is_success());
        assert_eq!(reply.op_errno, libc::ESTALE);
    }

    fn test_stack(op: OpId) -> Stack {
        use crate::graph::{Graph, GraphSnapshot};
        use std::collections::HashMap;

        let graph = Graph { version: 0, top: "storage/posix".to_string(), nodes: HashMap::new() };
        let snapshot = Arc::new(GraphSnapshot::new(graph));
        let credentials = Credentials { uid: 0, gid: 0, groups: Vec::new(), pid: 1, lock_owner: Vec::new() };
        Stack::new(Frame { credentials, op, xdata: Xdata::new(), graph: snapshot })
    }

    #[tokio::test]
    async fn dispatch_mkdir_then_stat_round_trips() {
        let (_dir, engine) = crate::posix::testutil::test_engine();

        let created = match dispatch(
            &engine,
            &test_stack(OpId::Mkdir),
            Request::Mkdir(crate::posix::mkdir::Args {
                parent: crate::gfid::Gfid::ROOT,
                name: "d".to_string(),
                mode: 0o755,
                preop_parent_xattr: None,
            }),
        )
        .await
        .unwrap()
        {
            Response::Entry(entry) => entry,
            _ => panic!("expected Response::Entry"),
        };

        let stat = match dispatch(&engine, &test_stack(OpId::Stat), Request::Stat(crate::posix::stat::Args { gfid: created.gfid }))
            .await
            .unwrap()
        {
            Response::Stat(success) => success,
            _ => panic!("expected Response::Stat"),
        };
        assert!(stat.attr.is_dir());
    }

    #[tokio::test]
    async fn dispatch_create_writev_readv_round_trips() {
        let (_dir, engine) = crate::posix::testutil::test_engine();

        let created = match dispatch(
            &engine,
            &test_stack(OpId::Create),
            Request::Create(crate::posix::create::Args {
                parent: crate::gfid::Gfid::ROOT,
                name: "f".to_string(),
                mode: 0o644,
                flags: libc::O_RDWR,
                xattrs: Vec::new(),
            }),
        )
        .await
        .unwrap()
        {
            Response::Created(success) => success,
            _ => panic!("expected Response::Created"),
        };

        dispatch(
            &engine,
            &test_stack(OpId::Writev),
            Request::Writev {
                fd: created.fd.clone(),
                args: crate::posix::writev::Args {
                    offset: 0,
                    data: b"hello".to_vec(),
                    is_append_intent: false,
                    update_atomic: false,
                    internal_write: false,
                },
            },
        )
        .await
        .unwrap();

        let data = match dispatch(
            &engine,
            &test_stack(OpId::Readv),
            Request::Readv { fd: created.fd, args: crate::posix::readv::Args { offset: 0, len: 5 } },
        )
        .await
        .unwrap()
        {
            Response::Data(bytes) => bytes,
            _ => panic!("expected Response::Data"),
        };
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn dispatch_propagates_stale_handle_error() {
        let (_dir, engine) = crate::posix::testutil::test_engine();
        let bogus = crate::gfid::Gfid::new_random();
        let result = dispatch(&engine, &test_stack(OpId::Stat), Request::Stat(crate::posix::stat::Args { gfid: bogus })).await;
        assert_eq!(result.err(), Some(crate::error::BrickError::StaleHandle));
    }
}
