//! A small interactive harness for exercising a brick without a FUSE
//! bridge or RPC server in front of it: opens the exported directory,
//! creates a file, writes to it, and reports back what the engine saw.

use std::collections::HashMap;

use brickd::dispatch::{self, Credentials, OpId, Request, Response};
use brickd::gfid::Gfid;
use brickd::graph::{Graph, Translator};
use brickd::Brick;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = brickd::config::Cli::parse();
    let config = cli.resolve_config()?;

    let mut nodes = HashMap::new();
    nodes.insert(
        "posix".to_string(),
        Translator {
            type_name: "storage/posix".to_string(),
            name: "posix".to_string(),
            options: HashMap::new(),
            children: Vec::new(),
        },
    );
    let graph = Graph { version: 1, top: "posix".to_string(), nodes };

    let brick = Brick::start(cli.brick_path.clone(), config, graph)
        .await
        .map_err(|e| format!("failed to start brick at {}: {e}", cli.brick_path.display()))?;

    let credentials = Credentials { uid: 0, gid: 0, groups: Vec::new(), pid: std::process::id() as i32, lock_owner: Vec::new() };

    let stack = brick.new_stack(credentials.clone(), OpId::Create).await;
    let created = match dispatch::dispatch(
        &brick.engine,
        &stack,
        Request::Create(brickd::posix::create::Args {
            parent: Gfid::ROOT,
            name: "brick_cli_probe".to_string(),
            mode: 0o644,
            flags: libc::O_RDWR | libc::O_CREAT,
            xattrs: Vec::new(),
        }),
    )
    .await
    {
        Ok(Response::Created(success)) => success,
        Ok(_) => unreachable!("create always returns Response::Created"),
        Err(e) => return Err(format!("create failed: {e}").into()),
    };
    println!("created {} (gfid {})", "brick_cli_probe", created.entry.gfid.canonical());

    let stack = brick.new_stack(credentials.clone(), OpId::Writev).await;
    dispatch::dispatch(
        &brick.engine,
        &stack,
        Request::Writev {
            fd: created.fd.clone(),
            args: brickd::posix::writev::Args {
                offset: 0,
                data: b"hello from brick_cli\n".to_vec(),
                is_append_intent: false,
                update_atomic: false,
                internal_write: false,
            },
        },
    )
    .await
    .map_err(|e| format!("writev failed: {e}"))?;

    let stack = brick.new_stack(credentials.clone(), OpId::Stat).await;
    let stat = match dispatch::dispatch(
        &brick.engine,
        &stack,
        Request::Stat(brickd::posix::stat::Args { gfid: created.entry.gfid }),
    )
    .await
    {
        Ok(Response::Stat(success)) => success,
        Ok(_) => unreachable!("stat always returns Response::Stat"),
        Err(e) => return Err(format!("stat failed: {e}").into()),
    };
    println!("size after write: {} bytes", stat.attr.size);

    let stack = brick.new_stack(credentials, OpId::Release).await;
    dispatch::dispatch(&brick.engine, &stack, Request::Release { fd: created.fd })
        .await
        .map_err(|e| format!("release failed: {e}"))?;

    Ok(())
}
