//! `rchecksum` — weak rolling checksum plus strong checksum over a byte
//! range, used by self-heal to compare regions cheaply before falling
//! back to a full read (spec §4.1).

use std::sync::Arc;

use md5::{Digest, Md5};
use sha2::Sha256;

use crate::context::PosixFd;
use crate::error::{BrickError, BrickResult};

use super::PosixEngine;

pub struct Args {
    pub offset: u64,
    pub len: usize,
}

pub struct Success {
    pub weak: u32,
    pub strong: Vec<u8>,
    /// Set when the caller requested the zero-region flag and the entire
    /// range read back as zero bytes.
    pub zero_region: bool,
}

pub async fn rchecksum(engine: &PosixEngine, fd: &Arc<PosixFd>, args: Args) -> BrickResult<Success> {
    if fd.is_stale() {
        return Err(BrickError::FdStale);
    }
    let raw_fd = *fd.active_fd.lock().await;
    let mut buf = vec![0u8; args.len];
    let read = unsafe {
        libc::pread(raw_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), args.offset as libc::off_t)
    };
    if read < 0 {
        return Err(BrickError::last_os_error());
    }
    buf.truncate(read as usize);

    let weak = weak_rolling_sum(&buf);
    let strong = if engine.config.fips_mode_rchecksum {
        Sha256::digest(&buf).to_vec()
    } else {
        Md5::digest(&buf).to_vec()
    };
    let zero_region = buf.iter().all(|b| *b == 0);

    Ok(Success { weak, strong, zero_region })
}

/// A constant-time rolling sum: the low 16 bits sum the bytes, the high
/// 16 bits sum the running totals (the classic Adler-style weak
/// checksum used for cheap region comparison before a strong hash).
fn weak_rolling_sum(data: &[u8]) -> u32 {
    let mut a: u32 = 0;
    let mut b: u32 = 0;
    for &byte in data {
        a = a.wrapping_add(byte as u32);
        b = b.wrapping_add(a);
    }
    (b << 16) | (a & 0xffff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfid::Gfid;
    use crate::posix::{create, testutil::test_engine, writev};

    #[tokio::test]
    async fn rchecksum_detects_zero_region() {
        let (_dir, engine) = test_engine();
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();
        writev::writev(&engine, &created.fd, writev::Args { offset: 0, data: vec![0u8; 16], is_append_intent: false, update_atomic: false, internal_write: false })
            .await
            .unwrap();

        let result = rchecksum(&engine, &created.fd, Args { offset: 0, len: 16 }).await.unwrap();
        assert!(result.zero_region);
        assert_eq!(result.strong.len(), 16);
    }

    #[tokio::test]
    async fn rchecksum_uses_sha256_in_fips_mode() {
        let (_dir, mut engine) = test_engine();
        engine.config.fips_mode_rchecksum = true;
        let created = create::create(&engine, create::Args { parent: Gfid::ROOT, name: "f".to_string(), mode: 0o644, flags: libc::O_RDWR, xattrs: Vec::new() })
            .await
            .unwrap();
        writev::writev(&engine, &created.fd, writev::Args { offset: 0, data: b"hello".to_vec(), is_append_intent: false, update_atomic: false, internal_write: false })
            .await
            .unwrap();

        let result = rchecksum(&engine, &created.fd, Args { offset: 0, len: 5 }).await.unwrap();
        assert_eq!(result.strong.len(), 32);
    }
}
