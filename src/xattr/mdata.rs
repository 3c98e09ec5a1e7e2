//! The `trusted.glusterfs.mdata` authoritative-timestamp xattr (spec §6
//! `ctime` option: "store a separate mdata xattr recording authoritative
//! timestamps").
//!
//! Regular `st_ctime`/`st_mtime`/`st_atime` are set by whichever backend
//! filesystem call happened to run locally last, which is not authoritative
//! once a higher replication layer orders operations across bricks. When
//! `ctime` is enabled the engine additionally stamps this xattr so a
//! higher layer can treat it (rather than the raw inode timestamps) as the
//! object's version clock.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{BrickError, BrickResult};

use super::keys::MDATA;

/// One second+nanosecond timestamp pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: u32,
}

/// The three authoritative timestamps tracked per object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mdata {
    pub ctime: Timespec,
    pub mtime: Timespec,
    pub atime: Timespec,
}

/// Encoded size: three `(i64, u32)` pairs, big-endian.
pub const ENCODED_SIZE: usize = 3 * (8 + 4);

/// The current wall-clock time as a `Timespec`, clamped to zero if the
/// system clock reads before the epoch.
pub fn now() -> Timespec {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Timespec { sec: since_epoch.as_secs() as i64, nsec: since_epoch.subsec_nanos() }
}

pub fn encode(mdata: &Mdata) -> [u8; ENCODED_SIZE] {
    let mut buf = [0u8; ENCODED_SIZE];
    write_timespec(&mut buf[0..12], &mdata.ctime);
    write_timespec(&mut buf[12..24], &mdata.mtime);
    write_timespec(&mut buf[24..36], &mdata.atime);
    buf
}

pub fn decode(value: &[u8]) -> BrickResult<Mdata> {
    if value.len() != ENCODED_SIZE {
        return Err(BrickError::InvalidArgument);
    }
    Ok(Mdata {
        ctime: read_timespec(&value[0..12]),
        mtime: read_timespec(&value[12..24]),
        atime: read_timespec(&value[24..36]),
    })
}

fn write_timespec(buf: &mut [u8], ts: &Timespec) {
    BigEndian::write_i64(&mut buf[0..8], ts.sec);
    BigEndian::write_u32(&mut buf[8..12], ts.nsec);
}

fn read_timespec(buf: &[u8]) -> Timespec {
    Timespec { sec: BigEndian::read_i64(&buf[0..8]), nsec: BigEndian::read_u32(&buf[8..12]) }
}

/// Writes a fresh `mdata` xattr with all three timestamps set to `now`
/// (used on create, where ctime/mtime/atime all start equal).
pub fn stamp_created(path: &std::path::Path, now: Timespec) -> BrickResult<()> {
    let mdata = Mdata { ctime: now, mtime: now, atime: now };
    xattr::set(path, MDATA, &encode(&mdata)).map_err(|_| BrickError::last_os_error())
}

/// Updates only `ctime` (a bare metadata change — chmod/chown/xattr edit).
/// Leaves `mtime`/`atime` as previously recorded, creating the record from
/// scratch (all three fields equal to `now`) if none existed yet.
pub fn bump_ctime(path: &std::path::Path, now: Timespec) -> BrickResult<()> {
    let mut mdata = read(path)?.unwrap_or(Mdata { ctime: now, mtime: now, atime: now });
    mdata.ctime = now;
    xattr::set(path, MDATA, &encode(&mdata)).map_err(|_| BrickError::last_os_error())
}

/// Updates `mtime` and `ctime` together (a data-modifying write), creating
/// the record from scratch if none existed yet.
pub fn bump_mtime(path: &std::path::Path, now: Timespec) -> BrickResult<()> {
    let mut mdata = read(path)?.unwrap_or(Mdata { ctime: now, mtime: now, atime: now });
    mdata.mtime = now;
    mdata.ctime = now;
    xattr::set(path, MDATA, &encode(&mdata)).map_err(|_| BrickError::last_os_error())
}

fn read(path: &std::path::Path) -> BrickResult<Option<Mdata>> {
    match xattr::get(path, MDATA).map_err(|_| BrickError::last_os_error())? {
        Some(v) => decode(&v).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let mdata = Mdata {
            ctime: Timespec { sec: 10, nsec: 20 },
            mtime: Timespec { sec: 30, nsec: 40 },
            atime: Timespec { sec: 50, nsec: 60 },
        };
        assert_eq!(decode(&encode(&mdata)).unwrap(), mdata);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn stamp_created_then_bump_mtime_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        stamp_created(&path, Timespec { sec: 1, nsec: 0 }).unwrap();
        bump_mtime(&path, Timespec { sec: 2, nsec: 0 }).unwrap();

        let mdata = read(&path).unwrap().unwrap();
        assert_eq!(mdata.mtime.sec, 2);
        assert_eq!(mdata.ctime.sec, 2);
        assert_eq!(mdata.atime.sec, 1);
    }
}
