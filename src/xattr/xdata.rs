//! The `xdata` side-channel dictionary (spec §4.3, §4.6; Design Notes §9).
//!
//! Modeled exactly as Design Notes §9 prescribes: a map keyed by short
//! interned strings to a closed, tagged value. Unknown keys are preserved
//! and forwarded by default — the engine only ever *reads* the keys it
//! recognizes (spec §4.6: "the engine never interprets an xdata key it
//! does not recognize; unknown keys are silently dropped from replies"
//! means *the engine's own replies* don't manufacture answers for keys it
//! didn't get asked about, not that it discards the caller's dictionary).

use std::collections::HashMap;

use crate::gfid::Gfid;

/// A tagged xdata value.
#[derive(Debug, Clone)]
pub enum XdataValue {
    Bytes(Vec<u8>),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Gfid(Gfid),
    /// A reference to a caller's open descriptor, used by requests that
    /// need to name an fd inline (e.g. `dht.iatt-in-xdata` replies).
    FdRef(u64),
}

/// Sideband-requested keys the engine interprets as imperatives (spec §4.3).
pub mod request_keys {
    pub const LINK_COUNT: &str = "link-count";
    pub const DHT_IATT_IN_XDATA: &str = "dht.iatt-in-xdata";
    pub const DURABLE: &str = "durable";
    pub const PREOP_PARENT_XATTR: &str = "preop-parent-xattr";
    pub const GF_PREOP_PARENT_KEY: &str = "GF_PREOP_PARENT_KEY";
    pub const SKIP_OPEN_FD_UNLINK: &str = "skip-open-fd-unlink";
    pub const WRITE_IS_APPEND: &str = "write-is-append";
    pub const UPDATE_ATOMIC: &str = "update-atomic";
    pub const WRITE_UPDATE_ATOMIC: &str = "write-update-atomic";
}

/// Sideband-reported keys the engine writes into a reply (spec §4.3).
pub mod reply_keys {
    pub const PREOP_CHECK_FAILED: &str = "preop-check-failed";
    pub const LINK_COUNT: &str = "link-count";
    pub const APPEND_WRITE: &str = "append";
    pub const ZEROFILL_REGION: &str = "zero-region";
}

/// The side-channel dictionary carried alongside a request or reply.
#[derive(Debug, Clone, Default)]
pub struct Xdata {
    entries: HashMap<String, XdataValue>,
}

impl Xdata {
    pub fn new() -> Xdata {
        Xdata { entries: HashMap::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: XdataValue) -> &mut Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&XdataValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        match self.entries.get(key) {
            Some(XdataValue::Bytes(b)) => Some(b),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get_bytes(key).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &XdataValue)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_preserved() {
        let mut xdata = Xdata::new();
        xdata.insert("some.unrecognized.key", XdataValue::U32(7));
        assert!(xdata.contains("some.unrecognized.key"));
    }

    #[test]
    fn typed_accessors_reject_mismatched_variants() {
        let mut xdata = Xdata::new();
        xdata.insert("k", XdataValue::U32(1));
        assert!(xdata.get_bytes("k").is_none());
    }
}
