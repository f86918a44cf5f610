//! Shared types: page identifiers, page roles, and tree configuration.

mod page_id;

pub use page_id::PageId;

use serde::{Deserialize, Serialize};

/// Maximum number of levels the tree is allowed to grow to.
pub const MAX_LEVEL: usize = 8;

/// Default page size in bytes, matching the reference's typical setting.
pub const DEFAULT_PAGE_SIZE: u16 = 512;

/// Size in bytes of a physical page identifier as stored in a child-pointer
/// array or the page header's logical id field.
pub const PAGE_ID_SIZE: usize = 4;

const LEAF_BASE: u16 = 0;
const INTERIOR_BASE: u16 = 10_000;
const ROOT_BASE: u16 = 20_000;

/// The role a page plays, folded out of the wire-encoded count field.
///
/// On disk this is represented by adding a role-specific offset to the raw
/// record count (`+10000` for an interior non-root node, `+20000` for the
/// root); decoding subtracts the offset back out. The role and the count
/// travel together because the reference stores them in the same two bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRole {
    Leaf(u16),
    Interior(u16),
    Root(u16),
}

impl PageRole {
    /// Record count regardless of role.
    pub fn count(self) -> u16 {
        match self {
            PageRole::Leaf(n) | PageRole::Interior(n) | PageRole::Root(n) => n,
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, PageRole::Leaf(_))
    }

    pub fn is_interior(self) -> bool {
        !self.is_leaf()
    }

    pub fn is_root(self) -> bool {
        matches!(self, PageRole::Root(_))
    }

    /// Re-encode into the wire representation of the count field.
    pub fn encode(self) -> u16 {
        match self {
            PageRole::Leaf(n) => LEAF_BASE + n,
            PageRole::Interior(n) => INTERIOR_BASE + n,
            PageRole::Root(n) => ROOT_BASE + n,
        }
    }

    /// Decode the wire representation of the count field into a role.
    pub fn decode(raw: u16) -> Self {
        if raw >= ROOT_BASE {
            PageRole::Root(raw - ROOT_BASE)
        } else if raw >= INTERIOR_BASE {
            PageRole::Interior(raw - INTERIOR_BASE)
        } else {
            PageRole::Leaf(raw)
        }
    }

    pub fn with_count(self, n: u16) -> Self {
        match self {
            PageRole::Leaf(_) => PageRole::Leaf(n),
            PageRole::Interior(_) => PageRole::Interior(n),
            PageRole::Root(_) => PageRole::Root(n),
        }
    }
}

/// Reserved bit flags for the optional summary-indexing hooks (§4.3.9). The
/// core tree never inspects these; they exist so a caller-supplied
/// `BitmapHooks` implementation can be toggled on without touching the wire
/// format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Parameters(pub u8);

impl Parameters {
    pub const USE_INDEX: Parameters = Parameters(1);
    pub const USE_MAX_MIN: Parameters = Parameters(2);
    pub const USE_BMAP: Parameters = Parameters(4);

    pub fn contains(self, flag: Parameters) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl std::ops::BitOr for Parameters {
    type Output = Parameters;
    fn bitor(self, rhs: Parameters) -> Parameters {
        Parameters(self.0 | rhs.0)
    }
}

/// Ordering function over raw key bytes: negative/zero/positive, mirroring
/// the reference's `compareKey` function pointer.
pub type CompareKey = fn(&[u8], &[u8]) -> std::cmp::Ordering;

/// Default comparator: big-endian unsigned integer order over the raw key
/// bytes. This is what every accessor and the `max+1` flush separator
/// assumes unless a custom comparator is supplied.
pub fn compare_be_bytes(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.cmp(b)
}

fn default_compare() -> CompareKey {
    compare_be_bytes
}

/// Tree-shape configuration: sizes and fan-out parameters.
///
/// Mirrors the source crate's `BTreeConfig`/`Config` split: this struct
/// holds only the parameters that determine page layout and search
/// behavior, independent of where pages are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BTreeConfig {
    pub page_size: u16,
    pub key_size: u8,
    pub data_size: u8,
    pub parameters: Parameters,
    #[serde(skip, default = "default_compare")]
    pub compare_key: CompareKey,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            key_size: 4,
            data_size: 4,
            parameters: Parameters::default(),
            compare_key: compare_be_bytes,
        }
    }
}

impl BTreeConfig {
    pub fn new(key_size: u8, data_size: u8) -> Self {
        Self {
            key_size,
            data_size,
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: u16) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_compare_key(mut self, compare_key: CompareKey) -> Self {
        self.compare_key = compare_key;
        self
    }

    pub fn record_size(&self) -> usize {
        self.key_size as usize + self.data_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips() {
        for role in [PageRole::Leaf(7), PageRole::Interior(3), PageRole::Root(1)] {
            assert_eq!(PageRole::decode(role.encode()), role);
        }
    }

    #[test]
    fn role_thresholds_match_wire_contract() {
        assert!(PageRole::decode(0).is_leaf());
        assert!(PageRole::decode(9_999).is_leaf());
        assert!(PageRole::decode(10_000).is_interior());
        assert!(!PageRole::decode(19_999).is_root());
        assert!(PageRole::decode(20_000).is_root());
    }
}
