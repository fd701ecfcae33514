//! Types of the JSON metadata dump format.
//!
//! A dump is a single JSON object:
//!
//! ```text
//! {
//!   "Setting": { ... },
//!   "Counters": { "usedSpace": .., "usedInodes": .., ... },
//!   "Sustained": [ { "sid": .., "inodes": [..] } ],
//!   "DelFiles": [ { "inode": .., "length": .., "expire": .. } ],
//!   "FSTree": { "attr": {..}, "xattrs": [..], "entries": { "<name>": {..} } },
//!   "Trash": { ... }
//! }
//! ```
//!
//! Entry names, symlink targets and xattr values are stored escaped, see
//! `metadump_tools::escape`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Format, Ino};

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Older dumps may contain `null` instead of an empty list.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Global counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DumpedCounters {
    pub used_space: i64,
    pub used_inodes: i64,
    #[serde(rename = "nextInodes")]
    pub next_inode: i64,
    pub next_chunk: i64,
    pub next_session: i64,
    pub next_trash: i64,
    /// Deprecated, always written as 0 and ignored on load.
    #[serde(skip_serializing_if = "is_zero")]
    pub next_cleanup_slices: i64,
}

/// A file waiting for its data to be deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpedDelFile {
    pub inode: Ino,
    pub length: u64,
    pub expire: i64,
}

/// A session still holding open but unlinked inodes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpedSustained {
    pub sid: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inodes: Vec<Ino>,
}

/// Serialized inode attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpedAttr {
    pub inode: Ino,
    #[serde(rename = "type")]
    pub typ: String,
    pub mode: u16,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub atimensec: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub mtimensec: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub ctimensec: u32,
    pub nlink: u32,
    /// Only set for regular files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(skip_serializing_if = "is_zero")]
    pub rdev: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpedSlice {
    #[serde(rename = "chunkid")]
    pub id: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub pos: u32,
    pub size: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub off: u32,
    pub len: u32,
}

/// Data layout of one chunk of a file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpedChunk {
    pub index: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slices: Vec<DumpedSlice>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpedXattr {
    pub name: String,
    /// Escaped value
    pub value: String,
}

/// One occurrence of an inode in the dumped tree.
///
/// The entry name is the key inside the parent's `entries` object, so `name`
/// and `parents` are never serialized. They are filled in while loading.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpedEntry {
    #[serde(skip)]
    pub name: Vec<u8>,
    #[serde(skip)]
    pub parents: Vec<Ino>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<DumpedAttr>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub symlink: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xattrs: Vec<DumpedXattr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<DumpedChunk>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entries: BTreeMap<String, DumpedEntry>,
}

/// Everything in a dump except the two inode trees.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DumpHeader {
    #[serde(default)]
    pub setting: Format,
    #[serde(default)]
    pub counters: DumpedCounters,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sustained: Vec<DumpedSustained>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub del_files: Vec<DumpedDelFile>,
}

/// A complete dump document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpedMeta {
    #[serde(flatten)]
    pub header: DumpHeader,
    #[serde(rename = "FSTree", default, skip_serializing_if = "Option::is_none")]
    pub fs_tree: Option<DumpedEntry>,
    #[serde(rename = "Trash", default, skip_serializing_if = "Option::is_none")]
    pub trash: Option<DumpedEntry>,
}
