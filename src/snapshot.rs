//! Source of the metadata tree written by a dump.

use std::collections::HashMap;

use anyhow::Error;

use metadump_api_types::{DumpedChunk, Ino, InodeAttr};

/// Extended attribute with raw value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Xattr {
    pub name: String,
    pub value: Vec<u8>,
}

/// Everything a dump needs to know about one inode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InodeSnapshot {
    pub inode: Ino,
    pub attr: InodeAttr,
    /// Symlink target, empty for other types
    pub symlink: Vec<u8>,
    pub xattrs: Vec<Xattr>,
    pub chunks: Vec<DumpedChunk>,
}

/// Read access to a consistent metadata snapshot.
///
/// Implementations are responsible for isolation, the tree must not change
/// while a dump walks it.
pub trait DumpSource {
    /// Look up an inode, `None` if it does not exist.
    fn inode(&self, inode: Ino) -> Result<Option<InodeSnapshot>, Error>;

    /// List the entries of a directory in the order they should be written.
    fn children(&self, inode: Ino) -> Result<Vec<(Vec<u8>, Ino)>, Error>;
}

/// In-memory snapshot, mainly useful for tests and small trees.
#[derive(Debug, Default)]
pub struct MemSnapshot {
    inodes: HashMap<Ino, InodeSnapshot>,
    children: HashMap<Ino, Vec<(Vec<u8>, Ino)>>,
}

impl MemSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an inode.
    pub fn insert(&mut self, inode: InodeSnapshot) {
        self.inodes.insert(inode.inode, inode);
    }

    /// Add a directory entry. Entries are listed in insertion order.
    pub fn link(&mut self, parent: Ino, name: &[u8], inode: Ino) {
        self.children
            .entry(parent)
            .or_default()
            .push((name.to_vec(), inode));
    }
}

impl DumpSource for MemSnapshot {
    fn inode(&self, inode: Ino) -> Result<Option<InodeSnapshot>, Error> {
        Ok(self.inodes.get(&inode).cloned())
    }

    fn children(&self, inode: Ino) -> Result<Vec<(Vec<u8>, Ino)>, Error> {
        Ok(self.children.get(&inode).cloned().unwrap_or_default())
    }
}
