//! Flatten a loaded dump tree into an inode table.
//!
//! A dump stores one object per directory entry, so an inode with several
//! hard links shows up once per link. The [`Collector`] walks the tree depth
//! first and merges all occurrences into a single [`CanonicalInode`], fixing
//! up link counts and parent lists on the way.

use std::collections::hash_map::{self, HashMap};

use metadump_api_types::{
    is_tree_root, DumpedChunk, DumpedEntry, Ino, InodeAttr, InodeType, ROOT_INODE,
};
use metadump_tools::escape::{unescape, unescape_strict};

use crate::attr::load_attr;
use crate::progress::ProgressSink;
use crate::snapshot::Xattr;
use crate::DumpError;

/// The merged state of one inode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanonicalInode {
    pub inode: Ino,
    /// Name of the occurrence the attributes were taken from
    pub name: Vec<u8>,
    pub attr: InodeAttr,
    /// One parent per occurrence
    pub parents: Vec<Ino>,
    pub symlink: Vec<u8>,
    pub xattrs: Vec<Xattr>,
    pub chunks: Vec<DumpedChunk>,
    /// Directory entries, referencing the child inode
    pub entries: Vec<(Vec<u8>, Ino)>,
}

/// Space and inode usage computed from a table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    pub inodes: i64,
    pub space: i64,
}

fn align_4k(length: u64) -> i64 {
    if length == 0 {
        return 4096;
    }
    (((length - 1) >> 12) + 1) as i64 * 4096
}

/// All inodes of a loaded dump, keyed by inode number.
#[derive(Clone, Debug, Default)]
pub struct InodeTable {
    inodes: HashMap<Ino, CanonicalInode>,
}

impl InodeTable {
    pub fn get(&self, inode: Ino) -> Option<&CanonicalInode> {
        self.inodes.get(&inode)
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    pub fn iter(&self) -> hash_map::Values<'_, Ino, CanonicalInode> {
        self.inodes.values()
    }

    /// Used inodes and space, accounted like the metadata engine does.
    ///
    /// Tree roots are not counted. Files use their length rounded up to 4KiB
    /// (at least 4KiB), all other inodes 4KiB.
    pub fn usage(&self) -> Usage {
        let mut usage = Usage::default();
        for entry in self.inodes.values() {
            if is_tree_root(entry.inode) {
                continue;
            }
            usage.inodes += 1;
            usage.space += match entry.attr.typ {
                InodeType::File => align_4k(entry.attr.length),
                _ => 4096,
            };
        }
        usage
    }
}

impl IntoIterator for InodeTable {
    type Item = (Ino, CanonicalInode);
    type IntoIter = hash_map::IntoIter<Ino, CanonicalInode>;

    fn into_iter(self) -> Self::IntoIter {
        self.inodes.into_iter()
    }
}

/// Counters of a collect run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Entries merged into the table
    pub visited: u64,
    /// Entries ignored because they had no attributes
    pub skipped: u64,
}

struct Payload {
    symlink: Vec<u8>,
    xattrs: Vec<Xattr>,
    chunks: Vec<DumpedChunk>,
}

impl Payload {
    fn take(entry: &mut DumpedEntry, strict: bool) -> Result<Self, DumpError> {
        let xattrs = entry
            .xattrs
            .drain(..)
            .map(|xattr| {
                Ok(Xattr {
                    value: decode(&xattr.value, strict)?,
                    name: xattr.name,
                })
            })
            .collect::<Result<Vec<_>, DumpError>>()?;

        Ok(Self {
            symlink: decode(&entry.symlink, strict)?,
            xattrs,
            chunks: std::mem::take(&mut entry.chunks),
        })
    }
}

fn decode(text: &str, strict: bool) -> Result<Vec<u8>, DumpError> {
    if strict {
        Ok(unescape_strict(text)?.into_owned())
    } else {
        Ok(unescape(text).into_owned())
    }
}

/// Builds an [`InodeTable`] from dumped trees.
///
/// The collector owns its table, concurrent runs need their own instances.
pub struct Collector<'a> {
    table: InodeTable,
    stats: CollectStats,
    strict_escapes: bool,
    progress: &'a mut dyn ProgressSink,
}

impl<'a> Collector<'a> {
    pub fn new(progress: &'a mut dyn ProgressSink) -> Self {
        Self {
            table: InodeTable::default(),
            stats: CollectStats::default(),
            strict_escapes: false,
            progress,
        }
    }

    /// Fail on malformed `%` escapes instead of keeping them literally.
    pub fn strict_escapes(mut self, strict: bool) -> Self {
        self.strict_escapes = strict;
        self
    }

    /// Merge a tree into the table.
    ///
    /// `parent` is used as parent of the tree's root unless the root is the
    /// root or trash directory, which are always their own parent.
    pub fn collect(&mut self, mut root: DumpedEntry, parent: Ino) -> Result<(), DumpError> {
        root.parents = vec![parent];
        stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW_SIZE, || {
            self.collect_entry(root)
        })
    }

    pub fn stats(&self) -> CollectStats {
        self.stats
    }

    pub fn finish(self) -> (InodeTable, CollectStats) {
        (self.table, self.stats)
    }

    fn collect_entry(&mut self, mut entry: DumpedEntry) -> Result<(), DumpError> {
        let dumped = entry.attr.take().ok_or_else(|| {
            DumpError::Structural(format!(
                "missing attributes for entry {:?}",
                String::from_utf8_lossy(&entry.name)
            ))
        })?;
        let inode = dumped.inode;
        let strict = self.strict_escapes;
        let mut attr = load_attr(&dumped)?;
        if attr.is_file() {
            attr.length = dumped.length.unwrap_or(0);
        }
        if attr.is_dir() && is_tree_root(inode) {
            entry.parents = vec![ROOT_INODE];
        }
        attr.parent = entry.parents.first().copied().unwrap_or(ROOT_INODE);

        let children = if attr.is_dir() {
            entry.entries.len() as u64
        } else {
            0
        };
        self.progress.increment(children, 1);
        self.stats.visited += 1;

        if let Some(existing) = self.table.inodes.get_mut(&inode) {
            if !attr.is_file() || !existing.attr.is_file() {
                return Err(DumpError::Conflict(inode));
            }
            log::debug!("merging hard link of inode {}", inode);

            existing.attr.nlink += 1;
            existing.attr.parent = 0;
            existing.parents.append(&mut entry.parents);
            if existing.attr.ctime_ns() < attr.ctime_ns() {
                let payload = Payload::take(&mut entry, strict)?;
                attr.nlink = existing.attr.nlink;
                attr.parent = 0;
                existing.attr = attr;
                existing.name = entry.name;
                existing.symlink = payload.symlink;
                existing.xattrs = payload.xattrs;
                existing.chunks = payload.chunks;
            }
            return Ok(());
        }

        match attr.typ {
            InodeType::File => attr.nlink = 1,
            InodeType::Directory => attr.nlink = 2,
            typ if attr.nlink != 1 => {
                return Err(DumpError::Structural(format!(
                    "invalid nlink {} for inode {} type {}",
                    attr.nlink, inode, typ
                )));
            }
            _ => (),
        }

        let payload = Payload::take(&mut entry, strict)?;
        let is_dir = attr.is_dir();
        let mut nlink = attr.nlink;
        self.table.inodes.insert(
            inode,
            CanonicalInode {
                inode,
                name: std::mem::take(&mut entry.name),
                attr,
                parents: std::mem::take(&mut entry.parents),
                symlink: payload.symlink,
                xattrs: payload.xattrs,
                chunks: payload.chunks,
                entries: Vec::new(),
            },
        );

        if !is_dir {
            return Ok(());
        }

        let mut dir_entries = Vec::with_capacity(entry.entries.len());
        for (key, mut child) in std::mem::take(&mut entry.entries) {
            let name = decode(&key, strict)?;
            let child_attr = match &child.attr {
                Some(child_attr) => child_attr,
                None => {
                    log::warn!("ignore empty entry: {}/{}", inode, key);
                    self.stats.skipped += 1;
                    self.progress.increment(0, 1);
                    continue;
                }
            };
            if child_attr.typ == InodeType::Directory.as_str() {
                nlink += 1;
            }
            dir_entries.push((name.clone(), child_attr.inode));

            child.name = name;
            child.parents = vec![inode];
            stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW_SIZE, || {
                self.collect_entry(child)
            })?;
        }

        if let Some(dir) = self.table.inodes.get_mut(&inode) {
            dir.attr.nlink = nlink;
            dir.entries = dir_entries;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use metadump_api_types::{DumpedAttr, DumpedXattr, TRASH_INODE};

    use crate::progress::NoProgress;

    fn attr(inode: Ino, typ: InodeType, ctime: i64) -> DumpedAttr {
        DumpedAttr {
            inode,
            typ: typ.to_string(),
            mode: 0o644,
            ctime,
            nlink: 7,
            length: (typ == InodeType::File).then_some(10),
            ..Default::default()
        }
    }

    fn file(inode: Ino, ctime: i64) -> DumpedEntry {
        DumpedEntry {
            attr: Some(attr(inode, InodeType::File, ctime)),
            ..Default::default()
        }
    }

    fn dir(inode: Ino, entries: Vec<(&str, DumpedEntry)>) -> DumpedEntry {
        DumpedEntry {
            attr: Some(attr(inode, InodeType::Directory, 1)),
            entries: entries
                .into_iter()
                .map(|(name, entry)| (name.to_string(), entry))
                .collect(),
            ..Default::default()
        }
    }

    fn collect(root: DumpedEntry) -> Result<(InodeTable, CollectStats), DumpError> {
        let mut progress = NoProgress;
        let mut collector = Collector::new(&mut progress);
        collector.collect(root, ROOT_INODE)?;
        Ok(collector.finish())
    }

    #[test]
    fn test_directory_nlink() {
        let root = dir(
            ROOT_INODE,
            vec![
                ("a", dir(2, vec![("b", dir(3, vec![])), ("f", file(4, 1))])),
                ("c", dir(5, vec![])),
                ("g", file(6, 1)),
            ],
        );
        let (table, stats) = collect(root).unwrap();
        assert_eq!(stats.visited, 6);
        assert_eq!(table.len(), 6);
        assert_eq!(table.get(ROOT_INODE).unwrap().attr.nlink, 4);
        assert_eq!(table.get(2).unwrap().attr.nlink, 3);
        assert_eq!(table.get(3).unwrap().attr.nlink, 2);
        assert_eq!(table.get(4).unwrap().attr.nlink, 1);
        assert_eq!(table.get(4).unwrap().attr.length, 10);
        assert_eq!(table.get(ROOT_INODE).unwrap().parents, vec![ROOT_INODE]);
        assert_eq!(table.get(3).unwrap().parents, vec![2]);
        assert_eq!(
            table.get(2).unwrap().entries,
            vec![(b"b".to_vec(), 3), (b"f".to_vec(), 4)]
        );
    }

    #[test]
    fn test_hardlink_merge() {
        let mut old = file(5, 100);
        old.attr.as_mut().unwrap().length = Some(1);
        let mut new = file(5, 200);
        new.attr.as_mut().unwrap().length = Some(2);
        let mut same_time = file(5, 200);
        same_time.attr.as_mut().unwrap().length = Some(3);

        let root = dir(
            ROOT_INODE,
            vec![
                ("d1", dir(2, vec![("x", old)])),
                ("d2", dir(3, vec![("y", new)])),
                ("d3", dir(4, vec![("z", same_time)])),
            ],
        );
        let (table, _) = collect(root).unwrap();
        let merged = table.get(5).unwrap();
        assert_eq!(merged.attr.nlink, 3);
        assert_eq!(merged.parents, vec![2, 3, 4]);
        assert_eq!(merged.attr.ctime, 200);
        // equal ctime keeps the first one
        assert_eq!(merged.attr.length, 2);
        assert_eq!(merged.name, b"y");
        assert_eq!(merged.attr.parent, 0);
    }

    #[test]
    fn test_conflicts() {
        let link = || DumpedEntry {
            attr: Some(DumpedAttr {
                nlink: 1,
                ..attr(7, InodeType::Symlink, 1)
            }),
            symlink: "target".to_string(),
            ..Default::default()
        };
        let root = dir(
            ROOT_INODE,
            vec![("a", dir(2, vec![("l", link())])), ("l", link())],
        );
        assert!(matches!(collect(root), Err(DumpError::Conflict(7))));

        let root = dir(ROOT_INODE, vec![("a", dir(2, vec![])), ("b", dir(2, vec![]))]);
        assert!(matches!(collect(root), Err(DumpError::Conflict(2))));

        let root = dir(ROOT_INODE, vec![("a", dir(2, vec![])), ("b", file(2, 1))]);
        assert!(matches!(collect(root), Err(DumpError::Conflict(2))));
    }

    #[test]
    fn test_special_file_nlink() {
        let fifo = DumpedEntry {
            attr: Some(attr(8, InodeType::Fifo, 1)),
            ..Default::default()
        };
        let root = dir(ROOT_INODE, vec![("p", fifo)]);
        match collect(root) {
            Err(DumpError::Structural(msg)) => assert!(msg.contains("inode 8"), "{}", msg),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_skip_entry_without_attr() {
        let root = dir(
            ROOT_INODE,
            vec![
                ("", DumpedEntry::default()),
                ("d", dir(2, vec![])),
                ("f", file(3, 1)),
            ],
        );
        let mut calls = Vec::new();
        let mut progress = |total: u64, done: u64| calls.push((total, done));
        let mut collector = Collector::new(&mut progress);
        collector.collect(root, ROOT_INODE).unwrap();
        let (table, stats) = collector.finish();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.visited, 3);
        assert_eq!(table.get(ROOT_INODE).unwrap().attr.nlink, 3);
        assert_eq!(table.get(ROOT_INODE).unwrap().entries.len(), 2);
        let total: u64 = calls.iter().map(|(total, _)| total).sum();
        let done: u64 = calls.iter().map(|(_, done)| done).sum();
        assert_eq!(calls[0], (3, 1));
        assert_eq!(total, 3);
        assert_eq!(done, 4);
    }

    #[test]
    fn test_missing_root_attr() {
        assert!(matches!(
            collect(DumpedEntry::default()),
            Err(DumpError::Structural(_))
        ));
    }

    #[test]
    fn test_escaped_payload() {
        let mut link = DumpedEntry {
            attr: Some(DumpedAttr {
                nlink: 1,
                ..attr(9, InodeType::Symlink, 1)
            }),
            symlink: "a%0Ab%ZZ".to_string(),
            ..Default::default()
        };
        link.xattrs.push(DumpedXattr {
            name: "user.x".to_string(),
            value: "%FF%00".to_string(),
        });
        let root = dir(ROOT_INODE, vec![("n%25", link)]);
        let (table, _) = collect(root).unwrap();
        let link = table.get(9).unwrap();
        assert_eq!(link.name, b"n%");
        assert_eq!(link.symlink, b"a\nb%ZZ");
        assert_eq!(link.xattrs[0].value, b"\xff\x00");
        assert_eq!(table.get(ROOT_INODE).unwrap().entries[0].0, b"n%");
    }

    #[test]
    fn test_strict_escapes() {
        let link = || DumpedEntry {
            attr: Some(DumpedAttr {
                nlink: 1,
                ..attr(9, InodeType::Symlink, 1)
            }),
            symlink: "target%G0".to_string(),
            ..Default::default()
        };

        assert!(collect(dir(ROOT_INODE, vec![("l", link())])).is_ok());

        let mut progress = NoProgress;
        let mut collector = Collector::new(&mut progress).strict_escapes(true);
        match collector.collect(dir(ROOT_INODE, vec![("l", link())]), ROOT_INODE) {
            Err(DumpError::Encoding(err)) => assert_eq!(err.offset, 6),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_trash_root_parent() {
        let mut collector_progress = NoProgress;
        let mut collector = Collector::new(&mut collector_progress);
        collector
            .collect(dir(ROOT_INODE, vec![("f", file(2, 1))]), ROOT_INODE)
            .unwrap();
        collector
            .collect(dir(TRASH_INODE, vec![("1-2-f", file(3, 1))]), 42)
            .unwrap();
        let (table, _) = collector.finish();
        assert_eq!(table.get(TRASH_INODE).unwrap().parents, vec![ROOT_INODE]);
        assert_eq!(table.get(3).unwrap().parents, vec![TRASH_INODE]);

        let usage = table.usage();
        assert_eq!(usage.inodes, 2);
        assert_eq!(usage.space, 2 * 4096);
    }

    #[test]
    fn test_align_4k() {
        assert_eq!(align_4k(0), 4096);
        assert_eq!(align_4k(1), 4096);
        assert_eq!(align_4k(4096), 4096);
        assert_eq!(align_4k(4097), 8192);
    }
}
