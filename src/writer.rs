//! Streaming JSON dump writer.
//!
//! The header is written first as pretty printed JSON with its closing brace
//! removed. The inode trees are then streamed into the still open object, one
//! entry at a time. Only the stack of currently open directories is kept in
//! memory.

use std::io::{BufWriter, Write};

use serde::Serialize;

use metadump_api_types::{DumpHeader, DumpedXattr};
use metadump_tools::escape::escape;
use metadump_tools::json::{to_open_object, write_newline};

use crate::attr::dump_attr;
use crate::snapshot::InodeSnapshot;
use crate::DumpError;

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Created,
    Open,
}

struct OpenDir {
    has_entries: bool,
}

/// Writes a dump document in a single pass.
///
/// Call [`write_header`](Self::write_header) first, then any number of trees
/// using [`start_tree`](Self::start_tree), [`start_directory`](Self::start_directory),
/// [`add_entry`](Self::add_entry) and [`end_directory`](Self::end_directory),
/// and finally [`finish`](Self::finish).
///
/// Errors leave partially written output behind, which must be discarded.
pub struct DumpWriter<W: Write> {
    writer: BufWriter<W>,
    phase: Phase,
    dirstack: Vec<OpenDir>,
    entries: u64,
}

impl<W: Write> DumpWriter<W> {
    /// Create a new DumpWriter instance
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, writer),
            phase: Phase::Created,
            dirstack: Vec::new(),
            entries: 0,
        }
    }

    /// Number of tree entries written so far.
    pub fn entries_written(&self) -> u64 {
        self.entries
    }

    /// Write counters, settings and the session/deletion lists.
    pub fn write_header(&mut self, header: &DumpHeader) -> Result<(), DumpError> {
        if self.phase != Phase::Created {
            return Err(DumpError::Structural(
                "dump header already written".to_string(),
            ));
        }

        let mut header = header.clone();
        header.counters.next_cleanup_slices = 0;

        let data = to_open_object(&header).map_err(|err| {
            DumpError::Structural(format!("unable to write dump header - {}", err))
        })?;
        self.writer.write_all(&data)?;
        self.phase = Phase::Open;

        Ok(())
    }

    /// Open a top level tree (`FSTree` or `Trash`) with its root directory.
    pub fn start_tree(&mut self, key: &str, root: &InodeSnapshot) -> Result<(), DumpError> {
        if self.phase != Phase::Open {
            return Err(DumpError::Structural(
                "got tree content before dump header".to_string(),
            ));
        }
        if !self.dirstack.is_empty() {
            return Err(DumpError::Structural(format!(
                "unable to start tree '{}' inside another tree",
                key
            )));
        }
        if !root.attr.is_dir() {
            return Err(DumpError::Structural(format!(
                "root {} of tree '{}' is not a directory",
                root.inode, key
            )));
        }

        // the header always has members
        self.writer.write_all(b",")?;
        self.write_entry(1, key.as_bytes(), root, true)?;
        self.dirstack.push(OpenDir { has_entries: false });

        Ok(())
    }

    /// Open a directory inside the current directory.
    pub fn start_directory(&mut self, name: &[u8], dir: &InodeSnapshot) -> Result<(), DumpError> {
        if !dir.attr.is_dir() {
            return Err(DumpError::Structural(format!(
                "inode {} is not a directory",
                dir.inode
            )));
        }
        let depth = self.next_entry()?;
        self.write_entry(depth, name, dir, true)?;
        self.dirstack.push(OpenDir { has_entries: false });
        Ok(())
    }

    /// Add a non-directory entry to the current directory.
    pub fn add_entry(&mut self, name: &[u8], entry: &InodeSnapshot) -> Result<(), DumpError> {
        if entry.attr.is_dir() {
            return Err(DumpError::Structural(format!(
                "directory {} added as plain entry",
                entry.inode
            )));
        }
        let depth = self.next_entry()?;
        self.write_entry(depth, name, entry, false)
    }

    /// Close the current directory, or the tree if it is the tree root.
    pub fn end_directory(&mut self) -> Result<(), DumpError> {
        if self.dirstack.pop().is_none() {
            return Err(DumpError::Structural(
                "got unexpected end_directory level 0".to_string(),
            ));
        }
        let depth = self.depth();
        write_newline(&mut self.writer, depth + 1)?;
        self.writer.write_all(b"}")?;
        write_newline(&mut self.writer, depth)?;
        self.writer.write_all(b"}")?;
        Ok(())
    }

    /// Close the document and flush all data.
    pub fn finish(mut self) -> Result<W, DumpError> {
        if self.phase != Phase::Open {
            return Err(DumpError::Structural(
                "unable to finish dump without header".to_string(),
            ));
        }
        if !self.dirstack.is_empty() {
            return Err(DumpError::Structural(format!(
                "unable to finish dump at level {}",
                self.dirstack.len()
            )));
        }

        self.writer.write_all(b"\n}\n")?;
        self.writer.flush()?;
        let writer = self.writer.into_inner().map_err(|err| err.into_error())?;

        Ok(writer)
    }

    // Entries of directory N are nested two levels deeper than the directory
    // itself (name, then "entries").
    fn depth(&self) -> usize {
        1 + 2 * self.dirstack.len()
    }

    // Write the separator for a new entry of the current directory and
    // return the entry's depth.
    fn next_entry(&mut self) -> Result<usize, DumpError> {
        let dir = self
            .dirstack
            .last_mut()
            .ok_or_else(|| DumpError::Structural("entry outside of a tree".to_string()))?;
        let has_entries = std::mem::replace(&mut dir.has_entries, true);
        if has_entries {
            self.writer.write_all(b",")?;
        }
        Ok(self.depth())
    }

    fn write_entry(
        &mut self,
        depth: usize,
        name: &[u8],
        entry: &InodeSnapshot,
        open_entries: bool,
    ) -> Result<(), DumpError> {
        let field_depth = depth + 1;

        write_newline(&mut self.writer, depth)?;
        write!(self.writer, "\"{}\": {{", escape(name))?;

        write_newline(&mut self.writer, field_depth)?;
        self.writer.write_all(b"\"attr\": ")?;
        self.write_compact(&dump_attr(entry.inode, &entry.attr))?;

        if !entry.symlink.is_empty() {
            self.writer.write_all(b",")?;
            write_newline(&mut self.writer, field_depth)?;
            write!(self.writer, "\"symlink\": \"{}\"", escape(&entry.symlink))?;
        }

        if !entry.xattrs.is_empty() {
            let xattrs: Vec<DumpedXattr> = entry
                .xattrs
                .iter()
                .map(|xattr| DumpedXattr {
                    name: xattr.name.clone(),
                    value: escape(&xattr.value).into_owned(),
                })
                .collect();
            self.writer.write_all(b",")?;
            write_newline(&mut self.writer, field_depth)?;
            self.writer.write_all(b"\"xattrs\": ")?;
            self.write_compact(&xattrs)?;
        }

        self.entries += 1;

        if open_entries {
            self.writer.write_all(b",")?;
            write_newline(&mut self.writer, field_depth)?;
            self.writer.write_all(b"\"entries\": {")?;
            return Ok(());
        }

        match entry.chunks.len() {
            0 => (),
            1 => {
                self.writer.write_all(b",")?;
                write_newline(&mut self.writer, field_depth)?;
                self.writer.write_all(b"\"chunks\": ")?;
                self.write_compact(&entry.chunks)?;
            }
            count => {
                self.writer.write_all(b",")?;
                write_newline(&mut self.writer, field_depth)?;
                self.writer.write_all(b"\"chunks\": [")?;
                for (i, chunk) in entry.chunks.iter().enumerate() {
                    write_newline(&mut self.writer, field_depth + 1)?;
                    self.write_compact(chunk)?;
                    if i + 1 != count {
                        self.writer.write_all(b",")?;
                    }
                }
                write_newline(&mut self.writer, field_depth)?;
                self.writer.write_all(b"]")?;
            }
        }

        write_newline(&mut self.writer, depth)?;
        self.writer.write_all(b"}")?;

        Ok(())
    }

    fn write_compact<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), DumpError> {
        let data = serde_json::to_vec(value)?;
        self.writer.write_all(&data)?;
        Ok(())
    }
}
