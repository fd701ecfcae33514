//! Export and import of filesystem metadata as JSON dump.
//!
//! # Dump format
//!
//! A dump is one JSON object. It starts with the filesystem settings, the
//! global counters, the list of sustained sessions and the list of files
//! waiting for deletion (see [`DumpHeader`]). Then follow the two inode trees,
//! `FSTree` starting at the root directory and `Trash` starting at the trash
//! directory. Every entry is an object keyed by its name, with the inode
//! attributes, an optional symlink target, xattrs, the data layout (chunks)
//! and, for directories, the nested `entries`.
//!
//! Names, symlink targets and xattr values are arbitrary bytes. They are
//! written with `%XX` escapes for control characters, `%`, `"`, `\` and
//! invalid UTF-8, so a dump stays valid JSON and reproduces the exact bytes
//! when loaded.
//!
//! # Dumping
//!
//! [`DumpWriter`] streams the document. The tree is written depth first while
//! walking a [`DumpSource`], so only the entry lists of the currently open
//! directories are kept in memory. The writer does not recompute anything,
//! attributes are written as the source provides them.
//!
//! # Loading
//!
//! A hard linked file appears in the dump once per link. The [`Collector`]
//! merges those occurrences into one [`CanonicalInode`] per inode:
//!
//! * regular files get one link per occurrence and collect one parent per
//!   occurrence; the attributes of the occurrence with the newest change time
//!   win (the first one on equal times)
//! * directories get `2 + number of subdirectories` links
//! * all other types must have exactly one link, and only regular files may
//!   occur more than once
//!
//! The resulting [`InodeTable`] is passed to a [`LoadBackend`].

pub mod attr;
pub mod backend;
pub mod collect;
pub mod dump;
pub mod progress;
pub mod snapshot;
pub mod writer;

mod error;
pub use error::DumpError;

pub use backend::{LoadBackend, MemBackend};
pub use collect::{CanonicalInode, CollectStats, Collector, InodeTable};
pub use dump::{dump_meta, load_meta, DumpOptions, LoadOptions};
pub use progress::{DumpProgress, NoProgress, ProgressSink};
pub use snapshot::{DumpSource, InodeSnapshot, MemSnapshot, Xattr};
pub use writer::DumpWriter;

pub use metadump_api_types::DumpHeader;

// Deep trees recurse once per directory level while dumping and loading.
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;
