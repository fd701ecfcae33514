use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error};

/// Inode number.
pub type Ino = u64;

/// The root directory inode.
pub const ROOT_INODE: Ino = 1;

/// The root of the trash directory tree.
pub const TRASH_INODE: Ino = 0x7FFF_FFFF_1000_0000;

/// Check if an inode is one of the top level tree roots (root or trash).
pub fn is_tree_root(inode: Ino) -> bool {
    inode == ROOT_INODE || inode == TRASH_INODE
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum InodeType {
    #[default]
    File,
    Directory,
    Symlink,
    Fifo,
    BlockDev,
    CharDev,
    Socket,
}

impl InodeType {
    /// Name used in dump files.
    pub fn as_str(&self) -> &'static str {
        match self {
            InodeType::File => "regular",
            InodeType::Directory => "directory",
            InodeType::Symlink => "symlink",
            InodeType::Fifo => "fifo",
            InodeType::BlockDev => "blockdev",
            InodeType::CharDev => "chardev",
            InodeType::Socket => "socket",
        }
    }
}

impl FromStr for InodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(match s {
            "regular" => InodeType::File,
            "directory" => InodeType::Directory,
            "symlink" => InodeType::Symlink,
            "fifo" => InodeType::Fifo,
            "blockdev" => InodeType::BlockDev,
            "chardev" => InodeType::CharDev,
            "socket" => InodeType::Socket,
            _ => bail!("invalid inode type '{}'", s),
        })
    }
}

impl fmt::Display for InodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inode attributes as kept by the metadata engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InodeAttr {
    pub typ: InodeType,
    /// Permission bits
    pub mode: u16,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub atimensec: u32,
    pub mtimensec: u32,
    pub ctimensec: u32,
    pub nlink: u32,
    /// Only meaningful for regular files
    pub length: u64,
    /// Only meaningful for device nodes
    pub rdev: u32,
    pub parent: Ino,
    /// Set if all fields were loaded from a complete record
    pub full: bool,
}

impl InodeAttr {
    /// Change time in nanoseconds.
    pub fn ctime_ns(&self) -> i128 {
        self.ctime as i128 * 1_000_000_000 + self.ctimensec as i128
    }

    pub fn is_file(&self) -> bool {
        self.typ == InodeType::File
    }

    pub fn is_dir(&self) -> bool {
        self.typ == InodeType::Directory
    }
}

#[test]
fn test_inode_type_names() {
    let all = [
        InodeType::File,
        InodeType::Directory,
        InodeType::Symlink,
        InodeType::Fifo,
        InodeType::BlockDev,
        InodeType::CharDev,
        InodeType::Socket,
    ];
    for typ in all {
        assert_eq!(typ.to_string().parse::<InodeType>().unwrap(), typ);
    }
    assert_eq!("regular".parse::<InodeType>().unwrap(), InodeType::File);
    assert!("link".parse::<InodeType>().is_err());
}

#[test]
fn test_ctime_ns() {
    let attr = InodeAttr {
        ctime: 2,
        ctimensec: 5,
        ..Default::default()
    };
    assert_eq!(attr.ctime_ns(), 2_000_000_005);
    let before = InodeAttr {
        ctime: 1,
        ctimensec: 999_999_999,
        ..Default::default()
    };
    assert!(before.ctime_ns() < attr.ctime_ns());
}
