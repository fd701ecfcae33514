//! Conversion between inode attributes and their dumped form.

use metadump_api_types::{DumpedAttr, Ino, InodeAttr, InodeType};

use crate::DumpError;

/// Convert attributes into the dump format.
///
/// The length is only kept for regular files.
pub fn dump_attr(inode: Ino, attr: &InodeAttr) -> DumpedAttr {
    DumpedAttr {
        inode,
        typ: attr.typ.to_string(),
        mode: attr.mode,
        uid: attr.uid,
        gid: attr.gid,
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        atimensec: attr.atimensec,
        mtimensec: attr.mtimensec,
        ctimensec: attr.ctimensec,
        nlink: attr.nlink,
        length: attr.is_file().then_some(attr.length),
        rdev: attr.rdev,
    }
}

/// Convert dumped attributes back.
///
/// `length` and `parent` are not set, the caller knows them from context.
pub fn load_attr(dumped: &DumpedAttr) -> Result<InodeAttr, DumpError> {
    let typ: InodeType = dumped
        .typ
        .parse()
        .map_err(|err| DumpError::Decode(format!("inode {} - {}", dumped.inode, err)))?;

    Ok(InodeAttr {
        typ,
        mode: dumped.mode,
        uid: dumped.uid,
        gid: dumped.gid,
        atime: dumped.atime,
        mtime: dumped.mtime,
        ctime: dumped.ctime,
        atimensec: dumped.atimensec,
        mtimensec: dumped.mtimensec,
        ctimensec: dumped.ctimensec,
        nlink: dumped.nlink,
        length: 0,
        rdev: dumped.rdev,
        parent: 0,
        full: true,
    })
}
