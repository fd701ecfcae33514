//! Basic data types shared by the metadata dump and load code.

mod inode;
pub use inode::*;

mod dump;
pub use dump::*;

mod format;
pub use format::*;
