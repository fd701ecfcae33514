//! Destination of loaded metadata.

use anyhow::Error;

use metadump_api_types::DumpHeader;

use crate::collect::InodeTable;

/// Storage engine which receives a loaded dump.
///
/// Implementations must commit the table and the header counters durably,
/// or fail as a whole.
pub trait LoadBackend {
    fn load(&mut self, header: &DumpHeader, table: InodeTable) -> Result<(), Error>;
}

/// Keeps the loaded metadata in memory.
#[derive(Debug, Default)]
pub struct MemBackend {
    pub header: Option<DumpHeader>,
    pub table: InodeTable,
}

impl LoadBackend for MemBackend {
    fn load(&mut self, header: &DumpHeader, table: InodeTable) -> Result<(), Error> {
        if self.header.is_some() {
            anyhow::bail!("metadata already loaded");
        }
        self.header = Some(header.clone());
        self.table = table;
        Ok(())
    }
}
