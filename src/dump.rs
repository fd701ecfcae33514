//! Dump and load drivers.

use std::io::{BufReader, Read, Write};

use serde::Deserialize;

use metadump_api_types::{
    DumpHeader, DumpedCounters, DumpedMeta, Ino, ROOT_INODE, TRASH_INODE,
};

use crate::backend::LoadBackend;
use crate::collect::{CollectStats, Collector, InodeTable};
use crate::progress::ProgressSink;
use crate::snapshot::DumpSource;
use crate::writer::DumpWriter;
use crate::DumpError;

/// Options for writing a dump
#[derive(Clone, Debug, Default)]
pub struct DumpOptions {
    /// Export secret keys instead of replacing them
    pub keep_secret_key: bool,
    /// Do not export the trash tree
    pub skip_trash: bool,
}

/// Options for loading a dump
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Fail if the usage counters in the header do not match the tree
    pub strict_counters: bool,
    /// Fail on malformed `%` escapes in names, symlinks and xattr values
    pub strict_escapes: bool,
}

/// Write the metadata of `source` as JSON dump into `output`.
///
/// Returns the output after everything was flushed. On error, whatever was
/// written so far is not a valid dump.
pub fn dump_meta<W, S>(
    output: W,
    header: &DumpHeader,
    source: &S,
    options: &DumpOptions,
    progress: &mut dyn ProgressSink,
) -> Result<W, DumpError>
where
    W: Write,
    S: DumpSource + ?Sized,
{
    let mut header = header.clone();
    if !options.keep_secret_key {
        header.setting.remove_secret();
    }

    let mut writer = DumpWriter::new(output);
    writer.write_header(&header)?;

    if !dump_tree(&mut writer, source, "FSTree", ROOT_INODE, progress)? {
        return Err(DumpError::Structural(format!(
            "root inode {} not found",
            ROOT_INODE
        )));
    }
    if !options.skip_trash && !dump_tree(&mut writer, source, "Trash", TRASH_INODE, progress)? {
        log::debug!("no trash directory, skipping");
    }

    log::info!("dumped {} entries", writer.entries_written());

    writer.finish()
}

// Returns false if the tree root does not exist.
fn dump_tree<W, S>(
    writer: &mut DumpWriter<W>,
    source: &S,
    key: &str,
    root: Ino,
    progress: &mut dyn ProgressSink,
) -> Result<bool, DumpError>
where
    W: Write,
    S: DumpSource + ?Sized,
{
    let node = match source.inode(root)? {
        Some(node) => node,
        None => return Ok(false),
    };

    progress.increment(1, 1);
    writer.start_tree(key, &node)?;
    dump_directory(writer, source, root, progress)?;
    writer.end_directory()?;

    Ok(true)
}

fn dump_directory<W, S>(
    writer: &mut DumpWriter<W>,
    source: &S,
    dir: Ino,
    progress: &mut dyn ProgressSink,
) -> Result<(), DumpError>
where
    W: Write,
    S: DumpSource + ?Sized,
{
    let children = source.children(dir)?;
    progress.increment(children.len() as u64, 0);

    for (name, inode) in children {
        let node = source.inode(inode)?.ok_or_else(|| {
            DumpError::Structural(format!(
                "entry {:?} in directory {} references missing inode {}",
                String::from_utf8_lossy(&name),
                dir,
                inode
            ))
        })?;

        if node.attr.is_dir() {
            writer.start_directory(&name, &node)?;
            progress.increment(0, 1);
            stacker::maybe_grow(crate::STACK_RED_ZONE, crate::STACK_GROW_SIZE, || {
                dump_directory(&mut *writer, source, inode, &mut *progress)
            })?;
            writer.end_directory()?;
        } else {
            writer.add_entry(&name, &node)?;
            progress.increment(0, 1);
        }
    }

    Ok(())
}

/// Load a JSON dump from `input` and hand the result to `backend`.
pub fn load_meta<R, B>(
    input: R,
    backend: &mut B,
    options: &LoadOptions,
    progress: &mut dyn ProgressSink,
) -> Result<CollectStats, DumpError>
where
    R: Read,
    B: LoadBackend + ?Sized,
{
    let mut json = serde_json::Deserializer::from_reader(BufReader::new(input));
    json.disable_recursion_limit();
    let meta = DumpedMeta::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;

    let DumpedMeta {
        header,
        fs_tree,
        trash,
    } = meta;

    let fs_tree = fs_tree
        .ok_or_else(|| DumpError::Structural("dump contains no FSTree".to_string()))?;

    let mut collector = Collector::new(progress).strict_escapes(options.strict_escapes);
    collector.collect(fs_tree, ROOT_INODE)?;
    if let Some(trash) = trash {
        collector.collect(trash, ROOT_INODE)?;
    }
    let (table, stats) = collector.finish();

    if stats.skipped > 0 {
        log::warn!("skipped {} entries without attributes", stats.skipped);
    }
    check_counters(&header.counters, &table, options)?;

    log::info!("loaded {} inodes", table.len());
    backend.load(&header, table)?;

    Ok(stats)
}

fn check_counters(
    counters: &DumpedCounters,
    table: &InodeTable,
    options: &LoadOptions,
) -> Result<(), DumpError> {
    let usage = table.usage();
    if counters.used_inodes == usage.inodes && counters.used_space == usage.space {
        return Ok(());
    }

    let msg = format!(
        "usage counters do not match the tree - inodes {} (tree {}), space {} (tree {})",
        counters.used_inodes, usage.inodes, counters.used_space, usage.space
    );
    if options.strict_counters {
        return Err(DumpError::Structural(msg));
    }
    log::warn!("{}", msg);
    Ok(())
}
