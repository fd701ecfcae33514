use std::io::Write;

use anyhow::{bail, Error};
use serde::Serialize;

/// Indentation unit used for pretty printed dumps.
pub const JSON_INDENT: &[u8] = b"  ";

/// Render `value` as pretty printed JSON object, but leave the object open.
///
/// The closing `\n}` is stripped, so that more members can be streamed into
/// the same object afterwards.
pub fn to_open_object<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    let mut data = serde_json::to_vec_pretty(value)?;
    if !data.starts_with(b"{") || !data.ends_with(b"\n}") {
        bail!("value does not render as a non-empty JSON object");
    }
    data.truncate(data.len() - 2);
    Ok(data)
}

/// Write a line break followed by `depth` indentation units.
pub fn write_newline<W: Write>(writer: &mut W, depth: usize) -> Result<(), std::io::Error> {
    writer.write_all(b"\n")?;
    for _ in 0..depth {
        writer.write_all(JSON_INDENT)?;
    }
    Ok(())
}
