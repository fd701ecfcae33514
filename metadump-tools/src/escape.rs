//! Reversible escaping of raw byte strings into JSON-safe text.
//!
//! File names, symlink targets and xattr values are arbitrary byte sequences.
//! They are embedded into quoted JSON fields, so every byte that is a control
//! character, one of `%`, `"` or `\`, or part of an invalid UTF-8 sequence is
//! written as `%XX` (two uppercase hex digits). Everything else, including
//! complete multi-byte UTF-8 sequences, is kept as is. Text without any `%`
//! therefore decodes to itself, which keeps older dumps readable.

use std::borrow::Cow;

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

/// Returned by [`unescape_strict`] for a `%` not followed by two hex digits.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed escape sequence at offset {offset}")]
pub struct EscapeError {
    pub offset: usize,
}

fn is_reserved(b: u8) -> bool {
    b < 0x20 || b == b'%' || b == b'"' || b == b'\\'
}

fn push_escaped(out: &mut String, b: u8) {
    out.push('%');
    out.push(HEX_CHARS[(b >> 4) as usize] as char);
    out.push(HEX_CHARS[(b & 0xf) as usize] as char);
}

/// Escape a raw byte string.
///
/// Borrows the input if nothing has to be escaped.
pub fn escape(data: &[u8]) -> Cow<'_, str> {
    if let Ok(text) = std::str::from_utf8(data) {
        if !text.bytes().any(is_reserved) {
            return Cow::Borrowed(text);
        }
    }

    let mut out = String::with_capacity(data.len() * 2);
    for chunk in data.utf8_chunks() {
        for c in chunk.valid().chars() {
            if c.is_ascii() && is_reserved(c as u8) {
                push_escaped(&mut out, c as u8);
            } else {
                out.push(c);
            }
        }
        for b in chunk.invalid() {
            push_escaped(&mut out, *b);
        }
    }
    Cow::Owned(out)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn decode_at(data: &[u8], pos: usize) -> Option<u8> {
    let hi = hex_value(*data.get(pos + 1)?)?;
    let lo = hex_value(*data.get(pos + 2)?)?;
    Some((hi << 4) | lo)
}

fn unescape_with<F>(text: &str, mut malformed: F) -> Result<Cow<'_, [u8]>, EscapeError>
where
    F: FnMut(usize) -> Result<(), EscapeError>,
{
    if !text.contains('%') {
        return Ok(Cow::Borrowed(text.as_bytes()));
    }

    let data = text.as_bytes();
    let mut out = Vec::with_capacity(data.len());
    let mut pos = 0;
    while pos < data.len() {
        let c = data[pos];
        if c == b'%' {
            if let Some(b) = decode_at(data, pos) {
                out.push(b);
                pos += 3;
                continue;
            }
            malformed(pos)?;
        }
        out.push(c);
        pos += 1;
    }
    Ok(Cow::Owned(out))
}

/// Decode text produced by [`escape`].
///
/// A `%` which is not followed by two uppercase hex digits is kept literally.
pub fn unescape(text: &str) -> Cow<'_, [u8]> {
    match unescape_with(text, |_| Ok(())) {
        Ok(data) => data,
        // the callback never fails
        Err(_) => Cow::Borrowed(text.as_bytes()),
    }
}

/// Like [`unescape`], but fails on malformed escape sequences.
pub fn unescape_strict(text: &str) -> Result<Cow<'_, [u8]>, EscapeError> {
    unescape_with(text, |offset| Err(EscapeError { offset }))
}
