//! The `header` module locates the end of the VBF text header and extracts the
//! recognized metadata fields from it.
//!
//! Header-end detection counts `{` and `}` from the start of the file and stops at the
//! first position where both counts are equal and non-zero. The count is quote-blind:
//! a brace inside a quoted string (e.g. in `description`) is counted like any other,
//! so a description holding an unbalanced brace moves or hides the header end.
//!
//! Field extraction is a small scanner over the header bytes that collects every
//! `name = value ;` assignment. Unlike the brace count it is quote-aware, so `;` and
//! `=` inside strings do not split a value. Comments are skipped between
//! assignments and removed from inside values.

use crate::error::VbfError;
use log::debug;
use std::borrow::Cow;

/// Returns the index of the `}` that closes the first balanced brace group.
///
/// # Errors
/// Returns [`VbfError::UnterminatedHeader`] if the buffer ends before the braces balance.
pub fn find_header_end(bytes: &[u8]) -> Result<usize, VbfError> {
    let mut open_count: usize = 0;
    let mut close_count: usize = 0;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => open_count += 1,
            b'}' => close_count += 1,
            _ => continue,
        }
        if open_count > 0 && open_count == close_count {
            return Ok(i);
        }
    }
    Err(VbfError::UnterminatedHeader)
}

/// One `name = value;` pair of the header. `value` is trimmed, excludes the `;` and
/// holds no comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Assignment<'a> {
    pub(crate) name: &'a [u8],
    pub(crate) value: Cow<'a, [u8]>,
}

const fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Index right after the closing quote of the string opening at `start`.
fn skip_quoted(h: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < h.len() {
        match h[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    h.len()
}

/// Index of the `;` terminating a value that starts at `start` (or `h.len()`).
fn find_value_end(h: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < h.len() {
        match h[i] {
            b'"' => i = skip_quoted(h, i),
            b'/' => i = skip_comment(h, i).unwrap_or(i + 1),
            b';' => return i,
            _ => i += 1,
        }
    }
    h.len()
}

/// Replaces every comment outside of strings by a single space.
fn strip_comments(value: &[u8]) -> Cow<'_, [u8]> {
    let mut stripped: Option<Vec<u8>> = None;
    let mut copied = 0;
    let mut i = 0;

    while i < value.len() {
        match value[i] {
            b'"' => i = skip_quoted(value, i),
            b'/' => match skip_comment(value, i) {
                Some(next) => {
                    let buf = stripped.get_or_insert_with(Vec::new);
                    buf.extend_from_slice(&value[copied..i]);
                    buf.push(b' ');
                    i = next;
                    copied = next;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    match stripped {
        None => Cow::Borrowed(value),
        Some(mut buf) => {
            buf.extend_from_slice(value.get(copied..).unwrap_or_default());
            Cow::Owned(buf.trim_ascii().to_vec())
        }
    }
}

/// Index right after the comment starting at `start`, if one starts there.
fn skip_comment(h: &[u8], start: usize) -> Option<usize> {
    match h.get(start + 1).copied() {
        Some(b'/') => Some(
            h[start..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(h.len(), |p| start + p + 1),
        ),
        Some(b'*') => Some(
            h[start + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(h.len(), |p| start + 2 + p + 2),
        ),
        _ => None,
    }
}

/// Collects all assignments of the header in source order.
pub(crate) fn scan_assignments(h: &[u8]) -> Vec<Assignment<'_>> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < h.len() {
        let b = h[i];
        if b == b'"' {
            i = skip_quoted(h, i);
        } else if b == b'/' {
            i = skip_comment(h, i).unwrap_or(i + 1);
        } else if is_word_byte(b) {
            let start = i;
            while i < h.len() && is_word_byte(h[i]) {
                i += 1;
            }
            // Numbers never name a field
            if b.is_ascii_digit() {
                continue;
            }
            let name = &h[start..i];

            let mut j = i;
            while j < h.len() && h[j].is_ascii_whitespace() {
                j += 1;
            }
            if h.get(j) == Some(&b'=') {
                let value_end = find_value_end(h, j + 1);
                out.push(Assignment {
                    name,
                    value: strip_comments(h[j + 1..value_end].trim_ascii()),
                });
                i = value_end.saturating_add(1);
            }
        } else {
            i += 1;
        }
    }
    out
}

/// Address pair of one entry of the `erase` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseRange {
    pub start: u32,
    pub end: u32,
}

/// Metadata fields of a VBF header. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VbfMetadata {
    /// `vbf_version`
    pub version: Option<String>,
    /// `description`, multiple strings joined with `\n`
    pub description: Option<String>,
    /// `sw_part_number`
    pub sw_part_number: Option<String>,
    /// `sw_part_type`
    pub sw_part_type: Option<String>,
    /// `network`
    pub network: Option<String>,
    /// `data_format_identifier`
    pub data_format_identifier: Option<u32>,
    /// `ecu_address`
    pub ecu_address: Option<u32>,
    /// `verification_block_start`
    pub verification_block_start: Option<u32>,
    /// `frame_format`
    pub frame_format: Option<String>,
    /// `file_checksum`
    pub file_checksum: Option<u32>,
    /// `erase`
    pub erase: Option<Vec<EraseRange>>,
}

impl VbfMetadata {
    /// Extracts the recognized fields from the header text. Each field is looked up
    /// independently; the first assignment of a name wins. Missing or unparsable
    /// fields stay `None`.
    #[must_use]
    pub fn from_header(header: &[u8]) -> Self {
        let assignments = scan_assignments(header);
        debug!("Header holds {} assignment(s)", assignments.len());

        let lookup = |name: &str| -> Option<String> {
            assignments
                .iter()
                .find(|a| a.name == name.as_bytes())
                .map(|a| String::from_utf8_lossy(&a.value).into_owned())
        };

        Self {
            version: lookup("vbf_version").map(|v| unquote(&v)),
            description: lookup("description").map(|v| parse_description(&v)),
            sw_part_number: lookup("sw_part_number").map(|v| unquote(&v)),
            sw_part_type: lookup("sw_part_type").map(|v| unquote(&v)),
            network: lookup("network").map(|v| unquote(&v)),
            data_format_identifier: lookup("data_format_identifier")
                .and_then(|v| parse_hex_value(&v)),
            ecu_address: lookup("ecu_address").and_then(|v| parse_hex_value(&v)),
            verification_block_start: lookup("verification_block_start")
                .and_then(|v| parse_hex_value(&v)),
            frame_format: lookup("frame_format").map(|v| unquote(&v)),
            file_checksum: lookup("file_checksum").and_then(|v| parse_hex_value(&v)),
            erase: lookup("erase").and_then(|v| parse_erase(&v)),
        }
    }
}

/// Resolves the `\"` and `\\` escapes of a string body.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('"' | '\\')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn unquote(value: &str) -> String {
    let v = value.trim();
    match v.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(body) => unescape(body),
        None => v.to_string(),
    }
}

/// `"text"` or `{"line 1", "line 2"}`
fn parse_description(value: &str) -> String {
    let v = value.trim();
    let Some(inner) = v.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
        return unquote(v);
    };

    let bytes = inner.as_bytes();
    let mut lines = Vec::new();
    let mut i = 0;
    while let Some(open) = bytes[i..].iter().position(|&b| b == b'"') {
        let start = i + open;
        let end = skip_quoted(bytes, start);
        if end > bytes.len() || end < start + 2 || bytes[end - 1] != b'"' {
            break;
        }
        lines.push(unescape(&inner[start + 1..end - 1]));
        i = end;
    }

    if lines.is_empty() {
        inner.trim().to_string()
    } else {
        lines.join("\n")
    }
}

/// Parse a hex number with optional quotes and optional `0x` prefix.
fn parse_hex_value(value: &str) -> Option<u32> {
    let v = unquote(value);
    let v = v.trim();
    let digits = v
        .strip_prefix("0x")
        .or_else(|| v.strip_prefix("0X"))
        .unwrap_or(v);
    u32::from_str_radix(digits, 16).ok()
}

/// `{ { 0xS, 0xE }, { 0xS, 0xE } }`
fn parse_erase(value: &str) -> Option<Vec<EraseRange>> {
    let inner = value.trim().strip_prefix('{')?.strip_suffix('}')?;

    let mut ranges = Vec::new();
    let mut rest = inner.trim();
    while !rest.is_empty() {
        let group = rest.strip_prefix('{')?;
        let close = group.find('}')?;
        let (start, end) = group[..close].split_once(',')?;
        ranges.push(EraseRange {
            start: parse_hex_value(start)?,
            end: parse_hex_value(end)?,
        });

        let tail = group[close + 1..].trim_start();
        rest = tail.strip_prefix(',').unwrap_or(tail).trim_start();
    }
    Some(ranges)
}
