//! Input readers for ASTERIX data.
//!
//! Input modes:
//! - hex text: one message per line, plain hex or `*hex;`
//! - binary: a concatenated `.ast` recording, framed by the declared lengths

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use asterix_core::types::hex_decode;

/// Smallest valid message: category plus two length bytes.
const MIN_MESSAGE_LEN: usize = 3;

// ---------------------------------------------------------------------------
// Hex lines
// ---------------------------------------------------------------------------

/// Extract a hex message from a line.
///
/// Handles plain hex, the `*hex;` form and whitespace between octets.
pub fn clean_hex_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let body = match line.strip_prefix('*').and_then(|l| l.strip_suffix(';')) {
        Some(inner) => inner,
        None => line,
    };

    let hex: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if is_valid_hex(&hex) {
        Some(hex.to_ascii_uppercase())
    } else {
        None
    }
}

fn is_valid_hex(s: &str) -> bool {
    s.len() >= MIN_MESSAGE_LEN * 2 && s.len() % 2 == 0 && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn open(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// Read hex messages from a file, or stdin when `path` is `-`.
///
/// Lines that are not valid hex are skipped; the count is returned with the chunks.
pub fn read_hex_chunks(path: &Path) -> io::Result<(Vec<Vec<u8>>, usize)> {
    let reader = open(path)?;
    let mut chunks = Vec::new();
    let mut skipped = 0;

    for line in reader.lines() {
        let line = line?;
        match clean_hex_line(&line).and_then(|hex| hex_decode(&hex)) {
            Some(bytes) => chunks.push(bytes),
            None => {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    skipped += 1;
                }
            }
        }
    }

    Ok((chunks, skipped))
}

// ---------------------------------------------------------------------------
// Binary recordings
// ---------------------------------------------------------------------------

/// Read a whole binary recording, or stdin when `path` is `-`.
pub fn read_binary(path: &Path) -> io::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(path)
    }
}

/// Split a concatenated buffer into messages by their declared lengths.
///
/// Stops at the first header that cannot be framed (length below 3 or past
/// the end of the buffer). Returns the messages and the unframed remainder.
pub fn split_binary(buf: &[u8]) -> (Vec<&[u8]>, &[u8]) {
    let mut messages = Vec::new();
    let mut pos = 0;

    while buf.len() - pos >= MIN_MESSAGE_LEN {
        let len = u16::from_be_bytes([buf[pos + 1], buf[pos + 2]]) as usize;
        if len < MIN_MESSAGE_LEN || pos + len > buf.len() {
            break;
        }
        messages.push(&buf[pos..pos + len]);
        pos += len;
    }

    (messages, &buf[pos..])
}
