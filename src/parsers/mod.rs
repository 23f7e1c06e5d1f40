//! Parsers for GL strings and the delimited reference/request files.

pub mod frequencies;
pub mod ggroups;
pub mod glstring;
pub mod groups;
pub mod requests;

pub use frequencies::FrequencyParser;
pub use ggroups::GGroupParser;
pub use glstring::GlStringParser;
pub use groups::ImmuneGroupParser;
pub use requests::RequestParser;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Open a file for buffered reading, decompressing `.gz` transparently
pub fn open_file(path: &Path) -> Result<Box<dyn BufRead>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;

    let is_gzip = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read a whole (possibly compressed) file into memory
pub fn read_file(path: &Path) -> Result<String> {
    let mut content = String::new();
    open_file(path)?
        .read_to_string(&mut content)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(content)
}

/// Guess the field delimiter from the first data line
pub fn detect_delimiter(line: &str) -> u8 {
    if line.contains('\t') {
        b'\t'
    } else if line.contains(',') {
        b','
    } else if line.contains(';') {
        b';'
    } else {
        b'\t'
    }
}

/// A csv reader over `content` using its detected delimiter.
/// Leading `#` lines are treated as comments.
pub(crate) fn delimited_reader(content: &str) -> csv::Reader<&[u8]> {
    let first_line = content
        .lines()
        .find(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .unwrap_or("");

    csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(first_line))
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(content.as_bytes())
}
