//! BibTeX reader on top of `biblatex`'s raw parser.
//!
//! Entries become [`BibRecord`]s that keep their exact source text (the
//! entry span plus the whitespace after it), so writing a parsed
//! [`Bibliography`] back reproduces the input byte for byte. Everything
//! between entries, `@comment`, `@preamble` and `@string` blocks included,
//! becomes [`Block::Verbatim`].

use crate::error::{Error, ParseError, Result};
use crate::types::{BibRecord, Bibliography, Block};
use biblatex::{RawBibliography, RawChunk, Spanned};
use indexmap::IndexMap;
use regex::Regex;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const MONTH_MACROS: [(&str, &str); 12] = [
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

/// Parse BibTeX text
pub fn parse_bibliography(input: &str) -> Result<Bibliography> {
    let scanned = mask_stray_at(input)?;
    let raw = RawBibliography::parse(&scanned)
        .map_err(|e| error_at(input, e.span.start, e.kind.to_string()))?;

    let mut values = Values {
        input,
        scanned: &scanned,
        macros: MONTH_MACROS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    };
    for definition in &raw.abbreviations {
        let value = values.text(&definition.value.v);
        values.macros.insert(definition.key.v.to_lowercase(), value);
    }

    let mut blocks = Vec::new();
    let mut keys = HashSet::new();
    let mut cursor = 0;

    for entry in &raw.entries {
        let start = entry.span.start;
        // Trailing whitespace travels with the entry so dropping it leaves no gap
        let rest = &input[entry.span.end..];
        let end = entry.span.end + (rest.len() - rest.trim_start().len());

        let mut fields = IndexMap::new();
        for pair in &entry.v.fields {
            let name = pair.key.v.to_lowercase();
            if fields.contains_key(&name) {
                return Err(error_at(
                    input,
                    pair.key.span.start,
                    format!("duplicate field '{}'", name),
                ));
            }
            fields.insert(name, values.text(&pair.value.v));
        }

        let mut record =
            BibRecord::new(entry.v.kind.v, entry.v.key.v).with_source(&input[start..end]);
        record.fields = fields;

        if !keys.insert(record.key.to_lowercase()) {
            return Err(error_at(
                input,
                start,
                format!("duplicate citation key '{}'", record.key),
            ));
        }

        push_verbatim(&mut blocks, &input[cursor..start]);
        blocks.push(Block::Entry(record));
        cursor = end;
    }

    push_verbatim(&mut blocks, &input[cursor..]);
    Ok(Bibliography::new(blocks))
}

/// Read and parse a `.bib` file
pub fn parse_file(path: &Path) -> Result<Bibliography> {
    let content = std::fs::read_to_string(path)?;
    parse_bibliography(&content)
}

/// Resolves raw field chunks to text
struct Values<'a> {
    input: &'a str,
    scanned: &'a str,
    macros: HashMap<String, String>,
}

impl Values<'_> {
    /// Join the pieces of a `#`-concatenation, expanding macro names.
    /// Unknown macros stand for their own name.
    fn text(&self, chunks: &[Spanned<RawChunk<'_>>]) -> String {
        chunks
            .iter()
            .map(|chunk| match &chunk.v {
                RawChunk::Normal(text) => self.original(text),
                RawChunk::Abbreviation(name) => self
                    .macros
                    .get(&name.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| name.to_string()),
            })
            .collect()
    }

    /// `piece` borrows from the scanned copy; return the same bytes of the input
    fn original(&self, piece: &str) -> String {
        (piece.as_ptr() as usize)
            .checked_sub(self.scanned.as_ptr() as usize)
            .and_then(|offset| self.input.get(offset..offset + piece.len()))
            .unwrap_or(piece)
            .to_string()
    }
}

/// `biblatex` reads every `@` as the start of a block. Blank out the ones
/// that cannot start one, such as an address in a comment line, so they stay
/// plain text. Byte offsets do not move.
fn mask_stray_at(input: &str) -> Result<Cow<'_, str>> {
    let block_start = Regex::new(r"^@\w+\s*[{(]")?;
    let stray: Vec<usize> = input
        .match_indices('@')
        .map(|(at, _)| at)
        .filter(|&at| !block_start.is_match(&input[at..]))
        .collect();

    if stray.is_empty() {
        return Ok(Cow::Borrowed(input));
    }
    let mut scanned = input.to_string();
    for at in stray {
        scanned.replace_range(at..at + 1, " ");
    }
    Ok(Cow::Owned(scanned))
}

/// Build a [`ParseError`] for a byte offset; the column counts characters
fn error_at(input: &str, offset: usize, message: impl Into<String>) -> Error {
    let before = input.get(..offset.min(input.len())).unwrap_or(input);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    Error::Parse(ParseError::new(line, column, message))
}

fn push_verbatim(blocks: &mut Vec<Block>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Block::Verbatim(previous)) = blocks.last_mut() {
        previous.push_str(text);
    } else {
        blocks.push(Block::Verbatim(text.to_string()));
    }
}
