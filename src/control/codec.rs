// src/control/codec.rs

//! Reader and writer for dpkg-style control files
//!
//! A control file is a sequence of stanzas separated by blank lines. Each
//! stanza holds `Key: Value` lines; a line starting with a single space
//! continues the previous field's value.
//!
//! The separator after the key is `:`, and exactly one space following it
//! is consumed on read. On write a field is emitted as `Key: value`, or as
//! a bare `Key:` when the first value line is empty (the shape dpkg uses
//! for `Conffiles:` and similar list fields). Standard dpkg output
//! therefore survives a parse/serialize cycle byte for byte.

use super::Stanza;
use crate::error::{Error, Result};
use std::io::{BufRead, Write};
use tracing::debug;

/// Field separator between key and value
pub const FIELD_SEPARATOR: char = ':';

/// Prefix marking a continuation line
pub const CONTINUATION_PREFIX: char = ' ';

/// Stanzas rendered per write call in [`write_database`]
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// An ordered sequence of stanzas, as found in a status file
pub type Database = Vec<Stanza>;

/// How the decoder treats lines that are not well-formed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Keep going: a line without a separator becomes an empty-keyed field
    #[default]
    Permissive,
    /// Fail with [`Error::MalformedFieldLine`]
    Strict,
}

/// Line-at-a-time stanza builder
///
/// Each blank line beyond the one that ends a stanza stands for an empty
/// stanza. Those are held back until more content follows, so a run of
/// blank lines at the end of input produces nothing.
struct Decoder {
    stanzas: Database,
    current: Stanza,
    pending_empty: usize,
}

impl Decoder {
    fn new() -> Self {
        Self {
            stanzas: Vec::new(),
            current: Stanza::new(),
            pending_empty: 0,
        }
    }

    /// Apply one line (without its trailing newline)
    ///
    /// Returns `false` when the line is malformed. The line has still been
    /// applied permissively; strict callers bail out on `false`.
    fn feed(&mut self, line: &str) -> bool {
        if line.is_empty() {
            if self.current.is_empty() {
                self.pending_empty += 1;
            } else {
                self.stanzas.push(std::mem::take(&mut self.current));
            }
            return true;
        }

        self.stanzas
            .extend(std::iter::repeat_with(Stanza::new).take(self.pending_empty));
        self.pending_empty = 0;

        if let Some(rest) = line.strip_prefix(CONTINUATION_PREFIX) {
            if let Some(value) = self.current.last_value_mut() {
                value.push('\n');
                value.push_str(rest);
                return true;
            }
        }

        match line.split_once(FIELD_SEPARATOR) {
            Some((key, value)) => {
                let value = value.strip_prefix(' ').unwrap_or(value);
                self.current.set(key, value);
                // A continuation with nothing to continue
                !line.starts_with(CONTINUATION_PREFIX)
            }
            None => {
                self.current.set("", line);
                false
            }
        }
    }

    fn finish(mut self) -> Database {
        if !self.current.is_empty() {
            self.stanzas.push(self.current);
        }
        self.stanzas
    }
}

/// Parse control-file text permissively
pub fn parse(text: &str) -> Database {
    let mut decoder = Decoder::new();
    for line in text.split('\n') {
        decoder.feed(line);
    }
    decoder.finish()
}

/// Parse control-file text in the given mode
pub fn parse_str(text: &str, mode: ParseMode) -> Result<Database> {
    let mut decoder = Decoder::new();
    for (idx, line) in text.split('\n').enumerate() {
        if !decoder.feed(line) && mode == ParseMode::Strict {
            return Err(malformed(idx + 1, line));
        }
    }
    Ok(decoder.finish())
}

/// Parse a control file from a buffered reader
///
/// Lines are read one at a time so the raw text never has to be held in
/// memory in full.
pub fn parse_reader<R: BufRead>(mut reader: R, mode: ParseMode) -> Result<Database> {
    let mut decoder = Decoder::new();
    let mut buf = String::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let line = buf.strip_suffix('\n').unwrap_or(&buf);
        if !decoder.feed(line) && mode == ParseMode::Strict {
            return Err(malformed(line_no, line));
        }
    }

    let stanzas = decoder.finish();
    debug!("Parsed {} stanzas from {} lines", stanzas.len(), line_no);
    Ok(stanzas)
}

fn malformed(line: usize, content: &str) -> Error {
    Error::MalformedFieldLine {
        line,
        content: content.to_string(),
    }
}

/// Append the encoded form of one stanza, blank separator included
fn encode_stanza(out: &mut String, stanza: &Stanza) {
    for (key, value) in stanza {
        let mut lines = value.split('\n');

        out.push_str(key);
        out.push(FIELD_SEPARATOR);
        if let Some(first) = lines.next().filter(|first| !first.is_empty()) {
            out.push(' ');
            out.push_str(first);
        }
        out.push('\n');

        for line in lines {
            out.push(CONTINUATION_PREFIX);
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push('\n');
}

/// Serialize a database to control-file text
pub fn serialize(db: &[Stanza]) -> String {
    let mut out = String::new();
    for stanza in db {
        encode_stanza(&mut out, stanza);
    }
    out
}

/// Write a database to `sink`, `batch_size` stanzas per write
///
/// Produces exactly the bytes of [`serialize`] while holding at most one
/// batch of encoded text in memory. Returns the number of bytes written.
pub fn write_database<W: Write>(sink: &mut W, db: &[Stanza], batch_size: usize) -> Result<u64> {
    let mut buffer = String::new();
    let mut written = 0u64;

    for batch in db.chunks(batch_size.max(1)) {
        buffer.clear();
        for stanza in batch {
            encode_stanza(&mut buffer, stanza);
        }
        sink.write_all(buffer.as_bytes())?;
        written += buffer.len() as u64;
    }

    debug!("Wrote {} stanzas ({} bytes)", db.len(), written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const STATUS: &str = "Package: bash
Status: install ok installed
Priority: required
Architecture: amd64
Version: 5.2.15-2
Description: GNU Bourne Again SHell
 Bash is an sh-compatible command language interpreter.
 .
 Bash also incorporates useful features.

Package: base-files
Status: install ok installed
Architecture: amd64
Conffiles:
 /etc/debian_version 2a7ba0d4b2e0b2ac0c7e3e9ff1fe7e08
 /etc/issue 8f6e0a4ef7e0a9e8e0b4f1d6a7a27f62
Version: 12.4

";

    #[test]
    fn test_parse_status_file() {
        let db = parse(STATUS);
        assert_eq!(db.len(), 2);

        let bash = &db[0];
        assert_eq!(bash.get("Package").unwrap(), "bash");
        assert_eq!(bash.get("Architecture").unwrap(), "amd64");
        assert_eq!(
            bash.get("Description").unwrap(),
            "GNU Bourne Again SHell\n\
             Bash is an sh-compatible command language interpreter.\n\
             .\n\
             Bash also incorporates useful features."
        );
        assert_eq!(
            bash.keys().collect::<Vec<_>>(),
            ["Package", "Status", "Priority", "Architecture", "Version", "Description"]
        );

        let conffiles = db[1].get("Conffiles").unwrap();
        assert!(conffiles.starts_with("\n/etc/debian_version"));
        assert_eq!(conffiles.lines().count(), 3);
    }

    #[test]
    fn test_dpkg_text_round_trips_byte_for_byte() {
        assert_eq!(serialize(&parse(STATUS)), STATUS);
    }

    #[test]
    fn test_parse_serialize_round_trip() {
        let db = vec![
            Stanza::from_iter([
                ("Package", "pkg1"),
                ("Architecture", "all"),
                ("Description", "short\n long line with indent\n.\nlast"),
            ]),
            Stanza::from_iter([("Package", "pkg2"), ("Empty", ""), ("Lead", "  spaced")]),
            Stanza::from_iter([("Package", "pkg3"), ("List", "\nfirst\nsecond")]),
        ];

        assert_eq!(parse(&serialize(&db)), db);
    }

    #[test]
    fn test_trailing_blank_lines_produce_no_empty_stanza() {
        let db = parse("Package: a\n\n\n\n");
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_blank_line_runs_between_stanzas_keep_empty_stanzas() {
        let text = "Package: a\n\n\nPackage: b\n\n";
        let db = parse(text);
        assert_eq!(db.len(), 3);
        assert!(db[1].is_empty());
        assert_eq!(db[2].get("Package").unwrap(), "b");
        assert_eq!(serialize(&db), text);
    }

    #[test]
    fn test_empty_stanza_between_entries_round_trips() {
        let db = vec![
            Stanza::from_iter([("Package", "a")]),
            Stanza::new(),
            Stanza::from_iter([("Package", "b")]),
        ];
        assert_eq!(parse(&serialize(&db)), db);

        let from_reader = parse_reader(Cursor::new(serialize(&db)), ParseMode::Strict).unwrap();
        assert_eq!(from_reader, db);
    }

    #[test]
    fn test_leading_blank_line_is_an_empty_stanza() {
        let db = parse("\nPackage: a\n\n");
        assert_eq!(db, vec![Stanza::new(), Stanza::from_iter([("Package", "a")])]);
    }

    #[test]
    fn test_final_stanza_without_blank_line() {
        let db = parse("Package: a\nVersion: 1");
        assert_eq!(db.len(), 1);
        assert_eq!(db[0].get("Version").unwrap(), "1");
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n").is_empty());
        assert_eq!(serialize(&[]), "");
    }

    #[test]
    fn test_separator_skips_one_space_only() {
        let db = parse("A:x\nB: y\nC:  z\nD:\n");
        let stanza = &db[0];
        assert_eq!(stanza.get("A").unwrap(), "x");
        assert_eq!(stanza.get("B").unwrap(), "y");
        assert_eq!(stanza.get("C").unwrap(), " z");
        assert_eq!(stanza.get("D").unwrap(), "");
    }

    #[test]
    fn test_delimiter_is_normalised_on_write() {
        let db = parse("A:x\nB: \n\n");
        assert_eq!(db[0].get("B").unwrap(), "");
        assert_eq!(serialize(&db), "A: x\nB:\n\n");
    }

    #[test]
    fn test_value_keeps_later_colons() {
        let db = parse("Depends: libc6 (>= 2.34), foo:any\n");
        assert_eq!(db[0].get("Depends").unwrap(), "libc6 (>= 2.34), foo:any");
    }

    #[test]
    fn test_repeated_key_moves_to_end_and_takes_continuation() {
        let db = parse("A: 1\nB: 2\nA: 3\n more\n");
        let stanza = &db[0];
        assert_eq!(stanza.keys().collect::<Vec<_>>(), ["B", "A"]);
        assert_eq!(stanza.get("A").unwrap(), "3\nmore");
    }

    #[test]
    fn test_permissive_missing_separator_yields_empty_key() {
        let db = parse("Package: a\nno separator here\n");
        assert_eq!(db[0].get("").unwrap(), "no separator here");
    }

    #[test]
    fn test_strict_rejects_missing_separator() {
        let err = parse_str("Package: a\nbogus\n", ParseMode::Strict).unwrap_err();
        match err {
            Error::MalformedFieldLine { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "bogus");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_rejects_orphan_continuation() {
        let result = parse_str("Package: a\n\n continued: nothing\n", ParseMode::Strict);
        assert!(matches!(result, Err(Error::MalformedFieldLine { line: 3, .. })));

        // Permissive mode reads it as a field line
        let db = parse("Package: a\n\n continued: nothing\n");
        assert_eq!(db[1].get(" continued").unwrap(), "nothing");
    }

    #[test]
    fn test_strict_accepts_well_formed_input() {
        assert_eq!(parse_str(STATUS, ParseMode::Strict).unwrap(), parse(STATUS));
    }

    #[test]
    fn test_carriage_return_is_preserved() {
        let text = "Package: a\r\n\n";
        let db = parse(text);
        assert_eq!(db[0].get("Package").unwrap(), "a\r");
        assert_eq!(serialize(&db), text);
    }

    #[test]
    fn test_parse_reader_matches_parse() {
        let from_reader = parse_reader(Cursor::new(STATUS), ParseMode::Strict).unwrap();
        assert_eq!(from_reader, parse(STATUS));

        let unterminated = parse_reader(Cursor::new("A: 1\n b"), ParseMode::Permissive).unwrap();
        assert_eq!(unterminated[0].get("A").unwrap(), "1\nb");
    }

    #[test]
    fn test_parse_reader_strict_reports_line() {
        let result = parse_reader(Cursor::new("A: 1\n\nB: 2\noops\n"), ParseMode::Strict);
        assert!(matches!(result, Err(Error::MalformedFieldLine { line: 4, .. })));
    }

    #[test]
    fn test_write_database_matches_serialize_for_any_batch() {
        let mut db = parse(STATUS);
        for i in 0..7 {
            db.push(Stanza::from_iter([
                ("Package", format!("extra{i}")),
                ("Description", format!("line one\nline {i}")),
            ]));
        }
        let expected = serialize(&db);

        for batch in [0, 1, 2, 3, 5, DEFAULT_BATCH_SIZE] {
            let mut sink = Vec::new();
            let written = write_database(&mut sink, &db, batch).unwrap();
            assert_eq!(sink, expected.as_bytes(), "batch size {batch}");
            assert_eq!(written, expected.len() as u64);
        }
    }

    #[test]
    fn test_write_database_counts_bytes_for_multibyte_text() {
        let db = vec![Stanza::from_iter([("Maintainer", "Jöhn Dœ <j@example.org>")])];
        let mut sink = Vec::new();
        let written = write_database(&mut sink, &db, 1).unwrap();
        assert_eq!(written, sink.len() as u64);
        assert!(written > serialize(&db).chars().count() as u64);
    }
}
