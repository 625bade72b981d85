//! Minimal BibTeX reader for paper metadata.
//!
//! Understands `@type{key, field = value, ...}` entries with braced, quoted
//! or bare values, nested braces and `#` concatenation. `@comment`,
//! `@string` and `@preamble` blocks are skipped; string macros are not
//! expanded. Malformed entries are skipped with a warning.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::extract::error::{ExtractError, ExtractResult};
use crate::model::DocumentMetadata;

/// One bibliography entry. Field names are lower case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub entry_type: String,
    pub cite_key: String,
    pub fields: BTreeMap<String, String>,
}

impl BibEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Entries of a BibTeX file, by citation key.
#[derive(Debug, Clone, Default)]
pub struct Bibliography {
    entries: HashMap<String, BibEntry>,
}

impl Bibliography {
    /// Read and parse a `.bib` file.
    pub fn load(path: &Path) -> ExtractResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ExtractError::Bibliography {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let bib = Self::parse(&text);
        tracing::info!(path = %path.display(), entries = bib.len(), "loaded bibliography");
        Ok(bib)
    }

    pub fn parse(text: &str) -> Self {
        let mut scanner = Scanner::new(text);
        let mut entries = HashMap::new();
        while scanner.seek('@') {
            match scanner.entry() {
                Ok(Some(entry)) => {
                    entries.insert(entry.cite_key.clone(), entry);
                }
                Ok(None) => {}
                Err(message) => tracing::warn!(%message, "skipping malformed BibTeX entry"),
            }
        }
        Self { entries }
    }

    pub fn get(&self, cite_key: &str) -> Option<&BibEntry> {
        self.entries.get(cite_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Document metadata for `cite_key`; only the key is set when the
    /// bibliography has no such entry.
    pub fn metadata_for(&self, cite_key: &str) -> DocumentMetadata {
        let mut meta = DocumentMetadata::new(cite_key);
        let Some(entry) = self.get(cite_key) else {
            return meta;
        };
        let field = |name: &str| entry.field(name).map(clean_value).unwrap_or_default();

        meta.title = field("title");
        meta.year = field("year");
        meta.journal = field("journal");
        meta.doi = field("doi");
        meta.url = field("url");
        meta.authors = entry
            .field("author")
            .map(split_authors)
            .unwrap_or_default();
        meta
    }
}

/// Strip grouping braces and collapse whitespace.
fn clean_value(raw: &str) -> String {
    raw.replace(['{', '}'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split an author field on the `and` separator.
fn split_authors(raw: &str) -> Vec<String> {
    let cleaned = clean_value(raw);
    cleaned
        .split(" and ")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Advance past the next `target`; false at end of input.
    fn seek(&mut self, target: char) -> bool {
        while let Some(c) = self.bump() {
            if c == target {
                return true;
            }
        }
        false
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&keep) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn expect(&mut self, want: char) -> Result<(), String> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(format!("expected '{want}', found '{c}'")),
            None => Err(format!("expected '{want}', found end of input")),
        }
    }

    /// Parse one entry after its `@`. `Ok(None)` for skipped block types.
    fn entry(&mut self) -> Result<Option<BibEntry>, String> {
        let entry_type = self.take_while(char::is_alphanumeric).to_lowercase();
        if entry_type.is_empty() {
            return Err("missing entry type".into());
        }
        self.skip_ws();
        let close = match self.bump() {
            Some('{') => '}',
            Some('(') => ')',
            _ => return Err(format!("@{entry_type} is not followed by a brace")),
        };

        if matches!(entry_type.as_str(), "comment" | "string" | "preamble") {
            self.pos -= 1;
            self.braced_value()?;
            return Ok(None);
        }

        self.skip_ws();
        let cite_key = self
            .take_while(|c| c != ',' && c != close && !c.is_whitespace());
        if cite_key.is_empty() {
            return Err(format!("@{entry_type} entry without a citation key"));
        }

        let mut fields = BTreeMap::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if c == close => {
                    self.pos += 1;
                    break;
                }
                Some(',') => {
                    self.pos += 1;
                    continue;
                }
                None => return Err(format!("unterminated entry {cite_key}")),
                _ => {}
            }

            let name = self
                .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
                .to_lowercase();
            if name.is_empty() {
                return Err(format!("bad field name in entry {cite_key}"));
            }
            self.expect('=')?;
            let value = self.value(close)?;
            fields.insert(name, value);
        }

        Ok(Some(BibEntry {
            entry_type,
            cite_key,
            fields,
        }))
    }

    /// A field value, following `#` concatenations.
    fn value(&mut self, close: char) -> Result<String, String> {
        let mut value = String::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('{') => value.push_str(&self.braced_value()?),
                Some('"') => value.push_str(&self.quoted_value()?),
                Some(_) => value.push_str(
                    self.take_while(|c| c != ',' && c != close && c != '#' && !c.is_whitespace())
                        .as_str(),
                ),
                None => return Err("value cut off by end of input".into()),
            }
            self.skip_ws();
            if self.peek() == Some('#') {
                self.pos += 1;
            } else {
                return Ok(value);
            }
        }
    }

    /// `{...}` with nesting; returns the inner text, inner braces kept.
    fn braced_value(&mut self) -> Result<String, String> {
        self.expect('{')?;
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.chars[start..self.pos - 1].iter().collect());
                    }
                }
                _ => {}
            }
        }
        Err("unbalanced braces".into())
    }

    /// `"..."`; braces inside may protect quotes.
    fn quoted_value(&mut self) -> Result<String, String> {
        self.expect('"')?;
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                '"' if depth == 0 => {
                    return Ok(self.chars[start..self.pos - 1].iter().collect());
                }
                _ => {}
            }
        }
        Err("unterminated quoted value".into())
    }
}
