//! Tolerant parser for manifest files.
//!
//! Manifests are generated, then hand-edited, then regenerated. Only the
//! `label` and `description` string fields of each entry are ever read back;
//! render references are always rewritten from the files on disk.
//!
//! # Grammar
//!
//! ```text
//! manifest := … "versions" annotation? "=" object …
//! object   := "{" ( entry ( "," entry )* ","? )? "}"
//! entry    := key ":" ( body | value ) | key | other-value
//! key      := string | ident | number
//! body     := "{" ( field ( "," field )* ","? )? "}"
//! field    := name ":" value | name
//! value    := <balanced token run up to "," or the closing "}">
//! ```
//!
//! Whitespace and comments are ignored anywhere; strings use JavaScript
//! escape rules. Balanced `{}`/`[]`/`()` runs are skipped as opaque values,
//! so multi-line or reformatted entries still parse. Any structural failure
//! yields no document, which callers treat as "no preserved metadata".

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::str::CharIndices;

use variants_core::VersionMetadata;

/// Preserved metadata keyed by the raw manifest key.
pub type MetadataMap = BTreeMap<String, VersionMetadata>;

/// A string field value together with the byte range of its literal,
/// quotes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub value: String,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub key: String,
    /// Byte range of the entry's `{ … }` body, braces included.
    pub body: Range<usize>,
    pub label: Option<FieldValue>,
    pub description: Option<FieldValue>,
    /// The last `label` field is an expression or shorthand, not a string.
    pub computed_label: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDocument {
    pub entries: Vec<ManifestEntry>,
}

impl ManifestDocument {
    /// The effective entry for `key`; a later duplicate wins, as in JavaScript.
    pub fn entry(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.iter().rev().find(|entry| entry.key == key)
    }

    pub fn keys(&self) -> BTreeSet<String> {
        self.entries.iter().map(|entry| entry.key.clone()).collect()
    }

    pub fn metadata(&self) -> MetadataMap {
        let mut map = MetadataMap::new();
        for entry in &self.entries {
            map.insert(
                entry.key.clone(),
                VersionMetadata {
                    label: entry.label.as_ref().map(|f| f.value.clone()),
                    description: entry.description.as_ref().map(|f| f.value.clone()),
                },
            );
        }
        map
    }
}

/// Parse `text` into a structured document, or `None` on structural failure.
pub fn parse_document(text: &str) -> Option<ManifestDocument> {
    let tokens = tokenize(text)?;
    let open = find_versions_object(&tokens)?;
    let entries = Parser { tokens: &tokens }.object(open)?;
    Some(ManifestDocument { entries })
}

/// Preserved metadata of every entry in `text`; empty on any failure.
pub fn parse(text: &str) -> MetadataMap {
    parse_document(text)
        .map(|doc| doc.metadata())
        .unwrap_or_default()
}

/// Keys declared in `text`; empty on any failure.
pub fn parse_keys(text: &str) -> BTreeSet<String> {
    parse_document(text)
        .map(|doc| doc.keys())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BodyFields {
    label: Option<FieldValue>,
    description: Option<FieldValue>,
    computed_label: bool,
    /// Index of the closing `}` token.
    close: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str(String),
    Punct(char),
    Other,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    span: Range<usize>,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn tokenize(text: &str) -> Option<Vec<Token>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let close = text[i + 2..].find("*/")?;
                i += 2 + close + 2;
            }
            b'"' | b'\'' | b'`' => {
                let (tok, end) = lex_string(text, i)?;
                tokens.push(Token { tok, span: i..end });
                i = end;
            }
            b'{' | b'}' | b'[' | b']' | b'(' | b')' | b':' | b',' | b'=' | b';' => {
                tokens.push(Token {
                    tok: Tok::Punct(b as char),
                    span: i..i + 1,
                });
                i += 1;
            }
            _ if is_ident_continue(b) => {
                let start = i;
                while i < bytes.len() && is_ident_continue(bytes[i]) {
                    i += 1;
                }
                let word = &text[start..i];
                let tok = if is_ident_start(b) || word.bytes().all(|c| c.is_ascii_digit()) {
                    Tok::Ident(word.to_string())
                } else {
                    Tok::Other
                };
                tokens.push(Token { tok, span: start..i });
            }
            _ => {
                let width = text[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                tokens.push(Token {
                    tok: Tok::Other,
                    span: i..i + width,
                });
                i += width;
            }
        }
    }
    Some(tokens)
}

/// Lex the string literal opening at `start`. Returns the token and the byte
/// offset just past the closing quote. Template literals containing `${` are
/// returned as [`Tok::Other`].
fn lex_string(text: &str, start: usize) -> Option<(Tok, usize)> {
    let quote = text[start..].chars().next()?;
    let body_start = start + quote.len_utf8();
    let mut chars = text[body_start..].char_indices();
    let mut out = String::new();
    let mut interpolated = false;

    while let Some((offset, c)) = chars.next() {
        if c == quote {
            let tok = if interpolated { Tok::Other } else { Tok::Str(out) };
            return Some((tok, body_start + offset + c.len_utf8()));
        }
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'v' => out.push('\u{b}'),
                    '0' => out.push('\0'),
                    'x' => {
                        let code = read_hex(&mut chars, 2)?;
                        out.push(char::from_u32(code)?);
                    }
                    'u' => out.push(read_unicode_escape(&mut chars)?),
                    '\r' => {
                        if chars.clone().next().map(|(_, c)| c) == Some('\n') {
                            chars.next();
                        }
                    }
                    '\n' => {}
                    other => out.push(other),
                }
            }
            '\n' if quote != '`' => return None,
            '$' if quote == '`' && chars.clone().next().map(|(_, c)| c) == Some('{') => {
                interpolated = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    None
}

fn read_hex(chars: &mut CharIndices<'_>, digits: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..digits {
        let (_, c) = chars.next()?;
        value = value.checked_mul(16)? + c.to_digit(16)?;
    }
    Some(value)
}

fn read_unicode_escape(chars: &mut CharIndices<'_>) -> Option<char> {
    if chars.clone().next().map(|(_, c)| c) == Some('{') {
        chars.next();
        let mut value = 0u32;
        loop {
            let (_, c) = chars.next()?;
            if c == '}' {
                return char::from_u32(value);
            }
            value = value.checked_mul(16)?.checked_add(c.to_digit(16)?)?;
        }
    }

    let unit = read_hex(chars, 4)?;
    if !(0xD800..0xDC00).contains(&unit) {
        return Some(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER));
    }

    // High surrogate: combine with a following `\uDCxx` when present.
    let mut lookahead = chars.clone();
    if let (Some((_, '\\')), Some((_, 'u'))) = (lookahead.next(), lookahead.next()) {
        if let Some(low) = read_hex(&mut lookahead, 4) {
            if (0xDC00..0xE000).contains(&low) {
                *chars = lookahead;
                let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(combined);
            }
        }
    }
    Some(char::REPLACEMENT_CHARACTER)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Index of the `{` opening the object literal assigned to `versions`.
fn find_versions_object(tokens: &[Token]) -> Option<usize> {
    for (i, token) in tokens.iter().enumerate() {
        if !matches!(&token.tok, Tok::Ident(name) if name == "versions") {
            continue;
        }
        let mut depth = 0usize;
        for j in i + 1..tokens.len() {
            match tokens[j].tok {
                Tok::Punct('{' | '[' | '(') => depth += 1,
                Tok::Punct('}' | ']' | ')') => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                Tok::Punct('=') if depth == 0 => {
                    if matches!(tokens.get(j + 1).map(|t| &t.tok), Some(Tok::Punct('{'))) {
                        return Some(j + 1);
                    }
                    break;
                }
                Tok::Punct(';') if depth == 0 => break,
                _ => {}
            }
        }
    }
    None
}

struct Parser<'a> {
    tokens: &'a [Token],
}

impl Parser<'_> {
    fn tok(&self, i: usize) -> Option<&Tok> {
        self.tokens.get(i).map(|t| &t.tok)
    }

    /// Parse the `versions` object whose `{` sits at `open`.
    fn object(&self, open: usize) -> Option<Vec<ManifestEntry>> {
        let mut entries = Vec::new();
        let mut p = open + 1;
        loop {
            match self.tok(p)? {
                Tok::Punct('}') => return Some(entries),
                Tok::Punct(',') => p += 1,
                Tok::Str(key) | Tok::Ident(key) => {
                    let key = key.clone();
                    p += 1;
                    match self.tok(p)? {
                        Tok::Punct(':') => p += 1,
                        Tok::Punct(',' | '}') => continue,
                        _ => return None,
                    }
                    if self.tok(p)? == &Tok::Punct('{') {
                        let fields = self.body(p)?;
                        entries.push(ManifestEntry {
                            key,
                            body: self.tokens[p].span.start..self.tokens[fields.close].span.end,
                            label: fields.label,
                            description: fields.description,
                            computed_label: fields.computed_label,
                        });
                        p = fields.close + 1;
                    } else {
                        p = self.skip_value(p)?;
                    }
                }
                _ => p = self.skip_value(p)?,
            }
        }
    }

    /// Parse an entry body whose `{` sits at `open`. Later fields win, so a
    /// computed `label` after a literal one hides it.
    fn body(&self, open: usize) -> Option<BodyFields> {
        let mut fields = BodyFields::default();
        let mut q = open + 1;
        loop {
            match self.tok(q)? {
                Tok::Punct('}') => {
                    fields.close = q;
                    return Some(fields);
                }
                Tok::Punct(',') => q += 1,
                Tok::Ident(name) | Tok::Str(name) => {
                    let name = name.clone();
                    q += 1;
                    match self.tok(q)? {
                        Tok::Punct(':') => q += 1,
                        Tok::Punct(',' | '}') => {
                            if name == "label" {
                                fields.label = None;
                                fields.computed_label = true;
                            }
                            continue;
                        }
                        _ => return None,
                    }
                    let value_at = q;
                    let end = self.skip_value(q)?;
                    let literal = match &self.tokens[value_at].tok {
                        Tok::Str(value) if end == value_at + 1 => Some(FieldValue {
                            value: value.clone(),
                            span: self.tokens[value_at].span.clone(),
                        }),
                        _ => None,
                    };
                    match name.as_str() {
                        "label" => {
                            fields.computed_label = literal.is_none();
                            fields.label = literal;
                        }
                        "description" => fields.description = literal,
                        _ => {}
                    }
                    q = end;
                }
                _ => q = self.skip_value(q)?,
            }
        }
    }

    /// Skip a balanced token run starting at `start`; returns the index of
    /// the `,` or enclosing `}` that terminates it.
    fn skip_value(&self, start: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut j = start;
        loop {
            match self.tok(j)? {
                Tok::Punct('{' | '[' | '(') => depth += 1,
                Tok::Punct(c @ ('}' | ']' | ')')) => {
                    if depth == 0 {
                        return (*c == '}').then_some(j);
                    }
                    depth -= 1;
                }
                Tok::Punct(',') if depth == 0 => return Some(j),
                _ => {}
            }
            j += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
