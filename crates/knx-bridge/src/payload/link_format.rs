// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Minimal CoRE link-format (RFC 6690) reader.
//!
//! Only what discovery needs: split a listing into entries and read the
//! target and parameters of each. Entries are separated by `,` or by line
//! breaks; separators inside `<...>` or double quotes are ignored.

/// A parsed link-format document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFormat {
    entries: Vec<LinkEntry>,
}

/// One `<target>;key=value;...` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkEntry {
    uri: String,
    params: Vec<(String, String)>,
}

impl LinkFormat {
    /// Parse a listing. Never fails: malformed fragments yield entries with
    /// whatever could be read.
    pub fn parse(text: &str) -> Self {
        let entries = split_top_level(text, |c| c == ',' || c == '\n' || c == '\r')
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(LinkEntry::parse)
            .collect();
        Self { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the listing has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`.
    pub fn entry(&self, index: usize) -> Option<&LinkEntry> {
        self.entries.get(index)
    }

    /// All entries in document order.
    pub fn entries(&self) -> &[LinkEntry] {
        &self.entries
    }
}

impl LinkEntry {
    fn parse(raw: &str) -> Self {
        let mut parts = split_top_level(raw, |c| c == ';').into_iter();
        let target = parts.next().unwrap_or_default().trim();
        let uri = target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .unwrap_or(target)
            .to_string();

        let params = parts
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| match p.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), unquote(v.trim()).to_string()),
                None => (p.to_string(), String::new()),
            })
            .collect();

        Self { uri, params }
    }

    /// Link target without the angle brackets.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Full value of the first parameter named `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First space-separated value of parameter `key` (e.g. one `rt` of many).
    pub fn first_value(&self, key: &str) -> Option<&str> {
        self.param(key)
            .and_then(|v| v.split_whitespace().next())
    }

    /// All parameters in entry order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(s)
}

fn split_top_level(text: &str, is_sep: impl Fn(char) -> bool) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut in_target = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            c if !in_quotes && !in_target && is_sep(c) => {
                out.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}
